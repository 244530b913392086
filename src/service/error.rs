use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::is_unique_violation,
    error::{ErrorMessage, HttpError},
    models::jobmodel::JobStatus,
    service::payment_provider::ProviderError,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("No worker profile exists for user {0}")]
    WorkerProfileNotFound(Uuid),

    #[error("A worker profile already exists for this user")]
    WorkerProfileExists,

    #[error("Worker {0} not found")]
    WorkerNotFound(Uuid),

    #[error("Worker {0} is not accepting jobs right now")]
    WorkerUnavailable(Uuid),

    #[error("Unknown categories: {}", .0.join(", "))]
    UnknownCategories(Vec<String>),

    #[error("Category {0} not found")]
    CategoryNotFound(String),

    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Job cannot move from {} to {}", .from.to_str(), .to.to_str())]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Job {0} was updated by someone else, reload and try again")]
    StatusConflict(Uuid),

    #[error("User {0} is not authorized to perform this action on job {1}")]
    UnauthorizedJobAccess(Uuid, Uuid),

    #[error("Job {0} cannot be paid: {1}")]
    JobNotPayable(Uuid, String),

    #[error("Payment {0} not found")]
    PaymentNotFound(Uuid),

    #[error("Payment does not match this job: {0}")]
    PaymentMismatch(String),

    #[error("Payment has not completed: {0}")]
    PaymentNotCompleted(String),

    #[error("Payment {0} cannot be refunded in its current state")]
    PaymentNotRefundable(Uuid),

    #[error("A review already exists for job {0}")]
    ReviewExists(Uuid),

    #[error("Review not allowed: {0}")]
    ReviewNotAllowed(String),

    #[error("Notification {0} not found")]
    NotificationNotFound(Uuid),

    #[error("{0} is not configured on this server")]
    ProviderUnavailable(&'static str),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::UserNotFound(_)
            | ServiceError::WorkerProfileNotFound(_)
            | ServiceError::WorkerNotFound(_)
            | ServiceError::CategoryNotFound(_)
            | ServiceError::JobNotFound(_)
            | ServiceError::PaymentNotFound(_)
            | ServiceError::NotificationNotFound(_) => HttpError::not_found(error.to_string()),

            ServiceError::WorkerUnavailable(_)
            | ServiceError::UnknownCategories(_)
            | ServiceError::InvalidTransition { .. }
            | ServiceError::JobNotPayable(_, _)
            | ServiceError::PaymentMismatch(_)
            | ServiceError::ReviewNotAllowed(_)
            | ServiceError::Validation(_) => HttpError::bad_request(error.to_string()),

            ServiceError::WorkerProfileExists
            | ServiceError::StatusConflict(_)
            | ServiceError::PaymentNotRefundable(_)
            | ServiceError::ReviewExists(_) => HttpError::conflict(error.to_string()),

            ServiceError::UnauthorizedJobAccess(_, _) | ServiceError::Forbidden(_) => {
                HttpError::forbidden(error.to_string())
            }

            ServiceError::PaymentNotCompleted(_) => HttpError::payment_required(error.to_string()),

            ServiceError::ProviderUnavailable(_) => {
                HttpError::service_unavailable(error.to_string())
            }

            ServiceError::Provider(ref e) => {
                tracing::error!("Payment provider failure: {}", e);
                HttpError::bad_gateway(error.to_string())
            }

            ServiceError::Database(ref e) if is_unique_violation(e) => {
                HttpError::conflict("A record with these details already exists")
            }

            ServiceError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }

            ServiceError::Other(ref e) => {
                tracing::error!("Unexpected service error: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn status_of(error: ServiceError) -> StatusCode {
        HttpError::from(error).status
    }

    #[test]
    fn lookups_map_to_not_found() {
        assert_eq!(status_of(ServiceError::JobNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ServiceError::CategoryNotFound("plumbing".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn illegal_transition_is_a_bad_request_naming_both_states() {
        let error = ServiceError::InvalidTransition {
            from: JobStatus::Pending,
            to: JobStatus::Completed,
        };
        assert_eq!(error.to_string(), "Job cannot move from pending to completed");
        assert_eq!(status_of(error), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn races_and_duplicates_are_conflicts() {
        assert_eq!(status_of(ServiceError::StatusConflict(Uuid::nil())), StatusCode::CONFLICT);
        assert_eq!(status_of(ServiceError::ReviewExists(Uuid::nil())), StatusCode::CONFLICT);
    }

    #[test]
    fn provider_failures_are_bad_gateway_not_server_error() {
        let error = ServiceError::Provider(ProviderError::Api {
            provider: "stripe",
            message: "card declined".into(),
        });
        assert_eq!(status_of(error), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(ServiceError::ProviderUnavailable("Khalti")),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn database_errors_hide_details() {
        let http = HttpError::from(ServiceError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(http.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(http.message, ErrorMessage::ServerError.to_string());
    }

    #[test]
    fn access_errors_are_forbidden() {
        assert_eq!(
            status_of(ServiceError::UnauthorizedJobAccess(Uuid::nil(), Uuid::nil())),
            StatusCode::FORBIDDEN
        );
    }
}
