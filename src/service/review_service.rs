// service/review_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{db::DBClient, is_unique_violation, jobdb::JobExt, reviewdb::ReviewExt, workerdb::WorkerExt},
    models::{
        jobmodel::{Job, JobStatus},
        reviewmodel::{Review, MAX_RATING, MIN_RATING},
        usermodel::User,
    },
    service::{error::ServiceError, notification_service::NotificationService},
    utils::text::sanitize_plain,
};

#[derive(Debug, Clone)]
pub struct ReviewService {
    db_client: Arc<DBClient>,
    notification_service: Arc<NotificationService>,
}

impl ReviewService {
    pub fn new(db_client: Arc<DBClient>, notification_service: Arc<NotificationService>) -> Self {
        Self {
            db_client,
            notification_service,
        }
    }

    /// One review per completed job, written by the job's client.
    pub async fn create_review(
        &self,
        user: &User,
        job_id: Uuid,
        rating: i16,
        comment: &str,
    ) -> Result<Review, ServiceError> {
        let job = self
            .db_client
            .get_job_by_id(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        check_review_allowed(&job, user.id, rating)?;

        if self.db_client.get_review_by_job(job.id).await?.is_some() {
            return Err(ServiceError::ReviewExists(job.id));
        }

        let comment = sanitize_plain(comment);

        let review = self
            .db_client
            .create_review_and_refresh_rating(job.worker_id, job.id, user.id, rating, &comment)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::ReviewExists(job.id)
                } else {
                    ServiceError::Database(e)
                }
            })?;

        tracing::info!("Review {} stored for job {} ({} stars)", review.id, job.id, rating);

        match self.db_client.get_worker_by_id(job.worker_id).await {
            Ok(Some(worker)) => {
                self.notification_service
                    .notify_review(worker.user_id, &job, rating)
                    .await
            }
            Ok(None) => tracing::warn!("Reviewed worker {} no longer exists", job.worker_id),
            Err(e) => tracing::error!("Could not load worker for review notice: {}", e),
        }

        Ok(review)
    }
}

fn check_review_allowed(job: &Job, user_id: Uuid, rating: i16) -> Result<(), ServiceError> {
    if !job.is_client(user_id) {
        return Err(ServiceError::UnauthorizedJobAccess(user_id, job.id));
    }
    if job.status != JobStatus::Completed {
        return Err(ServiceError::ReviewNotAllowed(
            "only completed jobs can be reviewed".to_string(),
        ));
    }
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ServiceError::ReviewNotAllowed(format!(
            "rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::jobmodel::JobPaymentStatus;
    use chrono::{NaiveDate, Utc};
    use sqlx::types::BigDecimal;

    fn job(status: JobStatus, client_id: Uuid) -> Job {
        Job {
            id: Uuid::new_v4(),
            title: "Paint fence".into(),
            description: "Two coats".into(),
            location: "Bhaktapur".into(),
            scheduled_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            scheduled_time: "08:00".into(),
            client_name: "Mina".into(),
            client_phone: "+9779811111111".into(),
            hourly_rate: BigDecimal::from(20),
            duration_hours: BigDecimal::from(4),
            total_amount: BigDecimal::from(80),
            status,
            payment_status: JobPaymentStatus::Pending,
            worker_id: Uuid::new_v4(),
            client_id,
            completed_at: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn completed_job_client_may_review() {
        let client = Uuid::new_v4();
        assert!(check_review_allowed(&job(JobStatus::Completed, client), client, 5).is_ok());
    }

    #[test]
    fn other_users_may_not_review() {
        let job = job(JobStatus::Completed, Uuid::new_v4());
        assert!(matches!(
            check_review_allowed(&job, Uuid::new_v4(), 4),
            Err(ServiceError::UnauthorizedJobAccess(_, _))
        ));
    }

    #[test]
    fn unfinished_jobs_may_not_be_reviewed() {
        let client = Uuid::new_v4();
        for status in [
            JobStatus::Pending,
            JobStatus::Accepted,
            JobStatus::InProgress,
            JobStatus::Cancelled,
        ] {
            assert!(matches!(
                check_review_allowed(&job(status, client), client, 4),
                Err(ServiceError::ReviewNotAllowed(_))
            ));
        }
    }

    #[test]
    fn rating_must_be_in_range() {
        let client = Uuid::new_v4();
        let job = job(JobStatus::Completed, client);
        assert!(check_review_allowed(&job, client, 0).is_err());
        assert!(check_review_allowed(&job, client, 6).is_err());
        assert!(check_review_allowed(&job, client, 1).is_ok());
    }
}
