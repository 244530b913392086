// service/job_service.rs
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::{
        db::DBClient,
        jobdb::{JobExt, NewJob},
        workerdb::WorkerExt,
    },
    dtos::jobdtos::CreateJobDto,
    models::{
        jobmodel::{Job, JobStatus},
        usermodel::User,
        workermodel::WorkerProfile,
    },
    service::{error::ServiceError, notification_service::NotificationService},
    utils::{
        pricing,
        text::{sanitize_plain, sanitize_required},
    },
};

fn required_text(input: &str, field: &str) -> Result<String, ServiceError> {
    sanitize_required(input)
        .ok_or_else(|| ServiceError::Validation(format!("{} cannot be empty", field)))
}

#[derive(Debug, Clone)]
pub struct JobService {
    db_client: Arc<DBClient>,
    notification_service: Arc<NotificationService>,
}

impl JobService {
    pub fn new(db_client: Arc<DBClient>, notification_service: Arc<NotificationService>) -> Self {
        Self {
            db_client,
            notification_service,
        }
    }

    pub async fn create_job(&self, client: &User, body: CreateJobDto) -> Result<Job, ServiceError> {
        let worker = self
            .db_client
            .get_worker_by_id(body.worker_id)
            .await?
            .ok_or(ServiceError::WorkerNotFound(body.worker_id))?;

        if !worker.is_available {
            return Err(ServiceError::WorkerUnavailable(worker.id));
        }

        if worker.user_id == client.id {
            return Err(ServiceError::Validation(
                "You cannot hire your own worker profile".to_string(),
            ));
        }

        if body.scheduled_date < Utc::now().date_naive() {
            return Err(ServiceError::Validation(
                "Scheduled date cannot be in the past".to_string(),
            ));
        }

        let duration_hours = pricing::decimal_from_f64(body.duration_hours)
            .ok_or_else(|| ServiceError::Validation("Invalid duration".to_string()))?;

        // The rate is taken from the profile, never from the request.
        let total_amount = pricing::job_total(&worker.hourly_rate, &duration_hours);

        let client_name = body
            .client_name
            .map(|name| sanitize_plain(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| client.name.clone());

        let title = required_text(&body.title, "Title")?;
        let description = required_text(&body.description, "Description")?;
        let location = required_text(&body.location, "Location")?;

        let job = self
            .db_client
            .create_job(NewJob {
                title,
                description,
                location,
                scheduled_date: body.scheduled_date,
                scheduled_time: body.scheduled_time.trim().to_string(),
                client_name,
                client_phone: body.client_phone.trim().to_string(),
                hourly_rate: worker.hourly_rate.clone(),
                duration_hours,
                total_amount,
                worker_id: worker.id,
                client_id: client.id,
            })
            .await?;

        tracing::info!(
            "Job {} created by client {} for worker {}",
            job.id,
            client.id,
            worker.id
        );

        self.notification_service
            .notify_job_request(worker.user_id, &job)
            .await;

        Ok(job)
    }

    /// Worker-driven status change, checked against the transition table and
    /// written as a compare-and-set on the current status.
    pub async fn update_status(
        &self,
        job_id: Uuid,
        user: &User,
        to: JobStatus,
    ) -> Result<Job, ServiceError> {
        let job = self.get_job(job_id).await?;
        let worker = self.worker_for_job(&job, user).await?;

        if !job.status.can_transition_to(to) {
            return Err(ServiceError::InvalidTransition {
                from: job.status,
                to,
            });
        }

        let updated = self
            .db_client
            .transition_job_status(job.id, job.status, to)
            .await?
            .ok_or(ServiceError::StatusConflict(job.id))?;

        tracing::info!(
            "Job {} moved from {} to {} by worker {}",
            job.id,
            job.status.to_str(),
            updated.status.to_str(),
            worker.id
        );

        self.notification_service
            .notify_job_status(&updated, &worker.name)
            .await;

        Ok(updated)
    }

    /// The client may withdraw a request until work has started.
    pub async fn cancel_by_client(&self, job_id: Uuid, user: &User) -> Result<Job, ServiceError> {
        let job = self.get_job(job_id).await?;

        if !job.is_client(user.id) {
            return Err(ServiceError::UnauthorizedJobAccess(user.id, job.id));
        }

        if !job.status.can_transition_to(JobStatus::Cancelled) {
            return Err(ServiceError::InvalidTransition {
                from: job.status,
                to: JobStatus::Cancelled,
            });
        }

        let cancelled = self
            .db_client
            .transition_job_status(job.id, job.status, JobStatus::Cancelled)
            .await?
            .ok_or(ServiceError::StatusConflict(job.id))?;

        if let Some(worker) = self.db_client.get_worker_by_id(cancelled.worker_id).await? {
            self.notification_service
                .notify_job_cancelled_by_client(worker.user_id, &cancelled)
                .await;
        }

        Ok(cancelled)
    }

    /// Job details for its client, its worker, or an admin.
    pub async fn get_job_for(&self, job_id: Uuid, user: &User) -> Result<Job, ServiceError> {
        let job = self.get_job(job_id).await?;

        if job.is_client(user.id) || user.is_admin() {
            return Ok(job);
        }

        match self.db_client.get_worker_by_user_id(user.id).await? {
            Some(worker) if worker.id == job.worker_id => Ok(job),
            _ => Err(ServiceError::UnauthorizedJobAccess(user.id, job.id)),
        }
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        self.db_client
            .get_job_by_id(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))
    }

    async fn worker_for_job(&self, job: &Job, user: &User) -> Result<WorkerProfile, ServiceError> {
        match self.db_client.get_worker_by_user_id(user.id).await? {
            Some(worker) if worker.id == job.worker_id => Ok(worker),
            _ => Err(ServiceError::UnauthorizedJobAccess(user.id, job.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_keeps_punctuation() {
        assert_eq!(
            required_text("Fix sink & tap <b>today</b>", "Title").unwrap(),
            "Fix sink & tap today"
        );
    }

    #[test]
    fn test_required_text_rejects_markup_only_input() {
        let err = required_text("<script>x</script>", "Title").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(msg) if msg == "Title cannot be empty"));
    }

    mod with_database {
        use sqlx::PgPool;

        use super::*;
        use crate::{
            db::{fixtures, notificationdb::NotificationExt},
            models::{notificationmodel::NotificationType, usermodel::UserRole},
        };

        fn service(db: &Arc<DBClient>) -> JobService {
            JobService::new(db.clone(), Arc::new(NotificationService::new(db.clone())))
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "requires a PostgreSQL DATABASE_URL"]
        async fn test_accepting_notifies_client_once(pool: PgPool) {
            let db = Arc::new(DBClient::new(pool));
            let client = fixtures::user(&db, "uid-sita", "Sita", UserRole::Client).await;
            let (worker_user, worker) = fixtures::worker(&db, "Ram").await;
            let job = fixtures::job(&db, &client, &worker).await;
            assert_eq!(job.status, JobStatus::Pending);

            let jobs = service(&db);
            let accepted = jobs
                .update_status(job.id, &worker_user, JobStatus::Accepted)
                .await
                .unwrap();
            assert_eq!(accepted.status, JobStatus::Accepted);

            let again = jobs
                .update_status(job.id, &worker_user, JobStatus::Accepted)
                .await
                .unwrap_err();
            assert!(matches!(again, ServiceError::InvalidTransition { .. }));

            let notices = db.get_notifications(client.id, 50, 0).await.unwrap();
            assert_eq!(notices.len(), 1);
            assert_eq!(notices[0].notification_type, NotificationType::JobStatus);
            assert_eq!(notices[0].job_id, Some(job.id));
            assert!(notices[0].message.contains("Ram"));
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "requires a PostgreSQL DATABASE_URL"]
        async fn test_only_the_assigned_worker_moves_a_job(pool: PgPool) {
            let db = Arc::new(DBClient::new(pool));
            let client = fixtures::user(&db, "uid-sita", "Sita", UserRole::Client).await;
            let (_, worker) = fixtures::worker(&db, "Ram").await;
            let (other_user, _) = fixtures::worker(&db, "Gita").await;
            let job = fixtures::job(&db, &client, &worker).await;

            let result = service(&db)
                .update_status(job.id, &other_user, JobStatus::Accepted)
                .await;
            assert!(result.is_err());

            assert_eq!(db.count_notifications(client.id).await.unwrap(), 0);
        }
    }
}
