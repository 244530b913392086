// db/jobdb.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{types::BigDecimal, Error};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::jobmodel::{Job, JobStatus};

#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub location: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub client_name: String,
    pub client_phone: String,
    pub hourly_rate: BigDecimal,
    pub duration_hours: BigDecimal,
    pub total_amount: BigDecimal,
    pub worker_id: Uuid,
    pub client_id: Uuid,
}

/// Which side of the job a listing is for.
#[derive(Debug, Clone, Copy)]
pub enum JobParty {
    Client(Uuid),
    Worker(Uuid),
    Any,
}

impl JobParty {
    fn binds(&self) -> (Option<Uuid>, Option<Uuid>) {
        match *self {
            JobParty::Client(id) => (Some(id), None),
            JobParty::Worker(id) => (None, Some(id)),
            JobParty::Any => (None, None),
        }
    }
}

#[async_trait]
pub trait JobExt {
    async fn create_job(&self, job: NewJob) -> Result<Job, Error>;

    async fn get_job_by_id(&self, job_id: Uuid) -> Result<Option<Job>, Error>;

    async fn get_jobs(
        &self,
        party: JobParty,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, Error>;

    async fn count_jobs(&self, party: JobParty, status: Option<JobStatus>) -> Result<i64, Error>;

    /// Compare-and-set status change. `None` when the job is no longer in `from`.
    /// Reaching `completed` also bumps the worker's completed job counter.
    async fn transition_job_status(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Option<Job>, Error>;

    async fn count_jobs_by_status(&self) -> Result<Vec<(JobStatus, i64)>, Error>;
}

#[async_trait]
impl JobExt for DBClient {
    async fn create_job(&self, job: NewJob) -> Result<Job, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs
            (title, description, location, scheduled_date, scheduled_time,
             client_name, client_phone, hourly_rate, duration_hours, total_amount,
             worker_id, client_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING
                id, title, description, location, scheduled_date, scheduled_time,
                client_name, client_phone, hourly_rate, duration_hours, total_amount,
                status, payment_status, worker_id, client_id,
                completed_at, cancelled_at, created_at, updated_at
            "#,
        )
        .bind(job.title)
        .bind(job.description)
        .bind(job.location)
        .bind(job.scheduled_date)
        .bind(job.scheduled_time)
        .bind(job.client_name)
        .bind(job.client_phone)
        .bind(job.hourly_rate)
        .bind(job.duration_hours)
        .bind(job.total_amount)
        .bind(job.worker_id)
        .bind(job.client_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_job_by_id(&self, job_id: Uuid) -> Result<Option<Job>, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT
                id, title, description, location, scheduled_date, scheduled_time,
                client_name, client_phone, hourly_rate, duration_hours, total_amount,
                status, payment_status, worker_id, client_id,
                completed_at, cancelled_at, created_at, updated_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_jobs(
        &self,
        party: JobParty,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, Error> {
        let (client_id, worker_id) = party.binds();

        sqlx::query_as::<_, Job>(
            r#"
            SELECT
                id, title, description, location, scheduled_date, scheduled_time,
                client_name, client_phone, hourly_rate, duration_hours, total_amount,
                status, payment_status, worker_id, client_id,
                completed_at, cancelled_at, created_at, updated_at
            FROM jobs
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::uuid IS NULL OR worker_id = $2)
              AND ($3::job_status IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(client_id)
        .bind(worker_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_jobs(&self, party: JobParty, status: Option<JobStatus>) -> Result<i64, Error> {
        let (client_id, worker_id) = party.binds();

        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM jobs
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::uuid IS NULL OR worker_id = $2)
              AND ($3::job_status IS NULL OR status = $3)
            "#,
        )
        .bind(client_id)
        .bind(worker_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
    }

    async fn transition_job_status(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Option<Job>, Error> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = $3,
                completed_at = CASE WHEN $3 = 'completed'::job_status THEN NOW() ELSE completed_at END,
                cancelled_at = CASE WHEN $3 = 'cancelled'::job_status THEN NOW() ELSE cancelled_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING
                id, title, description, location, scheduled_date, scheduled_time,
                client_name, client_phone, hourly_rate, duration_hours, total_amount,
                status, payment_status, worker_id, client_id,
                completed_at, cancelled_at, created_at, updated_at
            "#,
        )
        .bind(job_id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(job) = &job {
            if job.status == JobStatus::Completed {
                sqlx::query(
                    r#"
                    UPDATE workers
                    SET completed_jobs = completed_jobs + 1, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(job.worker_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        Ok(job)
    }

    async fn count_jobs_by_status(&self) -> Result<Vec<(JobStatus, i64)>, Error> {
        sqlx::query_as::<_, (JobStatus, i64)>(
            r#"
            SELECT status, COUNT(*)
            FROM jobs
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::{
        db::{fixtures, workerdb::WorkerExt},
        models::usermodel::UserRole,
    };

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_stale_transition_changes_nothing(pool: PgPool) {
        let db = DBClient::new(pool);
        let client = fixtures::user(&db, "uid-sita", "Sita", UserRole::Client).await;
        let (_, worker) = fixtures::worker(&db, "Ram").await;
        let job = fixtures::job(&db, &client, &worker).await;

        let accepted = db
            .transition_job_status(job.id, JobStatus::Pending, JobStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(accepted.map(|j| j.status), Some(JobStatus::Accepted));

        // A second writer that still saw the job as pending.
        let stale = db
            .transition_job_status(job.id, JobStatus::Pending, JobStatus::Cancelled)
            .await
            .unwrap();
        assert!(stale.is_none());

        let current = db.get_job_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(current.status, JobStatus::Accepted);
        assert!(current.cancelled_at.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_completion_counts_once(pool: PgPool) {
        let db = DBClient::new(pool);
        let client = fixtures::user(&db, "uid-sita", "Sita", UserRole::Client).await;
        let (_, worker) = fixtures::worker(&db, "Ram").await;
        let job = fixtures::job(&db, &client, &worker).await;

        for (from, to) in [
            (JobStatus::Pending, JobStatus::Accepted),
            (JobStatus::Accepted, JobStatus::InProgress),
            (JobStatus::InProgress, JobStatus::Completed),
        ] {
            assert!(db.transition_job_status(job.id, from, to).await.unwrap().is_some());
        }

        let repeat = db
            .transition_job_status(job.id, JobStatus::InProgress, JobStatus::Completed)
            .await
            .unwrap();
        assert!(repeat.is_none());

        let completed = db.get_job_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(completed.status, JobStatus::Completed);
        assert!(completed.completed_at.is_some());

        let worker = db.get_worker_by_id(worker.id).await.unwrap().unwrap();
        assert_eq!(worker.completed_jobs, 1);
    }
}
