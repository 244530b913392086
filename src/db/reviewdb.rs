// db/reviewdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::reviewmodel::{Review, ReviewWithClient};

#[async_trait]
pub trait ReviewExt {
    /// Inserts the review and recomputes the worker's average rating in one transaction.
    async fn create_review_and_refresh_rating(
        &self,
        worker_id: Uuid,
        job_id: Uuid,
        client_id: Uuid,
        rating: i16,
        comment: &str,
    ) -> Result<Review, Error>;

    async fn get_review_by_job(&self, job_id: Uuid) -> Result<Option<Review>, Error>;

    async fn get_worker_reviews(
        &self,
        worker_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReviewWithClient>, Error>;

    async fn count_worker_reviews(&self, worker_id: Uuid) -> Result<i64, Error>;
}

#[async_trait]
impl ReviewExt for DBClient {
    async fn create_review_and_refresh_rating(
        &self,
        worker_id: Uuid,
        job_id: Uuid,
        client_id: Uuid,
        rating: i16,
        comment: &str,
    ) -> Result<Review, Error> {
        let mut tx = self.pool.begin().await?;

        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (worker_id, job_id, client_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, worker_id, job_id, client_id, rating, comment, created_at
            "#,
        )
        .bind(worker_id)
        .bind(job_id)
        .bind(client_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE workers
            SET rating = COALESCE(
                    (SELECT AVG(rating)::DOUBLE PRECISION FROM reviews WHERE worker_id = $1),
                    0
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(worker_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(review)
    }

    async fn get_review_by_job(&self, job_id: Uuid) -> Result<Option<Review>, Error> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT id, worker_id, job_id, client_id, rating, comment, created_at
            FROM reviews
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_worker_reviews(
        &self,
        worker_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReviewWithClient>, Error> {
        sqlx::query_as::<_, ReviewWithClient>(
            r#"
            SELECT
                r.id, r.worker_id, r.job_id, r.client_id, u.name AS client_name,
                r.rating, r.comment, r.created_at
            FROM reviews r
            JOIN users u ON u.id = r.client_id
            WHERE r.worker_id = $1
            ORDER BY r.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(worker_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_worker_reviews(&self, worker_id: Uuid) -> Result<i64, Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE worker_id = $1")
            .bind(worker_id)
            .fetch_one(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::{
        db::{fixtures, is_unique_violation, workerdb::WorkerExt},
        models::usermodel::UserRole,
    };

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_second_review_for_a_job_hits_unique_index(pool: PgPool) {
        let db = DBClient::new(pool);
        let client = fixtures::user(&db, "uid-sita", "Sita", UserRole::Client).await;
        let (_, worker) = fixtures::worker(&db, "Ram").await;
        let job = fixtures::job(&db, &client, &worker).await;

        db.create_review_and_refresh_rating(worker.id, job.id, client.id, 5, "Quick and tidy")
            .await
            .unwrap();

        let err = db
            .create_review_and_refresh_rating(worker.id, job.id, client.id, 1, "Changed my mind")
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let review = db.get_review_by_job(job.id).await.unwrap().unwrap();
        assert_eq!(review.rating, 5);

        let worker = db.get_worker_by_id(worker.id).await.unwrap().unwrap();
        assert_eq!(worker.rating, 5.0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_rating_is_average_of_all_reviews(pool: PgPool) {
        let db = DBClient::new(pool);
        let client = fixtures::user(&db, "uid-sita", "Sita", UserRole::Client).await;
        let (_, worker) = fixtures::worker(&db, "Ram").await;

        for rating in [5, 4] {
            let job = fixtures::job(&db, &client, &worker).await;
            db.create_review_and_refresh_rating(worker.id, job.id, client.id, rating, "")
                .await
                .unwrap();
        }

        let worker = db.get_worker_by_id(worker.id).await.unwrap().unwrap();
        assert_eq!(worker.rating, 4.5);
        assert_eq!(db.count_worker_reviews(worker.id).await.unwrap(), 2);
    }
}
