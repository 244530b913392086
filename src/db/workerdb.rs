// db/workerdb.rs
use async_trait::async_trait;
use sqlx::{types::BigDecimal, Error};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::workermodel::WorkerProfile;

#[derive(Debug, Default, Clone)]
pub struct WorkerSearch {
    pub category: Option<String>,
    pub available: Option<bool>,
    pub location: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct WorkerProfileChanges {
    pub categories: Option<Vec<String>>,
    pub hourly_rate: Option<BigDecimal>,
    pub is_available: Option<bool>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
}

#[async_trait]
pub trait WorkerExt {
    #[allow(clippy::too_many_arguments)]
    async fn create_worker_profile(
        &self,
        user_id: Uuid,
        name: &str,
        categories: Vec<String>,
        hourly_rate: BigDecimal,
        is_available: bool,
        bio: String,
        location: String,
        phone: Option<String>,
    ) -> Result<WorkerProfile, Error>;

    async fn get_worker_by_id(&self, worker_id: Uuid) -> Result<Option<WorkerProfile>, Error>;

    async fn get_worker_by_user_id(&self, user_id: Uuid) -> Result<Option<WorkerProfile>, Error>;

    async fn update_worker_profile(
        &self,
        worker_id: Uuid,
        changes: WorkerProfileChanges,
    ) -> Result<WorkerProfile, Error>;

    async fn update_worker_image(
        &self,
        worker_id: Uuid,
        image_url: &str,
    ) -> Result<WorkerProfile, Error>;

    async fn search_workers(
        &self,
        search: &WorkerSearch,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkerProfile>, Error>;

    async fn count_workers(&self, search: &WorkerSearch) -> Result<i64, Error>;
}

#[async_trait]
impl WorkerExt for DBClient {
    async fn create_worker_profile(
        &self,
        user_id: Uuid,
        name: &str,
        categories: Vec<String>,
        hourly_rate: BigDecimal,
        is_available: bool,
        bio: String,
        location: String,
        phone: Option<String>,
    ) -> Result<WorkerProfile, Error> {
        sqlx::query_as::<_, WorkerProfile>(
            r#"
            INSERT INTO workers
            (user_id, name, categories, hourly_rate, is_available, bio, location, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id, user_id, name, categories, hourly_rate, is_available,
                bio, location, phone, profile_image_url, rating, completed_jobs,
                created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(categories)
        .bind(hourly_rate)
        .bind(is_available)
        .bind(bio)
        .bind(location)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_worker_by_id(&self, worker_id: Uuid) -> Result<Option<WorkerProfile>, Error> {
        sqlx::query_as::<_, WorkerProfile>(
            r#"
            SELECT
                id, user_id, name, categories, hourly_rate, is_available,
                bio, location, phone, profile_image_url, rating, completed_jobs,
                created_at, updated_at
            FROM workers
            WHERE id = $1
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_worker_by_user_id(&self, user_id: Uuid) -> Result<Option<WorkerProfile>, Error> {
        sqlx::query_as::<_, WorkerProfile>(
            r#"
            SELECT
                id, user_id, name, categories, hourly_rate, is_available,
                bio, location, phone, profile_image_url, rating, completed_jobs,
                created_at, updated_at
            FROM workers
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_worker_profile(
        &self,
        worker_id: Uuid,
        changes: WorkerProfileChanges,
    ) -> Result<WorkerProfile, Error> {
        sqlx::query_as::<_, WorkerProfile>(
            r#"
            UPDATE workers
            SET categories = COALESCE($2, categories),
                hourly_rate = COALESCE($3, hourly_rate),
                is_available = COALESCE($4, is_available),
                bio = COALESCE($5, bio),
                location = COALESCE($6, location),
                phone = COALESCE($7, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, user_id, name, categories, hourly_rate, is_available,
                bio, location, phone, profile_image_url, rating, completed_jobs,
                created_at, updated_at
            "#,
        )
        .bind(worker_id)
        .bind(changes.categories)
        .bind(changes.hourly_rate)
        .bind(changes.is_available)
        .bind(changes.bio)
        .bind(changes.location)
        .bind(changes.phone)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_worker_image(
        &self,
        worker_id: Uuid,
        image_url: &str,
    ) -> Result<WorkerProfile, Error> {
        sqlx::query_as::<_, WorkerProfile>(
            r#"
            UPDATE workers
            SET profile_image_url = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, user_id, name, categories, hourly_rate, is_available,
                bio, location, phone, profile_image_url, rating, completed_jobs,
                created_at, updated_at
            "#,
        )
        .bind(worker_id)
        .bind(image_url)
        .fetch_one(&self.pool)
        .await
    }

    async fn search_workers(
        &self,
        search: &WorkerSearch,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkerProfile>, Error> {
        sqlx::query_as::<_, WorkerProfile>(
            r#"
            SELECT
                id, user_id, name, categories, hourly_rate, is_available,
                bio, location, phone, profile_image_url, rating, completed_jobs,
                created_at, updated_at
            FROM workers
            WHERE ($1::text IS NULL OR $1 = ANY(categories))
              AND ($2::boolean IS NULL OR is_available = $2)
              AND ($3::text IS NULL OR location ILIKE '%' || $3 || '%')
            ORDER BY rating DESC, completed_jobs DESC, created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(search.category.as_deref())
        .bind(search.available)
        .bind(search.location.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_workers(&self, search: &WorkerSearch) -> Result<i64, Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM workers
            WHERE ($1::text IS NULL OR $1 = ANY(categories))
              AND ($2::boolean IS NULL OR is_available = $2)
              AND ($3::text IS NULL OR location ILIKE '%' || $3 || '%')
            "#,
        )
        .bind(search.category.as_deref())
        .bind(search.available)
        .bind(search.location.as_deref())
        .fetch_one(&self.pool)
        .await
    }
}
