// db/categorydb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::workermodel::Category;

#[async_trait]
pub trait CategoryExt {
    async fn get_categories(&self) -> Result<Vec<Category>, Error>;

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, Error>;

    async fn create_category(
        &self,
        name: &str,
        slug: &str,
        description: &str,
        image_url: Option<String>,
    ) -> Result<Category, Error>;

    async fn update_category(
        &self,
        category_id: Uuid,
        name: Option<String>,
        slug: Option<String>,
        description: Option<String>,
        image_url: Option<String>,
    ) -> Result<Option<Category>, Error>;

    async fn delete_category(&self, category_id: Uuid) -> Result<u64, Error>;

    /// Of the given slugs, how many exist.
    async fn count_existing_slugs(&self, slugs: &[String]) -> Result<i64, Error>;
}

#[async_trait]
impl CategoryExt for DBClient {
    async fn get_categories(&self) -> Result<Vec<Category>, Error> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, slug, description, image_url, created_at
            FROM categories
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, Error> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, slug, description, image_url, created_at
            FROM categories
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_category(
        &self,
        name: &str,
        slug: &str,
        description: &str,
        image_url: Option<String>,
    ) -> Result<Category, Error> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, slug, description, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, slug, description, image_url, created_at
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(image_url)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_category(
        &self,
        category_id: Uuid,
        name: Option<String>,
        slug: Option<String>,
        description: Option<String>,
        image_url: Option<String>,
    ) -> Result<Option<Category>, Error> {
        let mut tx = self.pool.begin().await?;

        let old_slug: Option<String> =
            sqlx::query_scalar("SELECT slug FROM categories WHERE id = $1 FOR UPDATE")
                .bind(category_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(old_slug) = old_slug else {
            return Ok(None);
        };

        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                image_url = COALESCE($5, image_url)
            WHERE id = $1
            RETURNING id, name, slug, description, image_url, created_at
            "#,
        )
        .bind(category_id)
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(image_url)
        .fetch_one(&mut *tx)
        .await?;

        // Workers reference categories by slug.
        if category.slug != old_slug {
            sqlx::query(
                r#"
                UPDATE workers
                SET categories = array_replace(categories, $1, $2), updated_at = NOW()
                WHERE $1 = ANY(categories)
                "#,
            )
            .bind(&old_slug)
            .bind(&category.slug)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Some(category))
    }

    async fn delete_category(&self, category_id: Uuid) -> Result<u64, Error> {
        let mut tx = self.pool.begin().await?;

        let slug: Option<String> =
            sqlx::query_scalar("DELETE FROM categories WHERE id = $1 RETURNING slug")
                .bind(category_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(slug) = slug else {
            return Ok(0);
        };

        sqlx::query(
            r#"
            UPDATE workers
            SET categories = array_remove(categories, $1), updated_at = NOW()
            WHERE $1 = ANY(categories)
            "#,
        )
        .bind(&slug)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(1)
    }

    async fn count_existing_slugs(&self, slugs: &[String]) -> Result<i64, Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE slug = ANY($1)")
            .bind(slugs)
            .fetch_one(&self.pool)
            .await
    }
}
