// db/userdb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::usermodel::{RoleChange, User, UserRole};

#[async_trait]
pub trait UserExt {
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;

    async fn get_user_by_firebase_uid(
        &self,
        firebase_uid: &str,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Inserts the user, or returns the existing row untouched when the uid is already registered.
    /// Inserts the user unless the uid is already registered. The flag is
    /// `true` only when a new row was created.
    async fn save_user(
        &self,
        firebase_uid: &str,
        name: &str,
        email: &str,
        role: UserRole,
    ) -> Result<(User, bool), sqlx::Error>;

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User, sqlx::Error>;

    /// Changes the role and appends the audit row in one transaction.
    async fn change_user_role(
        &self,
        user_id: Uuid,
        new_role: UserRole,
        changed_by: Uuid,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn get_role_changes(&self, user_id: Uuid) -> Result<Vec<RoleChange>, sqlx::Error>;

    async fn get_users(
        &self,
        role: Option<UserRole>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, sqlx::Error>;

    async fn get_user_count(&self, role: Option<UserRole>) -> Result<i64, sqlx::Error>;

    async fn count_users_by_role(&self) -> Result<Vec<(UserRole, i64)>, sqlx::Error>;

    async fn delete_user(&self, user_id: Uuid) -> Result<u64, sqlx::Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, firebase_uid, name, email, role, avatar_url, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_user_by_firebase_uid(
        &self,
        firebase_uid: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, firebase_uid, name, email, role, avatar_url, created_at, updated_at
            FROM users
            WHERE firebase_uid = $1
            "#,
        )
        .bind(firebase_uid)
        .fetch_optional(&self.pool)
        .await
    }

    async fn save_user(
        &self,
        firebase_uid: &str,
        name: &str,
        email: &str,
        role: UserRole,
    ) -> Result<(User, bool), sqlx::Error> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (firebase_uid, name, email, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (firebase_uid) DO NOTHING
            RETURNING id, firebase_uid, name, email, role, avatar_url, created_at, updated_at
            "#,
        )
        .bind(firebase_uid)
        .bind(name)
        .bind(email)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(user) => Ok((user, true)),
            None => self
                .get_user_by_firebase_uid(firebase_uid)
                .await?
                .map(|user| (user, false))
                .ok_or(sqlx::Error::RowNotFound),
        }
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                avatar_url = COALESCE($3, avatar_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, firebase_uid, name, email, role, avatar_url, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(avatar_url)
        .fetch_one(&self.pool)
        .await
    }

    async fn change_user_role(
        &self,
        user_id: Uuid,
        new_role: UserRole,
        changed_by: Uuid,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let current: Option<UserRole> =
            sqlx::query_scalar("SELECT role FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(current) = current else {
            return Ok(None);
        };

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, firebase_uid, name, email, role, avatar_url, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(new_role)
        .fetch_one(&mut *tx)
        .await?;

        if current != new_role {
            sqlx::query(
                r#"
                INSERT INTO role_changes (user_id, from_role, to_role, changed_by)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(user_id)
            .bind(current)
            .bind(new_role)
            .bind(changed_by)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Some(user))
    }

    async fn get_role_changes(&self, user_id: Uuid) -> Result<Vec<RoleChange>, sqlx::Error> {
        sqlx::query_as::<_, RoleChange>(
            r#"
            SELECT id, user_id, from_role, to_role, changed_by, created_at
            FROM role_changes
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_users(
        &self,
        role: Option<UserRole>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, firebase_uid, name, email, role, avatar_url, created_at, updated_at
            FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(role)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_user_count(&self, role: Option<UserRole>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
            "#,
        )
        .bind(role)
        .fetch_one(&self.pool)
        .await
    }

    async fn count_users_by_role(&self) -> Result<Vec<(UserRole, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (UserRole, i64)>(
            r#"
            SELECT role, COUNT(*)
            FROM users
            GROUP BY role
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_save_user_twice_returns_existing_row(pool: PgPool) {
        let db = DBClient::new(pool);

        let (first, created) = db
            .save_user("uid-sita", "Sita", "sita@example.com", UserRole::Worker)
            .await
            .unwrap();
        assert!(created);

        let (again, created) = db
            .save_user("uid-sita", "Someone Else", "other@example.com", UserRole::Client)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
        assert_eq!(again.name, "Sita");
        assert_eq!(again.role, UserRole::Worker);
    }
}
