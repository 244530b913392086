// db/notificationdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::notificationmodel::{Notification, NotificationType};

#[async_trait]
pub trait NotificationExt {
    async fn create_notification(
        &self,
        recipient_id: Uuid,
        message: &str,
        notification_type: NotificationType,
        job_id: Option<Uuid>,
    ) -> Result<Notification, Error>;

    async fn get_notifications(
        &self,
        recipient_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, Error>;

    async fn count_notifications(&self, recipient_id: Uuid) -> Result<i64, Error>;

    async fn count_unread(&self, recipient_id: Uuid) -> Result<i64, Error>;

    /// `None` when the notification does not exist or belongs to someone else.
    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Notification>, Error>;

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<u64, Error>;

    async fn delete_notification(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<u64, Error>;
}

#[async_trait]
impl NotificationExt for DBClient {
    async fn create_notification(
        &self,
        recipient_id: Uuid,
        message: &str,
        notification_type: NotificationType,
        job_id: Option<Uuid>,
    ) -> Result<Notification, Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient_id, message, notification_type, job_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, recipient_id, message, notification_type, is_read, job_id, created_at
            "#,
        )
        .bind(recipient_id)
        .bind(message)
        .bind(notification_type)
        .bind(job_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_notifications(
        &self,
        recipient_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, message, notification_type, is_read, job_id, created_at
            FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(recipient_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_notifications(&self, recipient_id: Uuid) -> Result<i64, Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1")
            .bind(recipient_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn count_unread(&self, recipient_id: Uuid) -> Result<i64, Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Notification>, Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE id = $1 AND recipient_id = $2
            RETURNING id, recipient_id, message, notification_type, is_read, job_id, created_at
            "#,
        )
        .bind(notification_id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_notification(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(notification_id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::{db::fixtures, models::usermodel::UserRole};

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_read_all_clears_only_the_callers_unread(pool: PgPool) {
        let db = DBClient::new(pool);
        let sita = fixtures::user(&db, "uid-sita", "Sita", UserRole::Client).await;
        let hari = fixtures::user(&db, "uid-hari", "Hari", UserRole::Client).await;

        let mut first = None;
        for n in 0..3 {
            let notification = db
                .create_notification(sita.id, &format!("Update {}", n), NotificationType::System, None)
                .await
                .unwrap();
            first.get_or_insert(notification.id);
        }
        db.create_notification(hari.id, "Welcome", NotificationType::System, None)
            .await
            .unwrap();

        db.mark_notification_read(first.unwrap(), sita.id).await.unwrap().unwrap();
        assert_eq!(db.count_unread(sita.id).await.unwrap(), 2);

        assert_eq!(db.mark_all_notifications_read(sita.id).await.unwrap(), 2);
        assert_eq!(db.count_unread(sita.id).await.unwrap(), 0);

        let all = db.get_notifications(sita.id, 50, 0).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|n| n.is_read));

        assert_eq!(db.count_unread(hari.id).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_notifications_are_scoped_to_recipient(pool: PgPool) {
        let db = DBClient::new(pool);
        let sita = fixtures::user(&db, "uid-sita", "Sita", UserRole::Client).await;
        let hari = fixtures::user(&db, "uid-hari", "Hari", UserRole::Client).await;

        let notification = db
            .create_notification(sita.id, "Job accepted", NotificationType::System, None)
            .await
            .unwrap();

        assert!(db.mark_notification_read(notification.id, hari.id).await.unwrap().is_none());
        assert_eq!(db.delete_notification(notification.id, hari.id).await.unwrap(), 0);
        assert_eq!(db.delete_notification(notification.id, sita.id).await.unwrap(), 1);
    }
}
