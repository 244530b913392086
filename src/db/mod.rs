pub mod db;
pub mod userdb;
pub mod workerdb;
pub mod categorydb;
pub mod jobdb;
pub mod paymentdb;
pub mod reviewdb;
pub mod notificationdb;

/// Postgres SQLSTATE for unique_violation.
pub const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for foreign_key_violation.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION))
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION))
}

/// Seed rows for tests that run against a real Postgres through `#[sqlx::test]`.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::str::FromStr;

    use chrono::{Duration, Utc};
    use sqlx::types::BigDecimal;

    use super::{
        db::DBClient,
        jobdb::{JobExt, NewJob},
        userdb::UserExt,
        workerdb::WorkerExt,
    };
    use crate::models::{
        jobmodel::Job,
        usermodel::{User, UserRole},
        workermodel::WorkerProfile,
    };

    pub fn money(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    pub async fn user(db: &DBClient, uid: &str, name: &str, role: UserRole) -> User {
        let email = format!("{}@example.com", uid);
        let (user, created) = db.save_user(uid, name, &email, role).await.unwrap();
        assert!(created);
        user
    }

    pub async fn worker(db: &DBClient, name: &str) -> (User, WorkerProfile) {
        let user = user(db, &format!("uid-{}", name.to_lowercase()), name, UserRole::Worker).await;
        let profile = db
            .create_worker_profile(
                user.id,
                &user.name,
                vec!["plumbing".to_string()],
                money("25.00"),
                true,
                "Pipes and taps".to_string(),
                "Kathmandu".to_string(),
                None,
            )
            .await
            .unwrap();
        (user, profile)
    }

    pub async fn job(db: &DBClient, client: &User, worker: &WorkerProfile) -> Job {
        db.create_job(NewJob {
            title: "Fix kitchen sink".to_string(),
            description: "Leaks under the basin".to_string(),
            location: "Kathmandu".to_string(),
            scheduled_date: (Utc::now() + Duration::days(1)).date_naive(),
            scheduled_time: "10:00".to_string(),
            client_name: client.name.clone(),
            client_phone: "+9779800000000".to_string(),
            hourly_rate: worker.hourly_rate.clone(),
            duration_hours: money("2"),
            total_amount: money("50.00"),
            worker_id: worker.id,
            client_id: client.id,
        })
        .await
        .unwrap()
    }
}
