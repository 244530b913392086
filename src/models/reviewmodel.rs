use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReviewWithClient {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub client_name: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
