use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Stripe,
    Khalti,
}

impl PaymentProvider {
    pub fn to_str(&self) -> &str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Khalti => "khalti",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_record_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn to_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub worker_id: Uuid,
    pub provider: PaymentProvider,
    pub provider_reference: String,
    pub transaction_id: Option<String>,
    pub amount: BigDecimal,
    pub service_fee: BigDecimal,
    pub total_charged: BigDecimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// What a provider reported back about a checkout, in provider-neutral terms.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Succeeded {
        transaction_id: String,
        amount_minor: i64,
    },
    Pending,
    Failed(String),
}
