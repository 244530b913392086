use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{
        jobmodel::JobPaymentStatus,
        paymentmodel::{Payment, PaymentStatus},
    },
    utils::pricing::Quote,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPaymentDto {
    pub job_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConfirmStripePaymentDto {
    pub job_id: Uuid,

    #[validate(length(min = 1, max = 255, message = "payment_intent_id is required"))]
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerifyKhaltiPaymentDto {
    pub job_id: Uuid,

    #[validate(length(min = 1, max = 255, message = "pidx is required"))]
    pub pidx: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentQueryDto {
    pub status: Option<PaymentStatus>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct JobQuoteDto {
    pub job_id: Uuid,
    pub payable: bool,
    pub payment_status: JobPaymentStatus,
    pub quote: Quote,
}

#[derive(Debug, Serialize)]
pub struct StripeCheckoutDto {
    pub payment_id: Uuid,
    pub payment_intent_id: String,
    pub client_secret: String,
    pub currency: String,
    pub quote: Quote,
}

#[derive(Debug, Serialize)]
pub struct KhaltiCheckoutDto {
    pub payment_id: Uuid,
    pub pidx: String,
    pub payment_url: String,
    pub expires_at: Option<String>,
    pub quote: Quote,
}

#[derive(Debug, Serialize)]
pub struct PaymentConfirmationDto {
    pub payment: Payment,
    /// False when this transaction had already been settled earlier.
    pub newly_settled: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct ReconciliationReport {
    pub checked: usize,
    pub settled: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errors: usize,
}
