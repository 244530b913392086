// service/payment_service.rs
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::{
        db::DBClient,
        jobdb::JobExt,
        paymentdb::{NewPayment, PaymentExt, SettlementOutcome},
        workerdb::WorkerExt,
    },
    dtos::paymentdtos::{
        JobQuoteDto, KhaltiCheckoutDto, PaymentConfirmationDto, ReconciliationReport,
        StripeCheckoutDto,
    },
    models::{
        jobmodel::{Job, JobPaymentStatus, JobStatus},
        paymentmodel::{Payment, PaymentProvider, PaymentStatus, ProviderOutcome},
        usermodel::User,
    },
    service::{
        error::ServiceError,
        notification_service::NotificationService,
        payment_provider::{verify_stripe_signature, PaymentProviderService, StripePaymentIntent},
    },
    utils::pricing::{self, Quote},
};

const KHALTI_CURRENCY: &str = "npr";

/// Pending checkouts older than this are looked up at their provider.
pub const RECONCILE_AFTER_MINUTES: i32 = 15;
const RECONCILE_BATCH: i64 = 100;

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct PaymentService {
    db_client: Arc<DBClient>,
    provider: Arc<PaymentProviderService>,
    notification_service: Arc<NotificationService>,
    stripe_webhook_secret: String,
}

impl PaymentService {
    pub fn new(
        db_client: Arc<DBClient>,
        provider: Arc<PaymentProviderService>,
        notification_service: Arc<NotificationService>,
        stripe_webhook_secret: String,
    ) -> Self {
        Self {
            db_client,
            provider,
            notification_service,
            stripe_webhook_secret,
        }
    }

    /// The amounts a participant would be charged, identical to what settlement checks.
    pub async fn quote_for_job(&self, job_id: Uuid, user: &User) -> Result<JobQuoteDto, ServiceError> {
        let job = self.get_job(job_id).await?;
        self.ensure_participant(&job, user).await?;

        Ok(JobQuoteDto {
            job_id: job.id,
            payable: job.is_payable(),
            payment_status: job.payment_status,
            quote: quote_job(&job)?,
        })
    }

    pub async fn create_stripe_intent(
        &self,
        job_id: Uuid,
        user: &User,
    ) -> Result<StripeCheckoutDto, ServiceError> {
        self.ensure_enabled(PaymentProvider::Stripe)?;
        let job = self.payable_job(job_id, user).await?;
        let quote = quote_job(&job)?;

        let intent = self
            .provider
            .create_stripe_intent(job.id, quote.total_minor, &format!("Payment for {}", job.title))
            .await?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            ServiceError::Other("Stripe did not return a client secret".to_string())
        })?;

        let payment = self
            .db_client
            .create_pending_payment(self.new_payment(
                &job,
                PaymentProvider::Stripe,
                intent.id.clone(),
                &quote,
                self.provider.stripe_currency().to_string(),
                serde_json::json!({ "intent_status": intent.status }),
            ))
            .await?;

        tracing::info!("Stripe intent {} created for job {}", intent.id, job.id);

        Ok(StripeCheckoutDto {
            payment_id: payment.id,
            payment_intent_id: intent.id,
            client_secret,
            currency: intent.currency,
            quote,
        })
    }

    pub async fn confirm_stripe_payment(
        &self,
        job_id: Uuid,
        payment_intent_id: &str,
        user: &User,
    ) -> Result<PaymentConfirmationDto, ServiceError> {
        self.ensure_enabled(PaymentProvider::Stripe)?;
        let job = self.completed_job_of_client(job_id, user).await?;

        let intent = self.provider.retrieve_stripe_intent(payment_intent_id).await?;
        if intent.job_id() != Some(job.id) {
            return Err(ServiceError::PaymentMismatch(
                "payment intent was created for a different job".to_string(),
            ));
        }

        self.settle_stripe_intent(&job, &intent).await
    }

    pub async fn initiate_khalti_payment(
        &self,
        job_id: Uuid,
        user: &User,
    ) -> Result<KhaltiCheckoutDto, ServiceError> {
        self.ensure_enabled(PaymentProvider::Khalti)?;
        let job = self.payable_job(job_id, user).await?;
        let quote = quote_job(&job)?;

        let initiation = self
            .provider
            .initiate_khalti(job.id, quote.total_minor, &job.title, &user.name, &user.email)
            .await?;

        let payment = self
            .db_client
            .create_pending_payment(self.new_payment(
                &job,
                PaymentProvider::Khalti,
                initiation.pidx.clone(),
                &quote,
                KHALTI_CURRENCY.to_string(),
                serde_json::json!({ "expires_at": initiation.expires_at }),
            ))
            .await?;

        tracing::info!("Khalti payment {} initiated for job {}", initiation.pidx, job.id);

        Ok(KhaltiCheckoutDto {
            payment_id: payment.id,
            pidx: initiation.pidx,
            payment_url: initiation.payment_url,
            expires_at: initiation.expires_at,
            quote,
        })
    }

    pub async fn verify_khalti_payment(
        &self,
        job_id: Uuid,
        pidx: &str,
        user: &User,
    ) -> Result<PaymentConfirmationDto, ServiceError> {
        self.ensure_enabled(PaymentProvider::Khalti)?;
        let job = self.completed_job_of_client(job_id, user).await?;

        // Lookup does not echo the purchase order, so the pidx must be one we issued for this job.
        let pending = self
            .db_client
            .get_payment_by_reference(PaymentProvider::Khalti, pidx)
            .await?;
        match pending {
            Some(payment) if payment.job_id == job.id => {}
            _ => {
                return Err(ServiceError::PaymentMismatch(
                    "this Khalti payment was not initiated for this job".to_string(),
                ))
            }
        }

        let lookup = self.provider.lookup_khalti(pidx).await?;
        let metadata = serde_json::json!({ "khalti_fee": lookup.fee });

        self.settle_outcome(&job, PaymentProvider::Khalti, pidx, lookup.outcome(), metadata)
            .await
    }

    /// Verifies the signature, then settles or fails the referenced checkout.
    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<(), ServiceError> {
        if self.stripe_webhook_secret.is_empty() {
            return Err(ServiceError::ProviderUnavailable("Stripe webhooks"));
        }

        verify_stripe_signature(
            payload,
            signature_header,
            &self.stripe_webhook_secret,
            Utc::now().timestamp(),
        )
        .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let event: StripeEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::Validation(format!("Invalid webhook payload: {}", e)))?;

        match event.event_type.as_str() {
            "payment_intent.succeeded" => {
                let intent: StripePaymentIntent = serde_json::from_value(event.data.object)
                    .map_err(|e| ServiceError::Validation(format!("Invalid payment intent: {}", e)))?;

                let Some(job_id) = intent.job_id() else {
                    tracing::warn!("Stripe event {} has no job metadata, ignoring", event.id);
                    return Ok(());
                };
                let job = self.get_job(job_id).await?;

                match self.settle_stripe_intent(&job, &intent).await {
                    Ok(confirmation) => tracing::info!(
                        "Stripe event {} settled payment {} (new: {})",
                        event.id,
                        confirmation.payment.id,
                        confirmation.newly_settled
                    ),
                    Err(ServiceError::JobNotPayable(_, reason)) => tracing::warn!(
                        "Stripe event {} for job {} not applied: {}",
                        event.id,
                        job.id,
                        reason
                    ),
                    Err(e) => return Err(e),
                }
            }
            "payment_intent.payment_failed" | "payment_intent.canceled" => {
                let intent_id = event.data.object["id"].as_str().unwrap_or_default();
                if let Some(payment) = self
                    .db_client
                    .get_payment_by_reference(PaymentProvider::Stripe, intent_id)
                    .await?
                {
                    let reason = event.data.object["last_payment_error"]["message"]
                        .as_str()
                        .unwrap_or(event.event_type.as_str());
                    self.db_client.mark_payment_failed(payment.id, reason).await?;
                    tracing::info!("Stripe event {} marked payment {} failed", event.id, payment.id);
                }
            }
            other => tracing::debug!("Unhandled Stripe event type: {}", other),
        }

        Ok(())
    }

    /// Settles or fails pending checkouts the client never came back to confirm.
    pub async fn reconcile_pending_payments(&self) -> Result<ReconciliationReport, ServiceError> {
        let stale = self
            .db_client
            .get_stale_pending_payments(RECONCILE_AFTER_MINUTES, RECONCILE_BATCH)
            .await?;

        let mut report = ReconciliationReport {
            checked: stale.len(),
            ..Default::default()
        };

        for payment in stale {
            if !self.provider.is_enabled(payment.provider) {
                report.still_pending += 1;
                continue;
            }

            let outcome = match self
                .provider
                .check_outcome(payment.provider, &payment.provider_reference)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Reconciliation lookup for payment {} failed: {}", payment.id, e);
                    report.errors += 1;
                    continue;
                }
            };

            match outcome {
                ProviderOutcome::Pending => report.still_pending += 1,
                ProviderOutcome::Failed(reason) => {
                    match self.db_client.mark_payment_failed(payment.id, &reason).await {
                        Ok(_) => report.failed += 1,
                        Err(e) => {
                            tracing::error!("Could not mark payment {} failed: {}", payment.id, e);
                            report.errors += 1;
                        }
                    }
                }
                succeeded @ ProviderOutcome::Succeeded { .. } => {
                    let result = match self.get_job(payment.job_id).await {
                        Ok(job) => {
                            self.settle_outcome(
                                &job,
                                payment.provider,
                                &payment.provider_reference,
                                succeeded,
                                serde_json::json!({ "reconciled": true }),
                            )
                            .await
                        }
                        Err(e) => Err(e),
                    };
                    match result {
                        Ok(_) => report.settled += 1,
                        Err(e) => {
                            tracing::error!("Reconciliation of payment {} failed: {}", payment.id, e);
                            report.errors += 1;
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    /// Stripe payments are refunded through the API; Khalti refunds happen in the
    /// merchant dashboard and are only recorded here.
    pub async fn refund_payment(&self, payment_id: Uuid, admin: &User) -> Result<Payment, ServiceError> {
        let payment = self
            .db_client
            .get_payment_by_id(payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound(payment_id))?;

        if payment.status != PaymentStatus::Completed {
            return Err(ServiceError::PaymentNotRefundable(payment.id));
        }

        if payment.provider == PaymentProvider::Stripe {
            self.ensure_enabled(PaymentProvider::Stripe)?;
            let refund = self
                .provider
                .refund_stripe_intent(&payment.provider_reference)
                .await?;
            tracing::info!("Stripe refund {} ({}) issued for payment {}", refund.id, refund.status, payment.id);
        }

        let refunded = self
            .db_client
            .refund_payment(payment.id)
            .await?
            .ok_or(ServiceError::PaymentNotRefundable(payment.id))?;

        tracing::info!("Payment {} refunded by admin {}", refunded.id, admin.id);
        self.notification_service.notify_payment_refunded(&refunded).await;

        Ok(refunded)
    }

    pub async fn payments_for_job(&self, job_id: Uuid, user: &User) -> Result<Vec<Payment>, ServiceError> {
        let job = self.get_job(job_id).await?;
        self.ensure_participant(&job, user).await?;

        Ok(self.db_client.get_payments_for_job(job.id).await?)
    }

    async fn settle_stripe_intent(
        &self,
        job: &Job,
        intent: &StripePaymentIntent,
    ) -> Result<PaymentConfirmationDto, ServiceError> {
        let metadata = serde_json::json!({
            "latest_charge": intent.latest_charge,
            "intent_status": intent.status,
        });
        self.settle_outcome(job, PaymentProvider::Stripe, &intent.id, intent.outcome(), metadata)
            .await
    }

    /// Common settlement path for every provider and entry point.
    async fn settle_outcome(
        &self,
        job: &Job,
        provider: PaymentProvider,
        provider_reference: &str,
        outcome: ProviderOutcome,
        metadata: serde_json::Value,
    ) -> Result<PaymentConfirmationDto, ServiceError> {
        let quote = quote_job(job)?;

        let (transaction_id, amount_minor) = match outcome {
            ProviderOutcome::Succeeded {
                transaction_id,
                amount_minor,
            } => (transaction_id, amount_minor),
            ProviderOutcome::Pending => {
                return Err(ServiceError::PaymentNotCompleted(
                    "the payment is still processing".to_string(),
                ))
            }
            ProviderOutcome::Failed(reason) => {
                if let Some(payment) = self
                    .db_client
                    .get_payment_by_reference(provider, provider_reference)
                    .await?
                {
                    self.db_client.mark_payment_failed(payment.id, &reason).await?;
                }
                return Err(ServiceError::PaymentNotCompleted(reason));
            }
        };

        if amount_minor != quote.total_minor {
            return Err(ServiceError::PaymentMismatch(format!(
                "paid amount {} does not match the expected {}",
                amount_minor, quote.total_minor
            )));
        }

        let currency = match provider {
            PaymentProvider::Stripe => self.provider.stripe_currency().to_string(),
            PaymentProvider::Khalti => KHALTI_CURRENCY.to_string(),
        };

        let new_payment = self.new_payment(
            job,
            provider,
            provider_reference.to_string(),
            &quote,
            currency,
            metadata,
        );

        match self.db_client.settle_payment(new_payment, &transaction_id).await? {
            SettlementOutcome::Settled(payment) => {
                tracing::info!(
                    "Payment {} settled for job {} via {}",
                    payment.id,
                    job.id,
                    provider.to_str()
                );

                match self.db_client.get_worker_by_id(job.worker_id).await {
                    Ok(Some(worker)) => {
                        self.notification_service
                            .notify_payment_settled(job, worker.user_id, &payment)
                            .await
                    }
                    Ok(None) => tracing::warn!("Worker {} missing for paid job {}", job.worker_id, job.id),
                    Err(e) => tracing::error!("Could not load worker for payment notice: {}", e),
                }

                Ok(PaymentConfirmationDto {
                    payment,
                    newly_settled: true,
                })
            }
            SettlementOutcome::AlreadySettled(payment) => {
                if payment.job_id != job.id {
                    return Err(ServiceError::PaymentMismatch(
                        "this transaction belongs to a different job".to_string(),
                    ));
                }
                Ok(PaymentConfirmationDto {
                    payment,
                    newly_settled: false,
                })
            }
            SettlementOutcome::JobNotPayable(status) => Err(ServiceError::JobNotPayable(
                job.id,
                format!("payment status is already {}", status.to_str()),
            )),
        }
    }

    fn new_payment(
        &self,
        job: &Job,
        provider: PaymentProvider,
        provider_reference: String,
        quote: &Quote,
        currency: String,
        metadata: serde_json::Value,
    ) -> NewPayment {
        NewPayment {
            job_id: job.id,
            client_id: job.client_id,
            worker_id: job.worker_id,
            provider,
            provider_reference,
            amount: quote.amount.clone(),
            service_fee: quote.service_fee.clone(),
            total_charged: quote.total.clone(),
            currency,
            metadata,
        }
    }

    fn ensure_enabled(&self, provider: PaymentProvider) -> Result<(), ServiceError> {
        if self.provider.is_enabled(provider) {
            Ok(())
        } else {
            Err(ServiceError::ProviderUnavailable(match provider {
                PaymentProvider::Stripe => "Stripe",
                PaymentProvider::Khalti => "Khalti",
            }))
        }
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        self.db_client
            .get_job_by_id(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))
    }

    /// Client ownership plus a completed job; payment state is left to settlement.
    async fn completed_job_of_client(&self, job_id: Uuid, user: &User) -> Result<Job, ServiceError> {
        let job = self.get_job(job_id).await?;

        if !job.is_client(user.id) {
            return Err(ServiceError::UnauthorizedJobAccess(user.id, job.id));
        }
        if job.status != JobStatus::Completed {
            return Err(ServiceError::JobNotPayable(
                job.id,
                "the job is not completed yet".to_string(),
            ));
        }

        Ok(job)
    }

    async fn payable_job(&self, job_id: Uuid, user: &User) -> Result<Job, ServiceError> {
        let job = self.completed_job_of_client(job_id, user).await?;

        if job.payment_status != JobPaymentStatus::Pending {
            return Err(ServiceError::JobNotPayable(
                job.id,
                format!("payment status is already {}", job.payment_status.to_str()),
            ));
        }

        Ok(job)
    }

    async fn ensure_participant(&self, job: &Job, user: &User) -> Result<(), ServiceError> {
        if job.is_client(user.id) || user.is_admin() {
            return Ok(());
        }
        match self.db_client.get_worker_by_user_id(user.id).await? {
            Some(worker) if worker.id == job.worker_id => Ok(()),
            _ => Err(ServiceError::UnauthorizedJobAccess(user.id, job.id)),
        }
    }
}

fn quote_job(job: &Job) -> Result<Quote, ServiceError> {
    pricing::quote(&job.total_amount)
        .ok_or_else(|| ServiceError::Validation("Job amount is out of range".to_string()))
}
