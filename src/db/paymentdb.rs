// db/paymentdb.rs
use async_trait::async_trait;
use sqlx::{types::BigDecimal, Error};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::{
    jobmodel::JobPaymentStatus,
    paymentmodel::{Payment, PaymentProvider, PaymentStatus},
};

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub worker_id: Uuid,
    pub provider: PaymentProvider,
    pub provider_reference: String,
    pub amount: BigDecimal,
    pub service_fee: BigDecimal,
    pub total_charged: BigDecimal,
    pub currency: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug)]
pub enum SettlementOutcome {
    /// First confirmation: the payment is now completed and the job paid.
    Settled(Payment),
    /// This provider transaction was settled before; nothing changed.
    AlreadySettled(Payment),
    /// The job is not awaiting payment (paid through another transaction, or refunded).
    JobNotPayable(JobPaymentStatus),
}

#[async_trait]
pub trait PaymentExt {
    /// Records a checkout before the client pays. Re-initiating with the same provider
    /// reference returns the existing row.
    async fn create_pending_payment(&self, payment: NewPayment) -> Result<Payment, Error>;

    async fn get_payment_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, Error>;

    async fn get_payment_by_reference(
        &self,
        provider: PaymentProvider,
        provider_reference: &str,
    ) -> Result<Option<Payment>, Error>;

    async fn get_payments_for_job(&self, job_id: Uuid) -> Result<Vec<Payment>, Error>;

    /// Payments where the user is the paying client or the paid worker.
    async fn get_payments_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, Error>;

    async fn count_payments_for_user(&self, user_id: Uuid) -> Result<i64, Error>;

    async fn get_payments(
        &self,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, Error>;

    async fn count_payments(&self, status: Option<PaymentStatus>) -> Result<i64, Error>;

    /// Marks the payment completed and the job paid in one transaction, keyed by the
    /// provider transaction id.
    async fn settle_payment(
        &self,
        payment: NewPayment,
        transaction_id: &str,
    ) -> Result<SettlementOutcome, Error>;

    async fn mark_payment_failed(&self, payment_id: Uuid, reason: &str) -> Result<u64, Error>;

    async fn get_stale_pending_payments(
        &self,
        older_than_minutes: i32,
        limit: i64,
    ) -> Result<Vec<Payment>, Error>;

    /// Completed → refunded, and the job follows. `None` if the payment was not completed.
    async fn refund_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, Error>;

    /// (sum of job amounts, sum of service fees, number of payments) over completed payments.
    async fn revenue_totals(&self) -> Result<(BigDecimal, BigDecimal, i64), Error>;
}

#[async_trait]
impl PaymentExt for DBClient {
    async fn create_pending_payment(&self, payment: NewPayment) -> Result<Payment, Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments
            (job_id, client_id, worker_id, provider, provider_reference,
             amount, service_fee, total_charged, currency, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (provider, provider_reference) DO UPDATE
            SET updated_at = NOW()
            RETURNING
                id, job_id, client_id, worker_id, provider, provider_reference, transaction_id,
                amount, service_fee, total_charged, currency, status, metadata,
                created_at, updated_at, completed_at
            "#,
        )
        .bind(payment.job_id)
        .bind(payment.client_id)
        .bind(payment.worker_id)
        .bind(payment.provider)
        .bind(payment.provider_reference)
        .bind(payment.amount)
        .bind(payment.service_fee)
        .bind(payment.total_charged)
        .bind(payment.currency)
        .bind(payment.metadata)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_payment_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id, job_id, client_id, worker_id, provider, provider_reference, transaction_id,
                amount, service_fee, total_charged, currency, status, metadata,
                created_at, updated_at, completed_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_payment_by_reference(
        &self,
        provider: PaymentProvider,
        provider_reference: &str,
    ) -> Result<Option<Payment>, Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id, job_id, client_id, worker_id, provider, provider_reference, transaction_id,
                amount, service_fee, total_charged, currency, status, metadata,
                created_at, updated_at, completed_at
            FROM payments
            WHERE provider = $1 AND provider_reference = $2
            "#,
        )
        .bind(provider)
        .bind(provider_reference)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_payments_for_job(&self, job_id: Uuid) -> Result<Vec<Payment>, Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id, job_id, client_id, worker_id, provider, provider_reference, transaction_id,
                amount, service_fee, total_charged, currency, status, metadata,
                created_at, updated_at, completed_at
            FROM payments
            WHERE job_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_payments_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                p.id, p.job_id, p.client_id, p.worker_id, p.provider, p.provider_reference,
                p.transaction_id, p.amount, p.service_fee, p.total_charged, p.currency,
                p.status, p.metadata, p.created_at, p.updated_at, p.completed_at
            FROM payments p
            LEFT JOIN workers w ON w.id = p.worker_id
            WHERE p.client_id = $1 OR w.user_id = $1
            ORDER BY p.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_payments_for_user(&self, user_id: Uuid) -> Result<i64, Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM payments p
            LEFT JOIN workers w ON w.id = p.worker_id
            WHERE p.client_id = $1 OR w.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_payments(
        &self,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id, job_id, client_id, worker_id, provider, provider_reference, transaction_id,
                amount, service_fee, total_charged, currency, status, metadata,
                created_at, updated_at, completed_at
            FROM payments
            WHERE ($1::payment_record_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_payments(&self, status: Option<PaymentStatus>) -> Result<i64, Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM payments
            WHERE ($1::payment_record_status IS NULL OR status = $1)
            "#,
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
    }

    async fn settle_payment(
        &self,
        payment: NewPayment,
        transaction_id: &str,
    ) -> Result<SettlementOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent confirmations for the same job.
        let job_payment_status: Option<JobPaymentStatus> =
            sqlx::query_scalar("SELECT payment_status FROM jobs WHERE id = $1 FOR UPDATE")
                .bind(payment.job_id)
                .fetch_optional(&mut *tx)
                .await?;

        let job_payment_status = job_payment_status.ok_or(Error::RowNotFound)?;

        let existing = sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id, job_id, client_id, worker_id, provider, provider_reference, transaction_id,
                amount, service_fee, total_charged, currency, status, metadata,
                created_at, updated_at, completed_at
            FROM payments
            WHERE provider = $1
              AND (transaction_id = $2 OR provider_reference = $3)
              AND status IN ('completed', 'refunded')
            LIMIT 1
            "#,
        )
        .bind(payment.provider)
        .bind(transaction_id)
        .bind(&payment.provider_reference)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = existing {
            return Ok(SettlementOutcome::AlreadySettled(existing));
        }

        if job_payment_status != JobPaymentStatus::Pending {
            return Ok(SettlementOutcome::JobNotPayable(job_payment_status));
        }

        let settled = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments
            (job_id, client_id, worker_id, provider, provider_reference, transaction_id,
             amount, service_fee, total_charged, currency, status, metadata, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'completed', $11, NOW())
            ON CONFLICT (provider, provider_reference) DO UPDATE
            SET transaction_id = EXCLUDED.transaction_id,
                status = 'completed',
                metadata = payments.metadata || EXCLUDED.metadata,
                completed_at = NOW(),
                updated_at = NOW()
            RETURNING
                id, job_id, client_id, worker_id, provider, provider_reference, transaction_id,
                amount, service_fee, total_charged, currency, status, metadata,
                created_at, updated_at, completed_at
            "#,
        )
        .bind(payment.job_id)
        .bind(payment.client_id)
        .bind(payment.worker_id)
        .bind(payment.provider)
        .bind(&payment.provider_reference)
        .bind(transaction_id)
        .bind(payment.amount)
        .bind(payment.service_fee)
        .bind(payment.total_charged)
        .bind(payment.currency)
        .bind(payment.metadata)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE jobs
            SET payment_status = 'paid', updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(payment.job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SettlementOutcome::Settled(settled))
    }

    async fn mark_payment_failed(&self, payment_id: Uuid, reason: &str) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed',
                metadata = metadata || jsonb_build_object('failure_reason', $2::text),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(payment_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_stale_pending_payments(
        &self,
        older_than_minutes: i32,
        limit: i64,
    ) -> Result<Vec<Payment>, Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id, job_id, client_id, worker_id, provider, provider_reference, transaction_id,
                amount, service_fee, total_charged, currency, status, metadata,
                created_at, updated_at, completed_at
            FROM payments
            WHERE status = 'pending'
              AND created_at < NOW() - make_interval(mins => $1)
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(older_than_minutes)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn refund_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, Error> {
        let mut tx = self.pool.begin().await?;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = 'refunded', updated_at = NOW()
            WHERE id = $1 AND status = 'completed'
            RETURNING
                id, job_id, client_id, worker_id, provider, provider_reference, transaction_id,
                amount, service_fee, total_charged, currency, status, metadata,
                created_at, updated_at, completed_at
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(payment) = &payment {
            sqlx::query(
                r#"
                UPDATE jobs
                SET payment_status = 'refunded', updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(payment.job_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(payment)
    }

    async fn revenue_totals(&self) -> Result<(BigDecimal, BigDecimal, i64), Error> {
        sqlx::query_as::<_, (BigDecimal, BigDecimal, i64)>(
            r#"
            SELECT
                COALESCE(SUM(amount), 0)::NUMERIC,
                COALESCE(SUM(service_fee), 0)::NUMERIC,
                COUNT(*)
            FROM payments
            WHERE status = 'completed'
            "#,
        )
        .fetch_one(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::PgPool;

    use super::*;
    use crate::{
        db::{fixtures, jobdb::JobExt},
        models::{jobmodel::Job, usermodel::UserRole},
    };

    fn stripe_payment(job: &Job, reference: &str) -> NewPayment {
        NewPayment {
            job_id: job.id,
            client_id: job.client_id,
            worker_id: job.worker_id,
            provider: PaymentProvider::Stripe,
            provider_reference: reference.to_string(),
            amount: fixtures::money("50.00"),
            service_fee: fixtures::money("5.00"),
            total_charged: fixtures::money("55.00"),
            currency: "usd".to_string(),
            metadata: json!({ "job_id": job.id }),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_repeat_settlement_changes_nothing(pool: PgPool) {
        let db = DBClient::new(pool);
        let client = fixtures::user(&db, "uid-sita", "Sita", UserRole::Client).await;
        let (_, worker) = fixtures::worker(&db, "Ram").await;
        let job = fixtures::job(&db, &client, &worker).await;

        let pending = db.create_pending_payment(stripe_payment(&job, "pi_1")).await.unwrap();
        assert_eq!(pending.status, PaymentStatus::Pending);

        let first = db.settle_payment(stripe_payment(&job, "pi_1"), "pi_1").await.unwrap();
        let settled = match first {
            SettlementOutcome::Settled(payment) => payment,
            other => panic!("expected a first settlement, got {:?}", other),
        };
        assert_eq!(settled.id, pending.id);
        assert_eq!(settled.status, PaymentStatus::Completed);
        assert_eq!(settled.transaction_id.as_deref(), Some("pi_1"));

        let second = db.settle_payment(stripe_payment(&job, "pi_1"), "pi_1").await.unwrap();
        match second {
            SettlementOutcome::AlreadySettled(payment) => {
                assert_eq!(payment.id, settled.id);
                assert_eq!(payment.completed_at, settled.completed_at);
            }
            other => panic!("expected an already-settled outcome, got {:?}", other),
        }

        let payments = db.get_payments_for_job(job.id).await.unwrap();
        assert_eq!(payments.len(), 1);

        let job = db.get_job_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(job.payment_status, JobPaymentStatus::Paid);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a PostgreSQL DATABASE_URL"]
    async fn test_paid_job_rejects_another_transaction(pool: PgPool) {
        let db = DBClient::new(pool);
        let client = fixtures::user(&db, "uid-sita", "Sita", UserRole::Client).await;
        let (_, worker) = fixtures::worker(&db, "Ram").await;
        let job = fixtures::job(&db, &client, &worker).await;

        db.settle_payment(stripe_payment(&job, "pi_1"), "pi_1").await.unwrap();
        let outcome = db.settle_payment(stripe_payment(&job, "pi_2"), "pi_2").await.unwrap();

        assert!(matches!(
            outcome,
            SettlementOutcome::JobNotPayable(JobPaymentStatus::Paid)
        ));
        assert_eq!(db.get_payments_for_job(job.id).await.unwrap().len(), 1);
    }
}
