// service/notification_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{db::DBClient, notificationdb::NotificationExt},
    models::{
        jobmodel::{Job, JobStatus},
        notificationmodel::NotificationType,
        paymentmodel::Payment,
    },
};

#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<DBClient>,
}

impl NotificationService {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        Self { db_client }
    }

    /// Stores one notification row. Failures are logged and swallowed so the
    /// triggering request still succeeds.
    pub async fn notify(
        &self,
        recipient_id: Uuid,
        message: String,
        notification_type: NotificationType,
        job_id: Option<Uuid>,
    ) {
        match self
            .db_client
            .create_notification(recipient_id, &message, notification_type, job_id)
            .await
        {
            Ok(notification) => tracing::debug!(
                "Notification {} stored for user {}",
                notification.id,
                recipient_id
            ),
            Err(e) => tracing::error!(
                "Failed to store notification for user {}: {}",
                recipient_id,
                e
            ),
        }
    }

    pub async fn notify_job_request(&self, worker_user_id: Uuid, job: &Job) {
        self.notify(
            worker_user_id,
            job_request_message(job),
            NotificationType::JobRequest,
            Some(job.id),
        )
        .await
    }

    pub async fn notify_job_status(&self, job: &Job, worker_name: &str) {
        self.notify(
            job.client_id,
            job_status_message(job, worker_name),
            NotificationType::JobStatus,
            Some(job.id),
        )
        .await
    }

    pub async fn notify_job_cancelled_by_client(&self, worker_user_id: Uuid, job: &Job) {
        self.notify(
            worker_user_id,
            format!(
                "{} cancelled the job \"{}\" scheduled for {}",
                job.client_name, job.title, job.scheduled_date
            ),
            NotificationType::JobCancelled,
            Some(job.id),
        )
        .await
    }

    pub async fn notify_payment_settled(&self, job: &Job, worker_user_id: Uuid, payment: &Payment) {
        self.notify(
            job.client_id,
            format!(
                "Payment of {} {} for \"{}\" was received. Thank you!",
                payment.total_charged,
                payment.currency.to_uppercase(),
                job.title
            ),
            NotificationType::Payment,
            Some(job.id),
        )
        .await;

        self.notify(
            worker_user_id,
            format!(
                "{} paid {} {} for \"{}\"",
                job.client_name,
                payment.amount,
                payment.currency.to_uppercase(),
                job.title
            ),
            NotificationType::Payment,
            Some(job.id),
        )
        .await;
    }

    pub async fn notify_payment_refunded(&self, payment: &Payment) {
        self.notify(
            payment.client_id,
            format!(
                "Your payment of {} {} has been refunded",
                payment.total_charged,
                payment.currency.to_uppercase()
            ),
            NotificationType::Payment,
            Some(payment.job_id),
        )
        .await
    }

    pub async fn notify_review(&self, worker_user_id: Uuid, job: &Job, rating: i16) {
        self.notify(
            worker_user_id,
            format!(
                "{} left a {}-star review for \"{}\"",
                job.client_name, rating, job.title
            ),
            NotificationType::Review,
            Some(job.id),
        )
        .await
    }
}

fn job_request_message(job: &Job) -> String {
    format!(
        "New job request from {}: \"{}\" on {} at {} in {}",
        job.client_name, job.title, job.scheduled_date, job.scheduled_time, job.location
    )
}

fn job_status_message(job: &Job, worker_name: &str) -> String {
    match job.status {
        JobStatus::Accepted => format!("{} accepted your job \"{}\"", worker_name, job.title),
        JobStatus::InProgress => format!("{} started working on \"{}\"", worker_name, job.title),
        JobStatus::Completed => format!(
            "{} marked \"{}\" as completed. You can now pay and leave a review",
            worker_name, job.title
        ),
        JobStatus::Cancelled => format!("{} declined your job \"{}\"", worker_name, job.title),
        JobStatus::Pending => format!("Your job \"{}\" with {} is pending", job.title, worker_name),
    }
}
