use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn to_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Accepted => "accepted",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// States reachable in one step from `self`.
    pub fn next_states(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[JobStatus::Accepted, JobStatus::Cancelled],
            JobStatus::Accepted => &[JobStatus::InProgress, JobStatus::Cancelled],
            JobStatus::InProgress => &[JobStatus::Completed],
            JobStatus::Completed | JobStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        self.next_states().contains(&to)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "job_payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobPaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl JobPaymentStatus {
    pub fn to_str(&self) -> &str {
        match self {
            JobPaymentStatus::Pending => "pending",
            JobPaymentStatus::Paid => "paid",
            JobPaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub client_name: String,
    pub client_phone: String,
    pub hourly_rate: BigDecimal,
    pub duration_hours: BigDecimal,
    pub total_amount: BigDecimal,
    pub status: JobStatus,
    pub payment_status: JobPaymentStatus,
    pub worker_id: Uuid,
    pub client_id: Uuid,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_client(&self, user_id: Uuid) -> bool {
        self.client_id == user_id
    }

    pub fn is_payable(&self) -> bool {
        self.status == JobStatus::Completed && self.payment_status == JobPaymentStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Accepted,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Cancelled,
    ];

    #[test]
    fn test_forward_path_is_allowed() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Accepted));
        assert!(JobStatus::Accepted.can_transition_to(JobStatus::InProgress));
        assert!(JobStatus::InProgress.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_cancel_only_before_work_starts() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Accepted.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::InProgress.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Cancelled));
    }

    #[test]
    fn test_skips_and_reversals_rejected() {
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::InProgress));
        assert!(!JobStatus::Accepted.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::InProgress.can_transition_to(JobStatus::Accepted));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::InProgress));
        assert!(!JobStatus::Cancelled.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn test_no_self_transitions() {
        for status in ALL {
            assert!(!status.can_transition_to(status), "{:?} -> itself", status);
        }
    }

    #[test]
    fn test_status_wire_format_matches_db_labels() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.to_str()));
        }
    }
}
