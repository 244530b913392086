use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{dtos::userdtos::validate_phone, models::jobmodel::JobStatus};

//Job Dto
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateJobDto {
    pub worker_id: Uuid,

    #[validate(length(min = 1, max = 150, message = "Title must be between 1 and 150 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "Description must be between 1 and 2000 characters"))]
    pub description: String,

    #[validate(length(min = 1, max = 200, message = "Location is required"))]
    pub location: String,

    pub scheduled_date: NaiveDate,

    #[validate(length(min = 1, max = 20, message = "Scheduled time is required"))]
    pub scheduled_time: String,

    /// Defaults to the account name.
    #[validate(length(min = 1, max = 100, message = "Client name must be between 1 and 100 characters"))]
    pub client_name: Option<String>,

    #[validate(custom = "validate_phone")]
    pub client_phone: String,

    #[validate(range(min = 0.5, max = 240.0, message = "Duration must be between 0.5 and 240 hours"))]
    pub duration_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateJobStatusDto {
    pub status: JobStatus,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct JobQueryDto {
    pub status: Option<JobStatus>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_job_payload() {
        let dto: CreateJobDto = serde_json::from_value(serde_json::json!({
            "worker_id": Uuid::nil(),
            "title": "Install ceiling fan",
            "description": "Living room, fan already bought",
            "location": "Pokhara",
            "scheduled_date": "2025-05-02",
            "scheduled_time": "14:30",
            "client_phone": "+9779812345678",
            "duration_hours": 2.5
        }))
        .unwrap();

        assert!(dto.validate().is_ok());
        assert_eq!(dto.scheduled_date, NaiveDate::from_ymd_opt(2025, 5, 2).unwrap());
        assert!(dto.client_name.is_none());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let dto = CreateJobDto {
            worker_id: Uuid::nil(),
            title: "x".into(),
            description: "y".into(),
            location: "z".into(),
            scheduled_date: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            scheduled_time: "09:00".into(),
            client_name: None,
            client_phone: "+9779812345678".into(),
            duration_hours: 0.0,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_status_payload_uses_snake_case() {
        let dto: UpdateJobStatusDto =
            serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
        assert_eq!(dto.status, JobStatus::InProgress);
        assert!(serde_json::from_str::<UpdateJobStatusDto>(r#"{"status":"done"}"#).is_err());
    }
}
