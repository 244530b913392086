use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dtos::userdtos::validate_phone;

//Worker Profile DTOs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateWorkerProfileDto {
    #[validate(length(min = 1, max = 10, message = "Pick between 1 and 10 categories"))]
    pub categories: Vec<String>,

    #[validate(range(min = 1.0, max = 100000.0, message = "Hourly rate must be between 1 and 100000"))]
    pub hourly_rate: f64,

    pub is_available: Option<bool>,

    #[validate(length(max = 1000, message = "Bio must be at most 1000 characters"))]
    #[serde(default)]
    pub bio: String,

    #[validate(length(min = 1, max = 200, message = "Location is required"))]
    pub location: String,

    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateWorkerProfileDto {
    #[validate(length(min = 1, max = 10, message = "Pick between 1 and 10 categories"))]
    pub categories: Option<Vec<String>>,

    #[validate(range(min = 1.0, max = 100000.0, message = "Hourly rate must be between 1 and 100000"))]
    pub hourly_rate: Option<f64>,

    pub is_available: Option<bool>,

    #[validate(length(max = 1000, message = "Bio must be at most 1000 characters"))]
    pub bio: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Location cannot be empty"))]
    pub location: Option<String>,

    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UploadImageDto {
    /// Base64 image data, optionally as a `data:image/...;base64,` URI.
    #[validate(length(min = 1, message = "Image data is required"))]
    pub image: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct WorkerSearchQueryDto {
    pub category: Option<String>,
    pub available: Option<bool>,
    pub location: Option<String>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

//Category DTOs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCategoryDto {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    #[serde(default)]
    pub description: String,

    #[validate(url(message = "Image must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateCategoryDto {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(url(message = "Image must be a valid URL"))]
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> CreateWorkerProfileDto {
        CreateWorkerProfileDto {
            categories: vec!["plumbing".into()],
            hourly_rate: 25.0,
            is_available: None,
            bio: "Ten years fixing pipes".into(),
            location: "Lalitpur".into(),
            phone: Some("+9779812345678".into()),
        }
    }

    #[test]
    fn test_valid_profile() {
        assert!(profile().validate().is_ok());
    }

    #[test]
    fn test_profile_needs_a_category_and_positive_rate() {
        let mut dto = profile();
        dto.categories.clear();
        assert!(dto.validate().is_err());

        let mut dto = profile();
        dto.hourly_rate = 0.0;
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_profile_phone_is_checked() {
        let mut dto = profile();
        dto.phone = Some("call me".into());
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_empty_update_is_valid() {
        assert!(UpdateWorkerProfileDto::default().validate().is_ok());
    }
}
