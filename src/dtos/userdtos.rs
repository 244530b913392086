use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::usermodel::UserRole;

/// Basic phone number check, international formats allowed.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let phone_regex = regex::Regex::new(r"^\+?[0-9][0-9 \-]{6,18}[0-9]$")
        .map_err(|_| ValidationError::new("Invalid phone regex"))?;

    if !phone_regex.is_match(phone.trim()) {
        let mut error = ValidationError::new("invalid_phone");
        error.message = Some(Cow::from(
            "Phone number must be in a valid format (e.g., +9779812345678 or 555-123-4567)",
        ));
        return Err(error);
    }
    Ok(())
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    /// Defaults to client. Admin cannot be chosen here.
    pub role: Option<UserRole>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateUserProfileDto {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRoleDto {
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone() {
        for ok in ["+9779812345678", "555-123-4567", "01 234 5678", "+1 415 555 0100"] {
            assert!(validate_phone(ok).is_ok(), "{}", ok);
        }
        for bad in ["", "12345", "phone", "+977-98-abc-1234", "1234567890123456789012"] {
            assert!(validate_phone(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_register_validation() {
        let dto = RegisterUserDto {
            name: "".into(),
            role: None,
        };
        assert!(dto.validate().is_err());

        let dto = RegisterUserDto {
            name: "Asha".into(),
            role: Some(UserRole::Worker),
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_profile_update_rejects_bad_avatar() {
        let dto = UpdateUserProfileDto {
            name: None,
            avatar_url: Some("not a url".into()),
        };
        assert!(dto.validate().is_err());
    }
}
