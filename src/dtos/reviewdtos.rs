use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReviewDto {
    pub job_id: Uuid,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,

    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    #[serde(default)]
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        for (rating, ok) in [(0, false), (1, true), (5, true), (6, false), (-1, false)] {
            let dto = CreateReviewDto {
                job_id: Uuid::nil(),
                rating,
                comment: String::new(),
            };
            assert_eq!(dto.validate().is_ok(), ok, "rating {}", rating);
        }
    }

    #[test]
    fn test_comment_is_optional() {
        let dto: CreateReviewDto = serde_json::from_value(serde_json::json!({
            "job_id": Uuid::nil(),
            "rating": 4
        }))
        .unwrap();
        assert_eq!(dto.comment, "");
    }
}
