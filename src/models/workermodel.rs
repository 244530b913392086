use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct WorkerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub categories: Vec<String>,
    pub hourly_rate: BigDecimal,
    pub is_available: bool,
    pub bio: String,
    pub location: String,
    pub phone: Option<String>,
    pub profile_image_url: Option<String>,
    pub rating: f64,
    pub completed_jobs: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Lowercase the name and collapse every run of non-alphanumerics into a single `-`.
    pub fn slugify(name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;

        for ch in name.trim().chars() {
            if ch.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(ch.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(Category::slugify("Electrician"), "electrician");
        assert_eq!(Category::slugify("  HVAC & Air Conditioning "), "hvac-air-conditioning");
        assert_eq!(Category::slugify("Pest--Control!!"), "pest-control");
        assert_eq!(Category::slugify("***"), "");
    }
}
