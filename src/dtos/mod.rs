pub mod userdtos;
pub mod workerdtos;
pub mod jobdtos;
pub mod paymentdtos;
pub mod reviewdtos;
pub mod notificationdtos;
pub mod admindtos;

use serde::{Deserialize, Serialize};
use validator::Validate;

//Response wrappers
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub status: String,
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            ((total.max(0) as u64 + limit as u64 - 1) / limit as u64) as u32
        };
        Self {
            status: "success".to_string(),
            data,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct RequestQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

/// Normalised (page, limit) from optional query values.
pub fn paging(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    (page.unwrap_or(1).max(1), limit.unwrap_or(20).clamp(1, 100))
}

impl RequestQueryDto {
    pub fn paging(&self) -> (u32, u32) {
        paging(self.page, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        let response = PaginatedResponse::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.status, "success");

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_query_defaults() {
        let query = RequestQueryDto::default();
        assert_eq!(query.paging(), (1, 20));

        let query = RequestQueryDto {
            page: Some(4),
            limit: Some(500),
        };
        assert_eq!(query.paging(), (4, 100));
        assert!(query.validate().is_err());
    }
}
