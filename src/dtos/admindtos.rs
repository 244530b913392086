use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use validator::Validate;

use crate::models::usermodel::{RoleChange, User, UserRole};

#[derive(Debug, Serialize)]
pub struct AdminStatsDto {
    pub users_by_role: BTreeMap<String, i64>,
    pub total_users: i64,
    pub jobs_by_status: BTreeMap<String, i64>,
    pub total_jobs: i64,
    pub completed_payments: i64,
    pub total_revenue: BigDecimal,
    pub total_service_fees: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct AdminUserDetailDto {
    pub user: User,
    /// Newest first.
    pub role_changes: Vec<RoleChange>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct UserQueryDto {
    pub role: Option<UserRole>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}
