use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Client,
    Worker,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Client => "client",
            UserRole::Worker => "worker",
            UserRole::Admin => "admin",
        }
    }

    /// Roles a user may pick for themselves at sign-up or via "switch role".
    pub fn is_self_assignable(&self) -> bool {
        matches!(self, UserRole::Client | UserRole::Worker)
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub firebase_uid: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct RoleChange {
    pub id: Uuid,
    pub user_id: Uuid,
    pub from_role: UserRole,
    pub to_role: UserRole,
    pub changed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_is_never_self_assignable() {
        assert!(UserRole::Client.is_self_assignable());
        assert!(UserRole::Worker.is_self_assignable());
        assert!(!UserRole::Admin.is_self_assignable());
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&UserRole::Worker).unwrap(), "\"worker\"");
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, UserRole::Admin);
        assert_eq!(role.to_str(), "admin");
    }
}
