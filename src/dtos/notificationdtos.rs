use serde::Serialize;

use crate::models::notificationmodel::Notification;

#[derive(Debug, Serialize)]
pub struct NotificationListDto {
    pub notifications: Vec<Notification>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountDto {
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadDto {
    pub updated: u64,
    pub unread_count: i64,
}
