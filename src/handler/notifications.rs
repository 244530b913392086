use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{delete, get, patch},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{db::DBClient, notificationdb::NotificationExt},
    dtos::{notificationdtos::*, ApiResponse, RequestQueryDto},
    error::HttpError,
    middleware::AuthenticatedUser,
    service::error::ServiceError,
    AppState,
};

pub fn notifications_handler() -> Router {
    Router::new()
        .route("/", get(get_notifications))
        .route("/unread-count", get(get_unread_count))
        .route("/read-all", patch(mark_all_read))
        .route("/:id/read", patch(mark_read))
        .route("/:id", delete(delete_notification))
}

pub async fn get_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Query(query): Query<RequestQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate()?;

    let (page, limit) = query.paging();
    let (sql_limit, offset) = DBClient::limit_offset(page, limit);
    let user_id = auth.user.id;

    let (notifications, total, unread_count) = futures::try_join!(
        app_state.db_client.get_notifications(user_id, sql_limit, offset),
        app_state.db_client.count_notifications(user_id),
        app_state.db_client.count_unread(user_id),
    )
    .map_err(ServiceError::from)?;

    Ok(Json(ApiResponse::success(
        "Notifications retrieved successfully",
        NotificationListDto {
            notifications,
            total,
            page,
            limit,
            unread_count,
        },
    )))
}

pub async fn get_unread_count(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, HttpError> {
    let unread_count = app_state
        .db_client
        .count_unread(auth.user.id)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ApiResponse::success(
        "Unread count retrieved",
        UnreadCountDto { unread_count },
    )))
}

pub async fn mark_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let notification = app_state
        .db_client
        .mark_notification_read(notification_id, auth.user.id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotificationNotFound(notification_id))?;

    Ok(Json(ApiResponse::success("Notification marked as read", notification)))
}

pub async fn mark_all_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, HttpError> {
    let updated = app_state
        .db_client
        .mark_all_notifications_read(auth.user.id)
        .await
        .map_err(ServiceError::from)?;

    let unread_count = app_state
        .db_client
        .count_unread(auth.user.id)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ApiResponse::success(
        "All notifications marked as read",
        MarkAllReadDto {
            updated,
            unread_count,
        },
    )))
}

pub async fn delete_notification(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let deleted = app_state
        .db_client
        .delete_notification(notification_id, auth.user.id)
        .await
        .map_err(ServiceError::from)?;

    if deleted == 0 {
        return Err(ServiceError::NotificationNotFound(notification_id).into());
    }

    Ok(Json(ApiResponse::success("Notification deleted", notification_id)))
}
