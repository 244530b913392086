use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    db::{categorydb::CategoryExt, workerdb::WorkerSearch},
    dtos::{ApiResponse, RequestQueryDto},
    error::HttpError,
    handler::workers::paged_workers,
    service::error::ServiceError,
    AppState,
};

/// Public reads. Writes are under the admin router.
pub fn categories_handler() -> Router {
    Router::new()
        .route("/", get(get_categories))
        .route("/:slug", get(get_category))
        .route("/:slug/workers", get(get_category_workers))
}

pub async fn get_categories(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let categories = app_state
        .db_client
        .get_categories()
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ApiResponse::success("Categories retrieved successfully", categories)))
}

pub async fn get_category(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let category = app_state
        .db_client
        .get_category_by_slug(&slug)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::CategoryNotFound(slug))?;

    Ok(Json(ApiResponse::success("Category retrieved successfully", category)))
}

/// Available and unavailable workers alike, best rated first.
pub async fn get_category_workers(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<RequestQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate()?;

    let category = app_state
        .db_client
        .get_category_by_slug(&slug)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::CategoryNotFound(slug))?;

    let (page, limit) = query.paging();
    let search = WorkerSearch {
        category: Some(category.slug),
        ..Default::default()
    };

    let workers = paged_workers(&app_state.db_client, &search, page, limit).await?;

    Ok(Json(workers))
}
