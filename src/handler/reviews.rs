use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{db::DBClient, reviewdb::ReviewExt, workerdb::WorkerExt},
    dtos::{reviewdtos::CreateReviewDto, ApiResponse, PaginatedResponse, RequestQueryDto},
    error::HttpError,
    middleware::AuthenticatedUser,
    service::error::ServiceError,
    AppState,
};

pub fn reviews_handler() -> Router {
    Router::new()
        .route("/", post(create_review))
        .route("/worker/:worker_id", get(get_worker_reviews))
        .route("/job/:job_id", get(get_job_review))
}

pub async fn create_review(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<CreateReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let review = app_state
        .review_service
        .create_review(&auth.user, body.job_id, body.rating, &body.comment)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Review submitted", review)),
    ))
}

pub async fn get_worker_reviews(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(worker_id): Path<Uuid>,
    Query(query): Query<RequestQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate()?;

    app_state
        .db_client
        .get_worker_by_id(worker_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::WorkerNotFound(worker_id))?;

    let (page, limit) = query.paging();
    let (sql_limit, offset) = DBClient::limit_offset(page, limit);

    let (reviews, total) = futures::try_join!(
        app_state.db_client.get_worker_reviews(worker_id, sql_limit, offset),
        app_state.db_client.count_worker_reviews(worker_id),
    )
    .map_err(ServiceError::from)?;

    Ok(Json(PaginatedResponse::new(reviews, total, page, limit)))
}

/// `data` is null when the job has not been reviewed yet.
pub async fn get_job_review(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let review = app_state
        .db_client
        .get_review_by_job(job_id)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ApiResponse::success("Review retrieved successfully", review)))
}
