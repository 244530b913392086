use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{
        db::DBClient,
        jobdb::{JobExt, JobParty},
        workerdb::WorkerExt,
    },
    dtos::{jobdtos::*, paging, ApiResponse, PaginatedResponse},
    error::HttpError,
    middleware::{role_check, AuthenticatedUser},
    models::{jobmodel::Job, usermodel::UserRole},
    service::error::ServiceError,
    AppState,
};

pub fn jobs_handler() -> Router {
    Router::new()
        .route(
            "/",
            post(create_job).layer(middleware::from_fn(|req: Request, next: Next| {
                role_check(req, next, vec![UserRole::Client, UserRole::Admin])
            })),
        )
        .route("/client", get(get_client_jobs))
        .route(
            "/worker",
            get(get_worker_jobs).layer(middleware::from_fn(|req: Request, next: Next| {
                role_check(req, next, vec![UserRole::Worker])
            })),
        )
        .route("/:job_id", get(get_job))
        .route("/:job_id/status", patch(update_job_status))
        .route("/:job_id/cancel", patch(cancel_job))
}

pub async fn create_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<CreateJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let job = app_state.job_service.create_job(&auth.user, body).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Job request sent to worker", job)),
    ))
}

pub async fn get_client_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Query(query): Query<JobQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate()?;

    let jobs = paged_jobs(&app_state.db_client, JobParty::Client(auth.user.id), &query).await?;

    Ok(Json(jobs))
}

pub async fn get_worker_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Query(query): Query<JobQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate()?;

    let worker = app_state
        .db_client
        .get_worker_by_user_id(auth.user.id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::WorkerProfileNotFound(auth.user.id))?;

    let jobs = paged_jobs(&app_state.db_client, JobParty::Worker(worker.id), &query).await?;

    Ok(Json(jobs))
}

pub async fn get_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.get_job_for(job_id, &auth.user).await?;

    Ok(Json(ApiResponse::success("Job retrieved successfully", job)))
}

/// Worker-side lifecycle: accept, decline, start, complete, cancel.
pub async fn update_job_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<UpdateJobStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state
        .job_service
        .update_status(job_id, &auth.user, body.status)
        .await?;

    Ok(Json(ApiResponse::success("Job status updated", job)))
}

pub async fn cancel_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.cancel_by_client(job_id, &auth.user).await?;

    Ok(Json(ApiResponse::success("Job cancelled", job)))
}

pub(crate) async fn paged_jobs(
    db_client: &DBClient,
    party: JobParty,
    query: &JobQueryDto,
) -> Result<PaginatedResponse<Job>, ServiceError> {
    let (page, limit) = paging(query.page, query.limit);
    let (sql_limit, offset) = DBClient::limit_offset(page, limit);

    let (jobs, total) = futures::try_join!(
        db_client.get_jobs(party, query.status, sql_limit, offset),
        db_client.count_jobs(party, query.status),
    )?;

    Ok(PaginatedResponse::new(jobs, total, page, limit))
}
