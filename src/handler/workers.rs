use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Path, Query, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{
        categorydb::CategoryExt,
        db::DBClient,
        is_unique_violation,
        workerdb::{WorkerExt, WorkerProfileChanges, WorkerSearch},
    },
    dtos::{paging, workerdtos::*, ApiResponse, PaginatedResponse},
    error::HttpError,
    middleware::{role_check, AuthenticatedUser},
    models::{usermodel::UserRole, workermodel::WorkerProfile},
    service::{
        cloudinary::{decode_image, MAX_IMAGE_BYTES},
        error::ServiceError,
    },
    utils::{pricing::decimal_from_f64, text::sanitize_plain},
    AppState,
};

const WORKER_IMAGE_FOLDER: &str = "servicehub/workers";

/// Base64 of the largest accepted image, plus room for a data URI prefix and the JSON wrapper.
const IMAGE_BODY_LIMIT: usize = (MAX_IMAGE_BYTES + 2) / 3 * 4 + 64 * 1024;

pub fn workers_handler() -> Router {
    Router::new()
        .route("/", get(search_workers))
        .route(
            "/profile",
            post(create_profile)
                .put(update_profile)
                .get(get_own_profile)
                .layer(middleware::from_fn(|req: Request, next: Next| {
                    role_check(req, next, vec![UserRole::Worker])
                })),
        )
        .route(
            "/profile/image",
            post(upload_profile_image)
                .layer(DefaultBodyLimit::max(IMAGE_BODY_LIMIT))
                .layer(middleware::from_fn(|req: Request, next: Next| {
                    role_check(req, next, vec![UserRole::Worker])
                })),
        )
        .route("/:worker_id", get(get_worker))
}

/// Lowercased, de-duplicated slugs, all of which must name an existing category.
pub(crate) async fn normalize_categories(
    db_client: &DBClient,
    categories: Vec<String>,
) -> Result<Vec<String>, ServiceError> {
    let mut seen = HashSet::new();
    let slugs: Vec<String> = categories
        .into_iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect();

    if slugs.is_empty() {
        return Err(ServiceError::Validation("At least one category is required".to_string()));
    }

    let found = db_client.count_existing_slugs(&slugs).await?;
    if found as usize == slugs.len() {
        return Ok(slugs);
    }

    let known: HashSet<String> = db_client
        .get_categories()
        .await?
        .into_iter()
        .map(|c| c.slug)
        .collect();

    Err(ServiceError::UnknownCategories(
        slugs.into_iter().filter(|s| !known.contains(s)).collect(),
    ))
}

fn hourly_rate(value: f64) -> Result<sqlx::types::BigDecimal, ServiceError> {
    decimal_from_f64(value)
        .ok_or_else(|| ServiceError::Validation("Hourly rate must be a finite number".to_string()))
}

async fn own_profile(app_state: &AppState, auth: &AuthenticatedUser) -> Result<WorkerProfile, ServiceError> {
    app_state
        .db_client
        .get_worker_by_user_id(auth.user.id)
        .await?
        .ok_or(ServiceError::WorkerProfileNotFound(auth.user.id))
}

pub async fn create_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<CreateWorkerProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    if app_state
        .db_client
        .get_worker_by_user_id(auth.user.id)
        .await
        .map_err(ServiceError::from)?
        .is_some()
    {
        return Err(ServiceError::WorkerProfileExists.into());
    }

    let categories = normalize_categories(&app_state.db_client, body.categories).await?;
    let rate = hourly_rate(body.hourly_rate)?;

    let profile = app_state
        .db_client
        .create_worker_profile(
            auth.user.id,
            &auth.user.name,
            categories,
            rate,
            body.is_available.unwrap_or(true),
            sanitize_plain(&body.bio),
            sanitize_plain(&body.location),
            body.phone.map(|p| p.trim().to_string()),
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::WorkerProfileExists
            } else {
                ServiceError::from(e)
            }
        })?;

    tracing::info!("Worker profile {} created for user {}", profile.id, auth.user.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Worker profile created successfully", profile)),
    ))
}

pub async fn update_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<UpdateWorkerProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let profile = own_profile(&app_state, &auth).await?;

    let categories = match body.categories {
        Some(categories) => Some(normalize_categories(&app_state.db_client, categories).await?),
        None => None,
    };

    let changes = WorkerProfileChanges {
        categories,
        hourly_rate: body.hourly_rate.map(hourly_rate).transpose()?,
        is_available: body.is_available,
        bio: body.bio.as_deref().map(sanitize_plain),
        location: body.location.as_deref().map(sanitize_plain),
        phone: body.phone.map(|p| p.trim().to_string()),
    };

    let updated = app_state
        .db_client
        .update_worker_profile(profile.id, changes)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ApiResponse::success("Worker profile updated successfully", updated)))
}

pub async fn get_own_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = own_profile(&app_state, &auth).await?;

    Ok(Json(ApiResponse::success("Worker profile retrieved successfully", profile)))
}

pub async fn upload_profile_image(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<UploadImageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    if !app_state.cloudinary.is_enabled() {
        return Err(ServiceError::ProviderUnavailable("Image upload").into());
    }

    let profile = own_profile(&app_state, &auth).await?;
    let image = decode_image(&body.image).map_err(|e| HttpError::bad_request(e.to_string()))?;

    let uploaded = app_state
        .cloudinary
        .upload_image(&image, WORKER_IMAGE_FOLDER, &profile.id.to_string())
        .await
        .map_err(ServiceError::from)?;

    let updated = app_state
        .db_client
        .update_worker_image(profile.id, &uploaded.secure_url)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ApiResponse::success("Profile image uploaded successfully", updated)))
}

pub async fn get_worker(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(worker_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let worker = app_state
        .db_client
        .get_worker_by_id(worker_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::WorkerNotFound(worker_id))?;

    Ok(Json(ApiResponse::success("Worker retrieved successfully", worker)))
}

pub async fn search_workers(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<WorkerSearchQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate()?;

    let (page, limit) = paging(query.page, query.limit);
    let search = WorkerSearch {
        category: query
            .category
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty()),
        available: query.available,
        location: query
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
    };

    let workers = paged_workers(&app_state.db_client, &search, page, limit).await?;

    Ok(Json(workers))
}

pub(crate) async fn paged_workers(
    db_client: &DBClient,
    search: &WorkerSearch,
    page: u32,
    limit: u32,
) -> Result<PaginatedResponse<WorkerProfile>, ServiceError> {
    let (sql_limit, offset) = DBClient::limit_offset(page, limit);

    let (workers, total) = futures::try_join!(
        db_client.search_workers(search, sql_limit, offset),
        db_client.count_workers(search),
    )?;

    Ok(PaginatedResponse::new(workers, total, page, limit))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request as HttpRequest, StatusCode},
        response::Response,
    };
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use tower::ServiceExt;

    use super::*;

    fn png_body(decoded_len: usize) -> String {
        let mut bytes = vec![0u8; decoded_len];
        bytes[..8].copy_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        serde_json::json!({
            "image": format!("data:image/png;base64,{}", STANDARD.encode(&bytes))
        })
        .to_string()
    }

    async fn post_image(body: String) -> Response {
        let app = workers_handler()
            .layer(Extension(AuthenticatedUser::for_tests(UserRole::Worker)))
            .layer(Extension(AppState::for_tests()));

        app.oneshot(
            HttpRequest::builder()
                .method(Method::POST)
                .uri("/profile/image")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_body_limit_fits_largest_image() {
        let largest = png_body(MAX_IMAGE_BYTES);
        assert!(largest.len() <= IMAGE_BODY_LIMIT);
        assert!(decode_image(&STANDARD.encode(vec![0x89u8; MAX_IMAGE_BYTES + 1])).is_err());
    }

    #[tokio::test]
    async fn test_three_mib_image_reaches_the_handler() {
        // Cloudinary is unconfigured, so getting past the JSON extractor means a 503.
        let response = post_image(png_body(3 * 1024 * 1024)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let response = post_image(png_body(6 * 1024 * 1024)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
