use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{
        categorydb::CategoryExt,
        db::DBClient,
        is_foreign_key_violation, is_unique_violation,
        jobdb::{JobExt, JobParty},
        paymentdb::PaymentExt,
        userdb::UserExt,
    },
    dtos::{
        admindtos::*, jobdtos::JobQueryDto, paging, paymentdtos::PaymentQueryDto,
        userdtos::ChangeRoleDto, workerdtos::*, ApiResponse, PaginatedResponse,
    },
    error::HttpError,
    handler::jobs::paged_jobs,
    middleware::AuthenticatedUser,
    models::workermodel::Category,
    service::error::ServiceError,
    AppState,
};

/// Mounted under `/api/admin` with `auth` plus an admin-only `role_check`.
pub fn admin_handler() -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/users", get(get_users))
        .route("/users/:user_id/role", patch(change_user_role))
        .route("/users/:user_id", get(get_user).delete(delete_user))
        .route("/jobs", get(get_jobs))
        .route("/payments", get(get_payments))
        .route("/payments/:payment_id/refund", post(refund_payment))
        .route("/categories", post(create_category))
        .route(
            "/categories/:category_id",
            put(update_category).delete(delete_category),
        )
}

pub async fn get_stats(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;

    let (users_by_role, jobs_by_status, (total_revenue, total_service_fees, completed_payments)) =
        futures::try_join!(db.count_users_by_role(), db.count_jobs_by_status(), db.revenue_totals())
            .map_err(ServiceError::from)?;

    let total_users: i64 = users_by_role.iter().map(|(_, count)| count).sum();
    let total_jobs: i64 = jobs_by_status.iter().map(|(_, count)| count).sum();

    let stats = AdminStatsDto {
        users_by_role: users_by_role
            .into_iter()
            .map(|(role, count)| (role.to_str().to_string(), count))
            .collect(),
        total_users,
        jobs_by_status: jobs_by_status
            .into_iter()
            .map(|(status, count)| (status.to_str().to_string(), count))
            .collect(),
        total_jobs,
        completed_payments,
        total_revenue,
        total_service_fees,
    };

    Ok(Json(ApiResponse::success("Platform statistics", stats)))
}

pub async fn get_users(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<UserQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate()?;

    let (page, limit) = paging(query.page, query.limit);
    let (sql_limit, offset) = DBClient::limit_offset(page, limit);

    let (users, total) = futures::try_join!(
        app_state.db_client.get_users(query.role, sql_limit, offset),
        app_state.db_client.get_user_count(query.role),
    )
    .map_err(ServiceError::from)?;

    Ok(Json(PaginatedResponse::new(users, total, page, limit)))
}

pub async fn get_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .db_client
        .get_user_by_id(user_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::UserNotFound(user_id))?;

    let role_changes = app_state
        .db_client
        .get_role_changes(user.id)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ApiResponse::success(
        "User retrieved successfully",
        AdminUserDetailDto { user, role_changes },
    )))
}

/// Any role, admin included. Audited in `role_changes` with the acting admin.
pub async fn change_user_role(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<ChangeRoleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .db_client
        .change_user_role(user_id, body.role, auth.user.id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::UserNotFound(user_id))?;

    tracing::info!(
        "Admin {} set role of user {} to {}",
        auth.user.id,
        user.id,
        user.role.to_str()
    );

    Ok(Json(ApiResponse::success("User role updated", user)))
}

pub async fn delete_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    if user_id == auth.user.id {
        return Err(HttpError::bad_request("You cannot delete your own account"));
    }

    let deleted = app_state
        .db_client
        .delete_user(user_id)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                ServiceError::Validation(
                    "User still has jobs or payments on record and cannot be deleted".to_string(),
                )
            } else {
                ServiceError::from(e)
            }
        })?;

    if deleted == 0 {
        return Err(ServiceError::UserNotFound(user_id).into());
    }

    tracing::info!("Admin {} deleted user {}", auth.user.id, user_id);

    Ok(Json(ApiResponse::success("User deleted", user_id)))
}

pub async fn get_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<JobQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate()?;

    let jobs = paged_jobs(&app_state.db_client, JobParty::Any, &query).await?;

    Ok(Json(jobs))
}

pub async fn get_payments(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<PaymentQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate()?;

    let (page, limit) = paging(query.page, query.limit);
    let (sql_limit, offset) = DBClient::limit_offset(page, limit);

    let (payments, total) = futures::try_join!(
        app_state.db_client.get_payments(query.status, sql_limit, offset),
        app_state.db_client.count_payments(query.status),
    )
    .map_err(ServiceError::from)?;

    Ok(Json(PaginatedResponse::new(payments, total, page, limit)))
}

pub async fn refund_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(payment_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let payment = app_state
        .payment_service
        .refund_payment(payment_id, &auth.user)
        .await?;

    Ok(Json(ApiResponse::success("Payment refunded", payment)))
}

fn category_slug(name: &str) -> Result<String, ServiceError> {
    let slug = Category::slugify(name);
    if slug.is_empty() {
        return Err(ServiceError::Validation(
            "Category name must contain letters or digits".to_string(),
        ));
    }
    Ok(slug)
}

fn category_write_error(e: sqlx::Error) -> HttpError {
    if is_unique_violation(&e) {
        HttpError::conflict("A category with this name already exists")
    } else {
        ServiceError::from(e).into()
    }
}

pub async fn create_category(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<CreateCategoryDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let name = body.name.trim();
    let slug = category_slug(name)?;

    let category = app_state
        .db_client
        .create_category(name, &slug, body.description.trim(), body.image_url)
        .await
        .map_err(category_write_error)?;

    tracing::info!("Category {} created", category.slug);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Category created", category)),
    ))
}

/// Renaming re-derives the slug; worker profiles follow the new slug.
pub async fn update_category(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(category_id): Path<Uuid>,
    Json(body): Json<UpdateCategoryDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let name = body.name.map(|n| n.trim().to_string());
    let slug = name.as_deref().map(category_slug).transpose()?;

    let category = app_state
        .db_client
        .update_category(
            category_id,
            name,
            slug,
            body.description.map(|d| d.trim().to_string()),
            body.image_url,
        )
        .await
        .map_err(category_write_error)?
        .ok_or_else(|| HttpError::not_found(format!("Category {} not found", category_id)))?;

    Ok(Json(ApiResponse::success("Category updated", category)))
}

pub async fn delete_category(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(category_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let deleted = app_state
        .db_client
        .delete_category(category_id)
        .await
        .map_err(ServiceError::from)?;

    if deleted == 0 {
        return Err(HttpError::not_found(format!("Category {} not found", category_id)));
    }

    Ok(Json(ApiResponse::success("Category deleted", category_id)))
}
