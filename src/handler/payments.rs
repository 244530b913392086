use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{db::DBClient, paymentdb::PaymentExt},
    dtos::{paging, paymentdtos::*, ApiResponse, PaginatedResponse},
    error::HttpError,
    middleware::AuthenticatedUser,
    service::error::ServiceError,
    AppState,
};

/// Authenticated payment routes. The Stripe webhook is mounted separately, without auth.
pub fn payments_handler() -> Router {
    Router::new()
        .route("/quote/:job_id", get(get_quote))
        .route("/stripe/intent", post(create_stripe_intent))
        .route("/stripe/confirm", post(confirm_stripe_payment))
        .route("/khalti/initiate", post(initiate_khalti_payment))
        .route("/khalti/verify", post(verify_khalti_payment))
        .route("/history", get(get_payment_history))
        .route("/job/:job_id", get(get_job_payments))
}

pub async fn get_quote(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let quote = app_state
        .payment_service
        .quote_for_job(job_id, &auth.user)
        .await?;

    Ok(Json(ApiResponse::success("Quote calculated", quote)))
}

pub async fn create_stripe_intent(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<JobPaymentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let checkout = app_state
        .payment_service
        .create_stripe_intent(body.job_id, &auth.user)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Payment intent created", checkout)),
    ))
}

pub async fn confirm_stripe_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<ConfirmStripePaymentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let confirmation = app_state
        .payment_service
        .confirm_stripe_payment(body.job_id, body.payment_intent_id.trim(), &auth.user)
        .await?;

    let message = if confirmation.newly_settled {
        "Payment confirmed"
    } else {
        "Payment was already confirmed"
    };

    Ok(Json(ApiResponse::success(message, confirmation)))
}

pub async fn initiate_khalti_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<JobPaymentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let checkout = app_state
        .payment_service
        .initiate_khalti_payment(body.job_id, &auth.user)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Khalti payment initiated", checkout)),
    ))
}

pub async fn verify_khalti_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<VerifyKhaltiPaymentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let confirmation = app_state
        .payment_service
        .verify_khalti_payment(body.job_id, body.pidx.trim(), &auth.user)
        .await?;

    let message = if confirmation.newly_settled {
        "Payment verified"
    } else {
        "Payment was already verified"
    };

    Ok(Json(ApiResponse::success(message, confirmation)))
}

pub async fn get_payment_history(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Query(query): Query<PaymentQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate()?;

    let (page, limit) = paging(query.page, query.limit);
    let (sql_limit, offset) = DBClient::limit_offset(page, limit);

    let (payments, total) = futures::try_join!(
        app_state
            .db_client
            .get_payments_for_user(auth.user.id, sql_limit, offset),
        app_state.db_client.count_payments_for_user(auth.user.id),
    )
    .map_err(ServiceError::from)?;

    Ok(Json(PaginatedResponse::new(payments, total, page, limit)))
}

pub async fn get_job_payments(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let payments = app_state
        .payment_service
        .payments_for_job(job_id, &auth.user)
        .await?;

    Ok(Json(ApiResponse::success("Payments retrieved successfully", payments)))
}

/// Stripe calls this directly; authenticity comes from the `Stripe-Signature` header.
pub async fn stripe_webhook(
    Extension(app_state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| HttpError::bad_request("Missing Stripe-Signature header"))?;

    app_state
        .payment_service
        .handle_stripe_webhook(&body, signature)
        .await
        .map_err(|e| {
            tracing::warn!("Stripe webhook rejected: {}", e);
            e
        })?;

    Ok(Json(json!({ "received": true })))
}
