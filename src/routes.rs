// routes.rs
use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        admin::admin_handler,
        categories::categories_handler,
        jobs::jobs_handler,
        notifications::notifications_handler,
        payments::{payments_handler, stripe_webhook},
        reviews::reviews_handler,
        users::{register_user, users_handler},
        workers::workers_handler,
    },
    middleware::{auth, firebase_only, role_check},
    models::usermodel::UserRole,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Sign-up only needs a verified token, not an existing user row.
    let user_routes = Router::new()
        .route(
            "/register",
            post(register_user).layer(middleware::from_fn(firebase_only)),
        )
        .merge(users_handler().layer(middleware::from_fn(auth)));

    let payment_routes = Router::new()
        .merge(payments_handler().layer(middleware::from_fn(auth)))
        .route("/webhook/stripe", post(stripe_webhook));

    let admin_routes = admin_handler()
        .layer(middleware::from_fn(|req: Request, next: Next| {
            role_check(req, next, vec![UserRole::Admin])
        }))
        .layer(middleware::from_fn(auth));

    let api_route = Router::new()
        .nest("/users", user_routes)
        .nest("/workers", workers_handler().layer(middleware::from_fn(auth)))
        .nest("/categories", categories_handler())
        .nest("/jobs", jobs_handler().layer(middleware::from_fn(auth)))
        .nest("/payments", payment_routes)
        .nest("/reviews", reviews_handler().layer(middleware::from_fn(auth)))
        .nest(
            "/notifications",
            notifications_handler().layer(middleware::from_fn(auth)),
        )
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::error::ErrorResponse;

    fn test_state() -> Arc<AppState> {
        AppState::for_tests()
    }

    async fn error_body(response: axum::response::Response) -> ErrorResponse {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_require_a_token() {
        for uri in ["/api/users/me", "/api/jobs/client", "/api/notifications", "/api/admin/stats"] {
            let app = create_router(test_state());
            let response = app
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(error_body(response).await.status, "fail");
        }
    }

    #[tokio::test]
    async fn test_register_rejects_malformed_token() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/users/register")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"Asha"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stripe_webhook_is_public_but_needs_a_signature() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/payments/webhook/stripe")
                    .body(Body::from(r#"{"id":"evt_1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_body(response).await.message.contains("Stripe-Signature"));
    }

    #[tokio::test]
    async fn test_stripe_webhook_without_secret_is_unavailable() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/payments/webhook/stripe")
                    .header("stripe-signature", "t=1,v1=00")
                    .body(Body::from(r#"{"id":"evt_1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
