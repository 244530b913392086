use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    db::userdb::UserExt,
    error::{ErrorMessage, HttpError},
    models::usermodel::{User, UserRole},
    service::firebase_auth::{AuthError, FirebaseClaims},
    AppState,
};

/// A verified Firebase identity that may not have a user row yet.
#[derive(Debug, Clone)]
pub struct FirebaseIdentity {
    pub claims: FirebaseClaims,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub claims: FirebaseClaims,
}

#[cfg(test)]
impl AuthenticatedUser {
    pub fn for_tests(role: UserRole) -> Self {
        let now = chrono::Utc::now();
        AuthenticatedUser {
            user: User {
                id: uuid::Uuid::new_v4(),
                firebase_uid: "uid-test".to_string(),
                name: "Asha Tamang".to_string(),
                email: "asha@example.com".to_string(),
                role,
                avatar_url: None,
                created_at: now,
                updated_at: now,
            },
            claims: FirebaseClaims {
                sub: "uid-test".to_string(),
                aud: "servicehub-test".to_string(),
                iss: "https://securetoken.google.com/servicehub-test".to_string(),
                exp: now.timestamp() + 3600,
                iat: now.timestamp(),
                auth_time: None,
                email: Some("asha@example.com".to_string()),
                email_verified: Some(true),
                name: None,
                picture: None,
            },
        }
    }
}

fn extract_token(cookie_jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
        .or_else(|| {
            cookie_jar
                .get("token")
                .map(|cookie| cookie.value().to_string())
        })
}

async fn verify_request(
    app_state: &AppState,
    cookie_jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<FirebaseClaims, HttpError> {
    let token = extract_token(cookie_jar, headers)
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    app_state
        .firebase_auth
        .verify_id_token(&token)
        .await
        .map_err(|e| match e {
            AuthError::InvalidToken(reason) => {
                tracing::debug!("Rejected ID token: {}", reason);
                HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())
            }
            AuthError::KeyFetch(reason) => {
                tracing::error!("Firebase key fetch failed: {}", reason);
                HttpError::service_unavailable("Authentication is temporarily unavailable")
            }
        })
}

/// Requires a valid token and a registered user.
pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let claims = verify_request(&app_state, &cookie_jar, req.headers()).await?;

    let user = app_state
        .db_client
        .get_user_by_firebase_uid(&claims.sub)
        .await
        .map_err(|e| {
            tracing::error!("User lookup failed: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotRegistered.to_string()))?;

    req.extensions_mut().insert(AuthenticatedUser { user, claims });

    Ok(next.run(req).await)
}

/// Requires a valid token only; used by sign-up.
pub async fn firebase_only(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let claims = verify_request(&app_state, &cookie_jar, req.headers()).await?;

    req.extensions_mut().insert(FirebaseIdentity { claims });

    Ok(next.run(req).await)
}

pub async fn role_check(
    req: Request,
    next: Next,
    required_roles: Vec<UserRole>,
) -> Result<impl IntoResponse, HttpError> {
    let auth = req
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !required_roles.contains(&auth.user.role) {
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=cookie-token"));
        let jar = CookieJar::from_headers(&headers);

        assert_eq!(extract_token(&jar, &headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token=cookie-token"));
        let jar = CookieJar::from_headers(&headers);

        assert_eq!(extract_token(&jar, &headers).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn test_non_bearer_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        let jar = CookieJar::from_headers(&headers);

        assert_eq!(extract_token(&jar, &headers), None);
    }
}
