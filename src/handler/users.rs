use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    db::userdb::UserExt,
    dtos::{userdtos::*, ApiResponse},
    error::HttpError,
    middleware::{AuthenticatedUser, FirebaseIdentity},
    models::usermodel::UserRole,
    service::error::ServiceError,
    AppState,
};

/// Routes behind the `auth` middleware. Registration lives outside it, see `register_user`.
pub fn users_handler() -> Router {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/me/role", patch(switch_role))
}

/// Creates the user row for a verified Firebase identity. Calling it again for
/// the same uid returns the existing user unchanged.
pub async fn register_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(identity): Extension<FirebaseIdentity>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let role = body.role.unwrap_or(UserRole::Client);
    if !role.is_self_assignable() {
        return Err(HttpError::forbidden("You cannot register with this role"));
    }

    let email = identity.claims.email.clone().unwrap_or_default();

    let (user, created) = app_state
        .db_client
        .save_user(&identity.claims.sub, body.name.trim(), &email, role)
        .await
        .map_err(ServiceError::from)?;

    if created {
        tracing::info!("Registered user {} as {}", user.id, user.role.to_str());
    }

    let (status, message) = registration_outcome(created);

    Ok((status, Json(ApiResponse::success(message, user))))
}

fn registration_outcome(created: bool) -> (StatusCode, &'static str) {
    if created {
        (StatusCode::CREATED, "User registered successfully")
    } else {
        (StatusCode::OK, "User already registered")
    }
}

pub async fn get_me(
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(ApiResponse::success("User retrieved successfully", auth.user)))
}

pub async fn update_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<UpdateUserProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let user = app_state
        .db_client
        .update_user_profile(
            auth.user.id,
            body.name.map(|name| name.trim().to_string()),
            body.avatar_url,
        )
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ApiResponse::success("Profile updated successfully", user)))
}

/// Self-service switch between client and worker.
pub async fn switch_role(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<ChangeRoleDto>,
) -> Result<impl IntoResponse, HttpError> {
    if !body.role.is_self_assignable() || auth.user.is_admin() {
        return Err(HttpError::forbidden("This role change is not allowed"));
    }

    if body.role == auth.user.role {
        return Ok(Json(ApiResponse::success("Role unchanged", auth.user)));
    }

    let user = app_state
        .db_client
        .change_user_role(auth.user.id, body.role, auth.user.id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::UserNotFound(auth.user.id))?;

    tracing::info!(
        "User {} switched role from {} to {}",
        user.id,
        auth.user.role.to_str(),
        user.role.to_str()
    );

    Ok(Json(ApiResponse::success("Role updated successfully", user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_registration_is_not_created() {
        assert_eq!(registration_outcome(true).0, StatusCode::CREATED);
        assert_eq!(
            registration_outcome(false),
            (StatusCode::OK, "User already registered")
        );
    }
}
