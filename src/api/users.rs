use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::auth::{hash_password, AuthUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_password, validate_username};
use crate::db::{CreateUserRequest, User, UserResponse};
use crate::AppState;

/// List all users (admin only)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    auth.require_admin()?;

    let users = User::list_all(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Create a user with an explicit role (admin only)
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    auth.require_admin()?;

    let username = request.username.trim().to_string();
    let mut errors = ValidationErrorBuilder::new();
    errors.check("username", validate_username(&username));
    errors.check("password", validate_password(&request.password));
    errors.finish()?;

    let password_hash = hash_password(&request.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })?;

    let user = User::create(&state.db, &username, &password_hash, request.role).await?;

    tracing::info!(
        username = %user.username,
        role = %user.role(),
        created_by = %auth.user.username,
        "User created"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}
