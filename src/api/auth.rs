use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_password, validate_username};
use crate::config::AuthConfig;
use crate::db::{
    DbPool, LoginRequest, LoginResponse, RegisterRequest, Session, User, UserResponse, UserRole,
};
use crate::engine::CelebrationRegistry;
use crate::AppState;

/// The caller behind a valid session token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub session_id: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator access required"))
        }
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Sessions store only the SHA-256 of the bearer token
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn extract_token(headers: &axum::http::HeaderMap) -> Option<String> {
    let header = headers.get("Authorization").and_then(|h| h.to_str().ok())?;
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve a bearer token to its session and user
async fn resolve_token(db: &DbPool, token: &str) -> Result<Option<AuthUser>, sqlx::Error> {
    let Some(session) = Session::find_valid(db, &hash_token(token)).await? else {
        return Ok(None);
    };

    let user = User::find_by_id(db, &session.user_id).await?;
    Ok(user.map(|user| AuthUser {
        user,
        session_id: session.id,
    }))
}

/// Open a session for `user` and hand back the raw token
async fn start_session(state: &AppState, user: User) -> Result<LoginResponse, ApiError> {
    let token = generate_token();
    Session::create(
        &state.db,
        &user.id,
        &hash_token(&token),
        state.config.auth.session_ttl_days,
    )
    .await?;

    Ok(LoginResponse {
        token,
        user: UserResponse::from(user),
    })
}

fn hash_or_internal(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })
}

/// Rejects requests without a valid session; on success the caller is
/// available to handlers through the `AuthUser` extractor.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

    let auth_user = resolve_token(&state.db, &token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        resolve_token(&state.db, &token)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))
    }
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = User::find_by_username(&state.db, request.username.trim()).await?;

    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => {
            tracing::warn!(username = %request.username, "Failed login attempt");
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
    };

    tracing::info!(username = %user.username, role = %user.role(), "User logged in");
    Ok(Json(start_session(&state, user).await?))
}

/// Self-service sign up. New accounts are always operators.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    if !state.config.auth.allow_registration {
        return Err(ApiError::forbidden("Registration is disabled"));
    }

    let username = request.username.trim().to_string();
    let mut errors = ValidationErrorBuilder::new();
    errors.check("username", validate_username(&username));
    errors.check("password", validate_password(&request.password));
    errors.finish()?;

    if User::find_by_username(&state.db, &username).await?.is_some() {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let password_hash = hash_or_internal(&request.password)?;
    let user = User::create(&state.db, &username, &password_hash, UserRole::Operator).await?;

    tracing::info!(username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(start_session(&state, user).await?)))
}

/// Ends the caller's session and forgets its celebration state
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    Session::delete(&state.db, &auth.session_id).await?;
    state.celebrations.end_session(&auth.session_id);

    tracing::info!(username = %auth.user.username, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(auth: AuthUser) -> impl IntoResponse {
    Json(UserResponse::from(auth.user))
}

/// Delete expired sessions and drop the celebration state of every session
/// that no longer exists. Returns the number of sessions deleted.
pub async fn prune_sessions(
    db: &DbPool,
    celebrations: &CelebrationRegistry,
) -> Result<u64, sqlx::Error> {
    let purged = Session::delete_expired(db).await?;

    // Trackers created after this snapshot belong to sessions that were
    // valid moments ago and must survive this sweep.
    let tracked: HashSet<String> = celebrations.session_ids().into_iter().collect();
    let live: HashSet<String> = Session::list_ids(db).await?.into_iter().collect();
    celebrations.retain_sessions(|id| live.contains(id) || !tracked.contains(id));

    Ok(purged)
}

/// Spawn a background task that periodically prunes ended sessions
pub fn spawn_session_cleanup_task(state: Arc<AppState>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let interval = std::time::Duration::from_secs(cleanup_interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            match prune_sessions(&state.db, &state.celebrations).await {
                Ok(purged) => tracing::debug!(
                    purged,
                    tracked = state.celebrations.len(),
                    "Session cleanup complete"
                ),
                Err(e) => tracing::warn!("Session cleanup failed: {}", e),
            }
        }
    });
}

/// Bootstrap the administrator account on first start.
///
/// An existing account under the configured name is left untouched. When no
/// password is configured and the user table is empty, a random one is
/// generated and printed once to the log.
pub async fn ensure_admin_user(db: &DbPool, auth: &AuthConfig) -> anyhow::Result<()> {
    if User::find_by_username(db, &auth.admin_username).await?.is_some() {
        return Ok(());
    }

    let password = match &auth.admin_password {
        Some(password) => password.clone(),
        None => {
            if User::count(db).await? > 0 {
                return Ok(());
            }
            let generated = generate_token()[..20].to_string();
            tracing::warn!(
                username = %auth.admin_username,
                password = %generated,
                "Generated initial admin password, change it after first login"
            );
            generated
        }
    };

    let password_hash =
        hash_password(&password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    User::create(db, &auth.admin_username, &password_hash, UserRole::Admin).await?;

    tracing::info!(username = %auth.admin_username, "Created admin user");
    Ok(())
}
