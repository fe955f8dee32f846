//! Resolution of the `user` query parameter into a sale scope.

use serde::Deserialize;

use super::auth::AuthUser;
use super::error::ApiError;
use crate::db::{DbPool, SaleScope, User};

/// `?user=` on scoped endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub user: Option<String>,
}

/// Work out whose sales the caller is looking at.
///
/// Operators only ever see themselves; asking for anyone else (or `all`) is
/// forbidden. Admins may pick any existing user or `all`.
pub async fn resolve_scope(
    db: &DbPool,
    auth: &AuthUser,
    requested: Option<&str>,
) -> Result<SaleScope, ApiError> {
    let own = &auth.user.username;
    let requested = requested.map(str::trim).filter(|s| !s.is_empty());

    let Some(requested) = requested else {
        return Ok(SaleScope::User(own.clone()));
    };

    if requested == own {
        return Ok(SaleScope::User(own.clone()));
    }

    if !auth.is_admin() {
        tracing::warn!(username = %own, requested = %requested, "Operator requested foreign scope");
        return Err(ApiError::forbidden(
            "Operators can only view their own sales",
        ));
    }

    if requested.eq_ignore_ascii_case("all") {
        return Ok(SaleScope::All);
    }

    match User::find_by_username(db, requested).await? {
        Some(user) => Ok(SaleScope::User(user.username)),
        None => Err(ApiError::not_found(format!("User '{}' not found", requested))),
    }
}

/// True when the scope is exactly the caller's own sales
pub fn is_own_view(auth: &AuthUser, scope: &SaleScope) -> bool {
    matches!(scope, SaleScope::User(username) if *username == auth.user.username)
}
