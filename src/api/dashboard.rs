//! The main board: tier status for the selected scope plus the caller's
//! streak and any pending celebration.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::ApiError;
use super::metrics::record_celebration;
use super::sales::SaleResponse;
use super::scope::{is_own_view, resolve_scope, ScopeQuery};
use crate::db::{DailyTotal, Sale};
use crate::engine::{Celebration, CommissionPolicy, StreakPolicy, TierStatus};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub scope: String,
    /// The caller is looking at their own numbers
    pub own_view: bool,
    pub policy: CommissionPolicy,
    pub status: TierStatus,
    pub sales_count: i64,
    /// Caller's own streak, whatever the scope
    pub streak: u32,
    pub streak_policy: StreakPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub celebration: Option<Celebration>,
    pub top_sales: Vec<SaleResponse>,
    pub daily: Vec<DailyTotal>,
}

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let scope = resolve_scope(&state.db, &auth, query.user.as_deref()).await?;
    let own_view = is_own_view(&auth, &scope);
    let policy = state.config.commission.policy;
    let streak_policy = state.config.streak.policy;

    let total = Sale::total(&state.db, &scope).await?;
    let status = policy.evaluate(total);
    let sales_count = Sale::count(&state.db, &scope).await?;

    let active_dates = Sale::active_dates(&state.db, &auth.user.username).await?;
    let streak = streak_policy.active_days(active_dates, crate::utils::today());

    let celebration = if own_view {
        state
            .celebrations
            .observe(&auth.session_id, status.total, policy)
    } else {
        None
    };

    if let Some(celebration) = &celebration {
        record_celebration(celebration.tier);
        tracing::info!(
            username = %auth.user.username,
            tier = %celebration.tier,
            threshold = celebration.threshold,
            "Celebration triggered"
        );
    }

    let top_sales = Sale::top(&state.db, &scope, state.config.dashboard.top_sales_limit)
        .await?
        .into_iter()
        .map(SaleResponse::from)
        .collect();
    let daily = Sale::daily_totals(&state.db, &scope).await?;

    Ok(Json(DashboardResponse {
        scope: scope.label().to_string(),
        own_view,
        policy,
        status,
        sales_count,
        streak,
        streak_policy,
        celebration,
        top_sales,
        daily,
    }))
}
