use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::ApiError;
use crate::db::Sale;
use crate::engine::{LiveEvent, Ticker, TickerMode};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TickerQuery {
    pub mode: Option<TickerMode>,
}

#[derive(Debug, Serialize)]
pub struct TickerResponse {
    pub mode: TickerMode,
    pub messages: Vec<String>,
}

/// Shared feed; every authenticated user sees the same messages
pub async fn get_ticker(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(query): Query<TickerQuery>,
) -> Result<Json<TickerResponse>, ApiError> {
    let mode = query.mode.unwrap_or_default();
    let policy = state.config.commission.policy;

    let messages = match mode {
        TickerMode::Leaderboard => {
            let totals = Sale::totals_by_user(&state.db, policy.first_threshold()).await?;
            Ticker::leaderboard(&totals, policy).messages()
        }
        TickerMode::Recent => {
            let limit = state.config.ticker.recent_limit;
            let events: Vec<LiveEvent> = Sale::recent(&state.db, limit as i64)
                .await?
                .iter()
                .map(Sale::to_live_event)
                .collect();
            Ticker::recent(&events, limit).messages()
        }
    };

    Ok(Json(TickerResponse { mode, messages }))
}
