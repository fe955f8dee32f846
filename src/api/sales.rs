use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::record_sale;
use super::scope::resolve_scope;
use super::validation::{validate_agreement, validate_client, validate_sale_value};
use crate::db::{CreateSale, ProductCategory, Sale, SaleFilter};
use crate::AppState;

/// Query string of `GET /api/sales`
#[derive(Debug, Default, Deserialize)]
pub struct ListSalesQuery {
    pub user: Option<String>,
    pub product: Option<ProductCategory>,
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ListSalesQuery {
    fn filter(&self) -> SaleFilter {
        SaleFilter {
            product: self.product,
            search: self.search.clone(),
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SaleResponse {
    #[serde(flatten)]
    pub sale: Sale,
    pub product_label: String,
}

impl From<Sale> for SaleResponse {
    fn from(sale: Sale) -> Self {
        Self {
            product_label: sale.product_label(),
            sale,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListSalesResponse {
    pub scope: String,
    pub count: usize,
    /// Sum of the listed (filtered) sales
    pub total: f64,
    pub sales: Vec<SaleResponse>,
}

/// List sales in the caller's scope, narrowed by the optional filters
pub async fn list_sales(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListSalesQuery>,
) -> Result<Json<ListSalesResponse>, ApiError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::bad_request("'from' must not be after 'to'"));
        }
    }

    let scope = resolve_scope(&state.db, &auth, query.user.as_deref()).await?;
    let sales = Sale::list(&state.db, &scope, &query.filter()).await?;

    Ok(Json(ListSalesResponse {
        scope: scope.label().to_string(),
        count: sales.len(),
        total: sales.iter().map(|s| s.value).sum(),
        sales: sales.into_iter().map(SaleResponse::from).collect(),
    }))
}

/// Record a sale for the caller
pub async fn create_sale(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(request): Json<CreateSale>,
) -> Result<(StatusCode, Json<SaleResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("value", validate_sale_value(request.value));
    errors.check("client", validate_client(&request.client));
    errors.check("agreement", validate_agreement(&request.agreement));
    errors.finish()?;

    let sale = Sale::create(&state.db, &auth.user.username, &request).await?;
    record_sale(&sale.product);

    tracing::info!(
        sale_id = %sale.id,
        username = %sale.username,
        product = %sale.product,
        value = sale.value,
        "Sale recorded"
    );

    Ok((StatusCode::CREATED, Json(SaleResponse::from(sale))))
}

/// Delete a sale. Operators may only delete their own.
pub async fn delete_sale(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let sale = Sale::get(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale not found"))?;

    if sale.username != auth.user.username && !auth.is_admin() {
        return Err(ApiError::forbidden("You can only delete your own sales"));
    }

    if Sale::delete(&state.db, &id).await? == 0 {
        return Err(ApiError::not_found("Sale not found"));
    }

    tracing::info!(
        sale_id = %id,
        owner = %sale.username,
        deleted_by = %auth.user.username,
        "Sale deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
