//! Sale models and queries.
//!
//! Sales are inserted once and never updated. Every read that depends on
//! user input (scope, product, search text, date range) goes through
//! `QueryBuilder::push_bind` so nothing is interpolated into SQL.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::engine::{LiveEvent, SellerTotal};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SALE_COLUMNS: &str =
    "SELECT id, username, sale_date, client, agreement, product, value, created_at FROM sales";

/// Product line a sale belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Loan,
    CreditCard,
    Benefit,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Loan => "loan",
            ProductCategory::CreditCard => "credit_card",
            ProductCategory::Benefit => "benefit",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ProductCategory::Loan => "Loan",
            ProductCategory::CreditCard => "Credit card",
            ProductCategory::Benefit => "Benefit",
        }
    }
}

impl std::str::FromStr for ProductCategory {
    type Err = UnknownProduct;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "loan" => Ok(ProductCategory::Loan),
            "credit_card" => Ok(ProductCategory::CreditCard),
            "benefit" => Ok(ProductCategory::Benefit),
            _ => Err(UnknownProduct(s.to_string())),
        }
    }
}

impl std::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown product category: {0}")]
pub struct UnknownProduct(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Sale {
    pub id: String,
    pub username: String,
    /// ISO date (`YYYY-MM-DD`)
    pub sale_date: String,
    pub client: String,
    pub agreement: String,
    pub product: String,
    pub value: f64,
    pub created_at: String,
}

impl Sale {
    pub fn product_enum(&self) -> Option<ProductCategory> {
        self.product.parse().ok()
    }

    pub fn product_label(&self) -> String {
        self.product_enum()
            .map(|p| p.label().to_string())
            .unwrap_or_else(|| self.product.clone())
    }

    pub fn to_live_event(&self) -> LiveEvent {
        LiveEvent {
            username: self.username.clone(),
            value: self.value,
            product: self.product_label(),
        }
    }
}

/// Whose sales a query covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleScope {
    User(String),
    All,
}

impl SaleScope {
    pub fn label(&self) -> &str {
        match self {
            SaleScope::User(username) => username,
            SaleScope::All => "all",
        }
    }

    fn push_condition(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let SaleScope::User(username) = self {
            qb.push(" AND username = ").push_bind(username.clone());
        }
    }
}

/// Optional narrowing for sale listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleFilter {
    pub product: Option<ProductCategory>,
    /// Substring of the client or agreement name
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SaleFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(product) = self.product {
            qb.push(" AND product = ").push_bind(product.as_str());
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (client LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR agreement LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(from) = self.from {
            qb.push(" AND sale_date >= ")
                .push_bind(from.format(DATE_FORMAT).to_string());
        }
        if let Some(to) = self.to {
            qb.push(" AND sale_date <= ")
                .push_bind(to.format(DATE_FORMAT).to_string());
        }
    }
}

/// Escape LIKE wildcards so user text matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSale {
    pub sale_date: NaiveDate,
    pub client: String,
    #[serde(default)]
    pub agreement: String,
    pub product: ProductCategory,
    pub value: f64,
}

/// Sum of sales for one calendar day (chart series)
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DailyTotal {
    pub sale_date: String,
    pub total: f64,
}

impl Sale {
    pub async fn create(
        db: &SqlitePool,
        username: &str,
        sale: &CreateSale,
    ) -> Result<Sale, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO sales (id, username, sale_date, client, agreement, product, value, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(username)
        .bind(sale.sale_date.format(DATE_FORMAT).to_string())
        .bind(sale.client.trim())
        .bind(sale.agreement.trim())
        .bind(sale.product.as_str())
        .bind(sale.value)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get(db, &id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get(db: &SqlitePool, id: &str) -> Result<Option<Sale>, sqlx::Error> {
        sqlx::query_as(&format!("{} WHERE id = ?", SALE_COLUMNS))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn delete(db: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sales WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Sales in scope matching the filter, newest first
    pub async fn list(
        db: &SqlitePool,
        scope: &SaleScope,
        filter: &SaleFilter,
    ) -> Result<Vec<Sale>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(SALE_COLUMNS);
        scope.push_condition(&mut qb);
        filter.push_conditions(&mut qb);
        qb.push(" ORDER BY sale_date DESC, created_at DESC");

        qb.build_query_as::<Sale>().fetch_all(db).await
    }

    /// Cumulative value of every sale in scope
    pub async fn total(db: &SqlitePool, scope: &SaleScope) -> Result<f64, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COALESCE(SUM(value), 0.0) FROM sales");
        scope.push_condition(&mut qb);

        qb.build_query_scalar::<f64>().fetch_one(db).await
    }

    pub async fn count(db: &SqlitePool, scope: &SaleScope) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sales");
        scope.push_condition(&mut qb);

        qb.build_query_scalar::<i64>().fetch_one(db).await
    }

    /// Distinct days on which the user recorded at least one sale
    pub async fn active_dates(
        db: &SqlitePool,
        username: &str,
    ) -> Result<Vec<NaiveDate>, sqlx::Error> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT sale_date FROM sales WHERE username = ? ORDER BY sale_date DESC",
        )
        .bind(username)
        .fetch_all(db)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
            .collect())
    }

    /// Per-user totals at or above `min_total`, highest first
    pub async fn totals_by_user(
        db: &SqlitePool,
        min_total: f64,
    ) -> Result<Vec<SellerTotal>, sqlx::Error> {
        let rows: Vec<(String, f64)> = sqlx::query_as(
            r#"
            SELECT username, SUM(value) AS total
            FROM sales
            GROUP BY username
            HAVING SUM(value) >= ?
            ORDER BY total DESC
            "#,
        )
        .bind(min_total)
        .fetch_all(db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(username, total)| SellerTotal { username, total })
            .collect())
    }

    /// Latest sales across everyone, newest first
    pub async fn recent(db: &SqlitePool, limit: i64) -> Result<Vec<Sale>, sqlx::Error> {
        sqlx::query_as(&format!(
            "{} ORDER BY sale_date DESC, created_at DESC LIMIT ?",
            SALE_COLUMNS
        ))
        .bind(limit.max(0))
        .fetch_all(db)
        .await
    }

    /// Highest-value sales in scope
    pub async fn top(
        db: &SqlitePool,
        scope: &SaleScope,
        limit: i64,
    ) -> Result<Vec<Sale>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(SALE_COLUMNS);
        scope.push_condition(&mut qb);
        qb.push(" ORDER BY value DESC, created_at DESC LIMIT ")
            .push_bind(limit.max(0));

        qb.build_query_as::<Sale>().fetch_all(db).await
    }

    /// Per-day totals in scope, oldest first
    pub async fn daily_totals(
        db: &SqlitePool,
        scope: &SaleScope,
    ) -> Result<Vec<DailyTotal>, sqlx::Error> {
        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT sale_date, SUM(value) AS total FROM sales");
        scope.push_condition(&mut qb);
        qb.push(" GROUP BY sale_date ORDER BY sale_date ASC");

        qb.build_query_as::<DailyTotal>().fetch_all(db).await
    }
}
