//! Handlers for `/api/sales` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/sales` | Filter params plus `limit` |
//! | `GET`  | `/api/sales/summary` | `group_by`, `time_period`, filter params |
//! | `GET`  | `/api/sales/metrics` | Filter params |
//! | `GET`  | `/api/sales/recent-summary` | `days` (default 30), `as_of` |
//! | `GET`  | `/api/sales/stores` | |
//! | `GET`  | `/api/sales/stores/{id}` | 404 if not found |
//! | `GET`  | `/api/sales/departments` | |
//! | `GET`  | `/api/sales/departments/{id}` | 404 if not found |

use axum::extract::{Path, Query, State};
use mercato_core::{
  accessor::FactStore,
  entity::{Department, Store},
  filter::{GroupAggregate, GroupKey, TimePeriod},
  metrics::{RecentSummary, SalesMetrics},
  sale::SaleRow,
};
use serde::Deserialize;

use crate::{
  ApiResult, AppState,
  error::ApiError,
  success,
  validate::{self, FilterParams},
};

/// Default trailing window of the recent summary, in days.
pub const RECENT_DAYS: i64 = 30;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(flatten)]
  pub filter: FilterParams,
  pub limit:  Option<String>,
}

/// `GET /api/sales`
pub async fn list<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> ApiResult<Vec<SaleRow>> {
  let filter = params.filter.filter()?;
  let limit = validate::limit(params.limit.as_deref(), state.limits)?;
  success(state.analytics.list_sales(&filter, limit).await?)
}

// ─── Summary ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
  #[serde(flatten)]
  pub filter:      FilterParams,
  pub group_by:    Option<String>,
  pub time_period: Option<String>,
}

/// `GET /api/sales/summary[?group_by=<key>&time_period=<period>]`
///
/// `group_by` defaults to `date`, `time_period` to `month`.
pub async fn summary<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<SummaryParams>,
) -> ApiResult<Vec<GroupAggregate>> {
  let filter = params.filter.filter()?;
  let period: TimePeriod =
    validate::choice(params.time_period.as_deref())?.unwrap_or_default();
  let key = GroupKey::parse(params.group_by.as_deref().unwrap_or("date"), period)?;
  success(state.analytics.summary(&filter, key).await?)
}

// ─── Metrics ──────────────────────────────────────────────────────────────────

/// `GET /api/sales/metrics`
pub async fn metrics<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<SalesMetrics> {
  let filter = params.filter()?;
  success(state.analytics.sales_metrics(&filter).await?)
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
  pub days:  Option<String>,
  pub as_of: Option<String>,
}

/// `GET /api/sales/recent-summary[?days=<n>&as_of=<date>]`
pub async fn recent_summary<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<RecentParams>,
) -> ApiResult<RecentSummary> {
  let days = validate::bounded("days", params.days.as_deref(), 1, 365)?
    .unwrap_or(RECENT_DAYS);
  let as_of = validate::date("as_of", params.as_of.as_deref())?;
  success(state.analytics.recent_summary(as_of, days).await?)
}

// ─── Reference data ───────────────────────────────────────────────────────────

fn path_id(field: &str, raw: &str) -> Result<i64, ApiError> {
  validate::id(field, Some(raw))?
    .ok_or_else(|| ApiError::validation(format!("{field} is required")))
}

/// `GET /api/sales/stores`
pub async fn stores<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
) -> ApiResult<Vec<Store>> {
  success(state.analytics.list_stores().await?)
}

/// `GET /api/sales/stores/{id}`
pub async fn store<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> ApiResult<Store> {
  let id = path_id("store_id", &id)?;
  success(state.analytics.get_store(id).await?)
}

/// `GET /api/sales/departments`
pub async fn departments<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
) -> ApiResult<Vec<Department>> {
  success(state.analytics.list_departments().await?)
}

/// `GET /api/sales/departments/{id}`
pub async fn department<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> ApiResult<Department> {
  let id = path_id("dept_id", &id)?;
  success(state.analytics.get_department(id).await?)
}
