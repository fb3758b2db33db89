//! Handlers for `/api/dashboard` endpoints: sales totals sliced by
//! department category and by store region, largest first.

use axum::extract::{Query, State};
use mercato_core::{accessor::FactStore, filter::GroupKey, metrics::Breakdown};

use crate::{ApiResult, AppState, success, validate::FilterParams};

/// `GET /api/dashboard/categories`
pub async fn categories<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<Vec<Breakdown>> {
  let filter = params.filter()?;
  success(state.analytics.breakdown(&filter, GroupKey::Category).await?)
}

/// `GET /api/dashboard/regions`
pub async fn regions<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<Vec<Breakdown>> {
  let filter = params.filter()?;
  success(state.analytics.breakdown(&filter, GroupKey::Region).await?)
}
