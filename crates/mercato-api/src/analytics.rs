//! Handlers for `/api/analytics` endpoints.
//!
//! Metric endpoints take the common filter params (`start_date`, `end_date`,
//! `store_id`, `dept_id`). Model-fitting endpoints (segments, forecast,
//! anomalies, report) fetch their inputs first and then fit on the blocking
//! pool under the configured timeout.

use std::sync::Arc;

use axum::extract::{Query, State};
use chrono::{Datelike as _, Utc};
use mercato_core::{
  accessor::FactStore,
  anomaly::{AnomalyMethod, AnomalyReport},
  correlation::Correlation,
  entity::EntityKind,
  forecast::{Forecast, ForecastMethod},
  metrics::{
    DepartmentGrowth, Growth, GrowthKind, HolidayComparison, Kpis,
    PromotionImpact, StorePerformance, StoreTypePerformance, TimeSeriesPoint,
    TopPerformers,
  },
  partial::Partial,
  report::{Report, ReportInputs},
  seasonality::{Dimension, SeasonalIndex},
  segmentation::Segmentation,
};
use serde::Deserialize;

use crate::{
  ApiResult, AppState,
  fit::run_blocking,
  success,
  validate::{self, FilterParams},
};

/// Default number of ranked entities.
pub const TOP_LIMIT: usize = 5;
pub const MAX_CLUSTERS: usize = 20;
pub const MAX_PERIODS: usize = 365;

// ─── Metrics ──────────────────────────────────────────────────────────────────

/// `GET /api/analytics/kpis`
///
/// With both `start_date` and `end_date`, the response also carries the
/// previous equal-length period's sales and the growth against it.
pub async fn kpis<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<Kpis> {
  let filter = params.filter()?;
  success(state.analytics.kpis(&filter).await?)
}

/// `GET /api/analytics/growth?start_date=..&end_date=..`
pub async fn growth<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<Growth> {
  let filter = params.filter()?;
  let range = params.required_range()?;
  success(
    state
      .analytics
      .growth(&filter, range, GrowthKind::PeriodOverPeriod)
      .await?,
  )
}

/// `GET /api/analytics/growth/yoy?start_date=..&end_date=..`
pub async fn growth_yoy<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<Growth> {
  let filter = params.filter()?;
  let range = params.required_range()?;
  success(
    state
      .analytics
      .growth(&filter, range, GrowthKind::YearOverYear)
      .await?,
  )
}

/// `GET /api/analytics/holiday`
pub async fn holiday<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<HolidayComparison> {
  let filter = params.filter()?;
  success(state.analytics.holiday(&filter).await?)
}

/// `GET /api/analytics/promotions`
///
/// Average sales of marked-down weeks against unmarked ones, overall and per
/// department.
pub async fn promotions<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<PromotionImpact> {
  let filter = params.filter()?;
  success(state.analytics.promotion_impact(&filter).await?)
}

#[derive(Debug, Deserialize)]
pub struct YearParams {
  #[serde(flatten)]
  pub filter: FilterParams,
  pub year:   Option<String>,
}

/// `GET /api/analytics/store-performance[?year=<y>]`, defaulting to the
/// current year.
pub async fn store_performance<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<YearParams>,
) -> ApiResult<Vec<StorePerformance>> {
  let filter = params.filter.filter()?;
  let year = validate::year(params.year.as_deref())?.unwrap_or_else(|| Utc::now().year());
  success(state.analytics.store_performance(year, &filter).await?)
}

/// `GET /api/analytics/store-type-performance[?year=<y>]`
pub async fn store_type_performance<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<YearParams>,
) -> ApiResult<Vec<StoreTypePerformance>> {
  let year = validate::year(params.year.as_deref())?;
  success(state.analytics.store_type_performance(year).await?)
}

/// `GET /api/analytics/time-series`
pub async fn time_series<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<Vec<TimeSeriesPoint>> {
  let filter = params.filter()?;
  success(state.analytics.time_series(&filter).await?)
}

#[derive(Debug, Deserialize)]
pub struct TopParams {
  #[serde(flatten)]
  pub filter: FilterParams,
  #[serde(rename = "type")]
  pub kind:   Option<String>,
  pub limit:  Option<String>,
}

/// `GET /api/analytics/top-performers[?type=store|department&limit=<n>]`
pub async fn top_performers<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<TopParams>,
) -> ApiResult<TopPerformers> {
  let filter = params.filter.filter()?;
  let kind: EntityKind =
    validate::choice(params.kind.as_deref())?.unwrap_or(EntityKind::Store);
  let limit = validate::count("limit", params.limit.as_deref(), 1, state.limits.max_limit)?
    .unwrap_or(TOP_LIMIT);
  success(state.analytics.top_performers(kind, limit, &filter).await?)
}

/// `GET /api/analytics/department-growth[?start_date=..&end_date=..&store_id=..]`
///
/// Without a range, the trailing 30 days up to the latest fact are used.
pub async fn department_growth<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<Vec<DepartmentGrowth>> {
  let filter = params.filter()?;
  success(
    state
      .analytics
      .department_growth(filter.range(), filter.store_id)
      .await?,
  )
}

// ─── Seasonality & correlation ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SeasonalityParams {
  #[serde(flatten)]
  pub filter:    FilterParams,
  pub dimension: Option<String>,
}

/// `GET /api/analytics/seasonality[?dimension=month|weekday]`
pub async fn seasonality<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<SeasonalityParams>,
) -> ApiResult<Vec<SeasonalIndex>> {
  let filter = params.filter.filter()?;
  let dimension: Dimension =
    validate::choice(params.dimension.as_deref())?.unwrap_or_default();
  success(state.analytics.seasonality(&filter, dimension).await?)
}

/// `GET /api/analytics/correlation`
pub async fn correlation<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<Vec<Correlation>> {
  let filter = params.filter()?;
  success(state.analytics.correlations(&filter).await?)
}

// ─── Model fitting ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SegmentParams {
  #[serde(flatten)]
  pub filter: FilterParams,
  pub entity: Option<String>,
  pub k:      Option<String>,
}

/// `GET /api/analytics/segments[?entity=store|department&k=<1..=20>]`
pub async fn segments<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<SegmentParams>,
) -> ApiResult<Segmentation> {
  let filter = params.filter.filter()?;
  let kind: EntityKind =
    validate::choice(params.entity.as_deref())?.unwrap_or(EntityKind::Store);
  let k = validate::count("k", params.k.as_deref(), 1, MAX_CLUSTERS)?;

  let config = state.analytics.config();
  let (seg, timeout) = (config.segmentation(k), config.fit_timeout());
  let inputs = state.analytics.report_inputs(&filter).await?;
  success(run_blocking(timeout, move || inputs.segments(kind, seg)).await?)
}

#[derive(Debug, Deserialize)]
pub struct ForecastParams {
  #[serde(flatten)]
  pub filter:  FilterParams,
  pub periods: Option<String>,
  pub method:  Option<String>,
}

/// `GET /api/analytics/forecast[?periods=<1..=365>&method=holt_winters|arima]`
pub async fn forecast<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<ForecastParams>,
) -> ApiResult<Forecast> {
  let filter = params.filter.filter()?;
  let periods = validate::count("periods", params.periods.as_deref(), 1, MAX_PERIODS)?;
  let method: Option<ForecastMethod> = validate::choice(params.method.as_deref())?;

  let config = state.analytics.config();
  let (fc, timeout) = (config.forecast(periods, method), config.fit_timeout());
  let inputs = state.analytics.report_inputs(&filter).await?;
  success(run_blocking(timeout, move || inputs.forecast(fc)).await?)
}

#[derive(Debug, Deserialize)]
pub struct AnomalyParams {
  #[serde(flatten)]
  pub filter:        FilterParams,
  pub method:        Option<String>,
  pub contamination: Option<String>,
}

/// `GET /api/analytics/anomalies[?method=isolation_forest|zscore|iqr&contamination=<c>]`
pub async fn anomalies<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<AnomalyParams>,
) -> ApiResult<AnomalyReport> {
  let filter = params.filter.filter()?;
  let method: Option<AnomalyMethod> = validate::choice(params.method.as_deref())?;
  let contamination = validate::contamination(params.contamination.as_deref())?;

  let config = state.analytics.config();
  let (ac, timeout) = (config.anomaly(method, contamination), config.fit_timeout());
  let inputs = state.analytics.report_inputs(&filter).await?;
  success(run_blocking(timeout, move || inputs.anomalies(ac)).await?)
}

// ─── Composite report ─────────────────────────────────────────────────────────

/// `GET /api/analytics/report`
///
/// KPIs plus every engine. Each engine section carries its own status; a
/// failing or timed-out section never fails the response.
pub async fn report<S: FactStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<FilterParams>,
) -> ApiResult<Report> {
  let filter = params.filter()?;
  let config = state.analytics.config().clone();
  let timeout = config.fit_timeout();
  let inputs: Arc<ReportInputs> = Arc::new(state.analytics.report_inputs(&filter).await?);

  let seg_inputs = Arc::clone(&inputs);
  let seg_config = config.segmentation(None);
  let fc_inputs = Arc::clone(&inputs);
  let fc_config = config.forecast(None, None);
  let an_inputs = Arc::clone(&inputs);
  let an_config = config.anomaly(None, None);

  let (segments, forecast, anomalies) = tokio::join!(
    run_blocking(timeout, move || seg_inputs.segments(EntityKind::Store, seg_config)),
    run_blocking(timeout, move || fc_inputs.forecast(fc_config)),
    run_blocking(timeout, move || an_inputs.anomalies(an_config)),
  );

  success(Report {
    kpis:         inputs.kpis(),
    seasonality:  Partial::section("seasonality", inputs.seasonality(Dimension::Month)),
    correlations: Partial::section("correlations", inputs.correlations()),
    segments:     Partial::section("segments", segments),
    forecast:     Partial::section("forecast", forecast),
    anomalies:    Partial::section("anomalies", anomalies),
  })
}
