//! `Analytics`: the operations exposed over HTTP and the CLI, composed from
//! a [`FactStore`] and the pure engines.
//!
//! Each operation validates referenced ids, fetches exactly the facts it
//! needs through one filter, and hands them to an engine. Backend failures
//! are boxed into [`Error::Store`].

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::{
  accessor::FactStore,
  config::AnalyticsConfig,
  correlation::Correlation,
  entity::{Department, DeptId, EntityKind, Store, StoreId},
  error::{Error, Result},
  filter::{DateRange, GroupAggregate, GroupKey, SalesFilter},
  metrics::{
    self, Breakdown, DepartmentGrowth, Growth, GrowthKind, HolidayComparison,
    Kpis, PromotionImpact, RecentSummary, SalesMetrics, StorePerformance,
    StoreTypePerformance, TimeSeriesPoint, TopPerformers,
  },
  report::ReportInputs,
  sale::{Dataset, SaleRow, SalesFact},
  seasonality::{Dimension, SeasonalIndex, seasonality_index},
};

/// Trailing window used by department growth when no range is given.
pub const DEFAULT_GROWTH_DAYS: i64 = 30;

pub struct Analytics<S> {
  store:  Arc<S>,
  config: AnalyticsConfig,
}

impl<S> Clone for Analytics<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), config: self.config.clone() }
  }
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Store(Box::new(e))
}

impl<S: FactStore> Analytics<S> {
  pub fn new(store: Arc<S>, config: AnalyticsConfig) -> Self {
    Self { store, config }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &AnalyticsConfig { &self.config }

  // ── Reference data ────────────────────────────────────────────────────

  pub async fn list_stores(&self) -> Result<Vec<Store>> {
    self.store.list_stores().await.map_err(store_err)
  }

  pub async fn get_store(&self, id: StoreId) -> Result<Store> {
    self
      .store
      .get_store(id)
      .await
      .map_err(store_err)?
      .ok_or(Error::StoreNotFound(id))
  }

  pub async fn list_departments(&self) -> Result<Vec<Department>> {
    self.store.list_departments().await.map_err(store_err)
  }

  pub async fn get_department(&self, id: DeptId) -> Result<Department> {
    self
      .store
      .get_department(id)
      .await
      .map_err(store_err)?
      .ok_or(Error::DepartmentNotFound(id))
  }

  /// Reject filters naming a store or department that does not exist.
  async fn check_filter(&self, filter: &SalesFilter) -> Result<()> {
    if let Some(id) = filter.store_id {
      self.get_store(id).await?;
    }
    if let Some(id) = filter.dept_id {
      self.get_department(id).await?;
    }
    Ok(())
  }

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Facts matching `filter` after checking its ids.
  pub async fn facts(&self, filter: &SalesFilter) -> Result<Vec<SalesFact>> {
    self.check_filter(filter).await?;
    self.fetch(filter.clone()).await
  }

  async fn fetch(&self, filter: SalesFilter) -> Result<Vec<SalesFact>> {
    self.store.facts(filter).await.map_err(store_err)
  }

  async fn latest_date(&self, filter: &SalesFilter) -> Result<Option<NaiveDate>> {
    let bounds = self
      .store
      .date_bounds(filter.clone())
      .await
      .map_err(store_err)?;
    Ok(bounds.map(|b| b.end))
  }

  pub async fn list_sales(
    &self,
    filter: &SalesFilter,
    limit: usize,
  ) -> Result<Vec<SaleRow>> {
    self.check_filter(filter).await?;
    self
      .store
      .list_sales(filter.clone(), limit)
      .await
      .map_err(store_err)
  }

  /// Grouped totals, rounded for output.
  pub async fn summary(
    &self,
    filter: &SalesFilter,
    key: GroupKey,
  ) -> Result<Vec<GroupAggregate>> {
    self.check_filter(filter).await?;
    let groups = self
      .store
      .aggregate(filter.clone(), key)
      .await
      .map_err(store_err)?;
    Ok(metrics::rounded(groups))
  }

  /// Dashboard slice by category or region.
  pub async fn breakdown(
    &self,
    filter: &SalesFilter,
    key: GroupKey,
  ) -> Result<Vec<Breakdown>> {
    self.check_filter(filter).await?;
    let groups = self
      .store
      .aggregate(filter.clone(), key)
      .await
      .map_err(store_err)?;
    Ok(metrics::breakdown(groups))
  }

  pub async fn bulk_load(&self, dataset: Dataset) -> Result<usize> {
    dataset.validate()?;
    self.store.bulk_load(dataset).await.map_err(store_err)
  }

  // ── Metrics ───────────────────────────────────────────────────────────

  /// Headline figures; with a full date range the preceding equal-length
  /// window is fetched too and growth is included.
  pub async fn kpis(&self, filter: &SalesFilter) -> Result<Kpis> {
    let current = self.facts(filter).await?;
    let previous = match filter.range() {
      Some(range) => Some(self.fetch(filter.with_range(range.preceding())).await?),
      None => None,
    };
    Ok(metrics::kpis(&current, previous.as_deref()))
  }

  pub async fn growth(
    &self,
    filter: &SalesFilter,
    current: DateRange,
    kind: GrowthKind,
  ) -> Result<Growth> {
    self.check_filter(filter).await?;
    let previous = metrics::comparison_window(current, kind);
    let facts = self.fetch(filter.with_range(previous.span(&current))).await?;
    Ok(metrics::compare_windows(&facts, current, previous, kind))
  }

  pub async fn holiday(&self, filter: &SalesFilter) -> Result<HolidayComparison> {
    let facts = self.facts(filter).await?;
    Ok(metrics::holiday_vs_non_holiday(&facts))
  }

  pub async fn promotion_impact(&self, filter: &SalesFilter) -> Result<PromotionImpact> {
    let facts = self.facts(filter).await?;
    Ok(metrics::promotion_impact(&facts))
  }

  pub async fn store_performance(
    &self,
    year: i32,
    filter: &SalesFilter,
  ) -> Result<Vec<StorePerformance>> {
    let filter = filter.with_range(DateRange::year(year)?);
    let facts = self.facts(&filter).await?;
    let stores = self.list_stores().await?;
    let departments = self.list_departments().await?;
    Ok(metrics::store_performance(&facts, &stores, &departments))
  }

  pub async fn store_type_performance(
    &self,
    year: Option<i32>,
  ) -> Result<Vec<StoreTypePerformance>> {
    let filter = match year {
      Some(y) => SalesFilter::new().within(DateRange::year(y)?),
      None => SalesFilter::new(),
    };
    let facts = self.fetch(filter).await?;
    let stores = self.list_stores().await?;
    Ok(metrics::store_type_performance(&facts, &stores))
  }

  pub async fn time_series(&self, filter: &SalesFilter) -> Result<Vec<TimeSeriesPoint>> {
    let facts = self.facts(filter).await?;
    Ok(metrics::time_series(&facts))
  }

  pub async fn top_performers(
    &self,
    kind: EntityKind,
    limit: usize,
    filter: &SalesFilter,
  ) -> Result<TopPerformers> {
    let facts = self.facts(filter).await?;
    Ok(match kind {
      EntityKind::Store => {
        let stores = self.list_stores().await?;
        TopPerformers::Stores(metrics::top_stores(&facts, &stores, limit))
      }
      EntityKind::Department => {
        let departments = self.list_departments().await?;
        TopPerformers::Departments(metrics::top_departments(
          &facts,
          &departments,
          limit,
        ))
      }
    })
  }

  /// Per-department growth over `range` (default: the trailing
  /// [`DEFAULT_GROWTH_DAYS`] days up to the latest fact).
  pub async fn department_growth(
    &self,
    range: Option<DateRange>,
    store_id: Option<StoreId>,
  ) -> Result<Vec<DepartmentGrowth>> {
    let mut filter = SalesFilter::new();
    if let Some(id) = store_id {
      filter = filter.store(id);
    }
    self.check_filter(&filter).await?;
    let current = match range {
      Some(range) => range,
      None => match self.latest_date(&filter).await? {
        Some(end) => DateRange::trailing(end, DEFAULT_GROWTH_DAYS),
        None => return Ok(Vec::new()),
      },
    };
    let facts = self
      .fetch(filter.with_range(current.preceding().span(&current)))
      .await?;
    let departments = self.list_departments().await?;
    Ok(metrics::department_growth(&facts, current, &departments))
  }

  pub async fn sales_metrics(&self, filter: &SalesFilter) -> Result<SalesMetrics> {
    let facts = self.facts(filter).await?;
    Ok(metrics::sales_metrics(&facts))
  }

  /// Summary of the trailing `days` days ending at `as_of`, which defaults
  /// to the latest fact date (or today on an empty store).
  pub async fn recent_summary(
    &self,
    as_of: Option<NaiveDate>,
    days: i64,
  ) -> Result<RecentSummary> {
    let end = match as_of {
      Some(date) => date,
      None => self
        .latest_date(&SalesFilter::new())
        .await?
        .unwrap_or_else(|| Utc::now().date_naive()),
    };
    let window = DateRange::trailing(end, days);
    let facts = self.fetch(SalesFilter::new().within(window)).await?;
    Ok(metrics::recent_summary(&facts, window))
  }

  // ── Analysis ──────────────────────────────────────────────────────────

  pub async fn seasonality(
    &self,
    filter: &SalesFilter,
    dimension: Dimension,
  ) -> Result<Vec<SeasonalIndex>> {
    let facts = self.facts(filter).await?;
    Ok(seasonality_index(&facts, dimension))
  }

  pub async fn correlations(&self, filter: &SalesFilter) -> Result<Vec<Correlation>> {
    let inputs = self.report_inputs(filter).await?;
    Ok(inputs.correlations()?)
  }

  /// Everything the engines need for `filter`, fetched in one go. The
  /// previous window is only fetched when the filter has a full range.
  pub async fn report_inputs(&self, filter: &SalesFilter) -> Result<ReportInputs> {
    let facts = self.facts(filter).await?;
    let range = filter.range();
    let previous = match range {
      Some(range) => Some(self.fetch(filter.with_range(range.preceding())).await?),
      None => None,
    };
    Ok(ReportInputs {
      facts,
      stores: self.list_stores().await?,
      departments: self.list_departments().await?,
      range,
      previous,
    })
  }
}
