//! Metric engine: KPIs, growth comparisons, and grouped performance tables.
//!
//! Every function here is pure over a slice of facts that the caller has
//! already narrowed with a [`SalesFilter`](crate::filter::SalesFilter). Sums
//! are accumulated at full precision; rounding to two decimals happens only
//! when the result structs are built.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{Department, DeptId, Store, StoreId},
  filter::{DateRange, GroupAggregate},
  sale::SalesFact,
  stats::round2,
};

/// Days subtracted for the year-over-year comparison window.
pub const YEAR_OVER_YEAR_DAYS: i64 = 365;

/// Number of departments listed per store in [`store_performance`].
pub const TOP_DEPARTMENTS: usize = 5;

// ─── Direct aggregates ───────────────────────────────────────────────────────

pub fn total_sales(facts: &[SalesFact]) -> f64 {
  facts.iter().map(|f| f.weekly_sales).sum()
}

/// Mean `weekly_sales`; 0 when there are no facts.
pub fn avg_weekly_sales(facts: &[SalesFact]) -> f64 {
  if facts.is_empty() {
    return 0.0;
  }
  total_sales(facts) / facts.len() as f64
}

pub fn transaction_count(facts: &[SalesFact]) -> u64 { facts.len() as u64 }

/// Percentage change from `previous` to `current`, rounded to two decimals.
///
/// A zero or absent baseline never divides: growth is `100.0` when there are
/// current sales and `0.0` otherwise.
pub fn growth_rate(current: f64, previous: Option<f64>) -> f64 {
  match previous {
    Some(prev) if prev != 0.0 => round2((current - prev) / prev * 100.0),
    _ if current > 0.0 => 100.0,
    _ => 0.0,
  }
}

// ─── Growth ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthKind {
  /// Compared with the equal-length window immediately before.
  PeriodOverPeriod,
  /// Compared with the same window shifted back 365 days.
  YearOverYear,
}

/// Sales totals of two windows and the growth between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Growth {
  pub kind:           GrowthKind,
  pub current:        DateRange,
  pub previous:       DateRange,
  pub current_sales:  f64,
  pub previous_sales: f64,
  pub growth_rate:    f64,
}

/// The comparison window for `current` under `kind`.
pub fn comparison_window(current: DateRange, kind: GrowthKind) -> DateRange {
  match kind {
    GrowthKind::PeriodOverPeriod => current.preceding(),
    GrowthKind::YearOverYear => current.shifted_back(YEAR_OVER_YEAR_DAYS),
  }
}

/// Total the facts falling in each window and compare them. `facts` may
/// contain rows outside both windows; they are ignored.
pub fn compare_windows(
  facts: &[SalesFact],
  current: DateRange,
  previous: DateRange,
  kind: GrowthKind,
) -> Growth {
  let (mut cur, mut prev) = (0.0, 0.0);
  let mut any_previous = false;
  for fact in facts {
    if current.contains(fact.date) {
      cur += fact.weekly_sales;
    }
    if previous.contains(fact.date) {
      prev += fact.weekly_sales;
      any_previous = true;
    }
  }
  Growth {
    kind,
    current,
    previous,
    current_sales: round2(cur),
    previous_sales: round2(prev),
    growth_rate: growth_rate(cur, any_previous.then_some(prev)),
  }
}

/// Growth of `current` over the immediately preceding window of equal
/// duration.
pub fn period_over_period_growth(
  facts: &[SalesFact],
  current: DateRange,
) -> Growth {
  let kind = GrowthKind::PeriodOverPeriod;
  compare_windows(facts, current, comparison_window(current, kind), kind)
}

/// Growth of `current` over the same window 365 days earlier.
pub fn year_over_year_growth(facts: &[SalesFact], current: DateRange) -> Growth {
  let kind = GrowthKind::YearOverYear;
  compare_windows(facts, current, comparison_window(current, kind), kind)
}

// ─── Holiday comparison ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayComparison {
  pub holiday_avg:         f64,
  pub non_holiday_avg:     f64,
  pub difference:          f64,
  /// `difference / non_holiday_avg × 100`; 0 when the non-holiday average
  /// is 0.
  pub percentage_increase: f64,
  pub holiday_count:       u64,
  pub non_holiday_count:   u64,
}

pub fn holiday_vs_non_holiday(facts: &[SalesFact]) -> HolidayComparison {
  let (mut h_sum, mut h_n, mut n_sum, mut n_n) = (0.0, 0u64, 0.0, 0u64);
  for fact in facts {
    if fact.is_holiday {
      h_sum += fact.weekly_sales;
      h_n += 1;
    } else {
      n_sum += fact.weekly_sales;
      n_n += 1;
    }
  }
  let holiday_avg = if h_n > 0 { h_sum / h_n as f64 } else { 0.0 };
  let non_holiday_avg = if n_n > 0 { n_sum / n_n as f64 } else { 0.0 };
  let difference = holiday_avg - non_holiday_avg;
  let percentage_increase = if non_holiday_avg != 0.0 {
    difference / non_holiday_avg * 100.0
  } else {
    0.0
  };
  HolidayComparison {
    holiday_avg:         round2(holiday_avg),
    non_holiday_avg:     round2(non_holiday_avg),
    difference:          round2(difference),
    percentage_increase: round2(percentage_increase),
    holiday_count:       h_n,
    non_holiday_count:   n_n,
  }
}

// ─── Promotion impact ────────────────────────────────────────────────────────

/// Promoted weeks (`markdown > 0`) against unpromoted ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionSplit {
  pub promoted_avg:   f64,
  pub baseline_avg:   f64,
  /// [`growth_rate`] of the promoted average over the baseline average; 0
  /// when nothing was promoted.
  pub uplift_pct:     f64,
  pub promoted_count: u64,
  pub baseline_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentPromotion {
  pub dept_id: DeptId,
  #[serde(flatten)]
  pub split:   PromotionSplit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionImpact {
  #[serde(flatten)]
  pub overall:     PromotionSplit,
  /// One entry per department present in the facts, by id.
  pub departments: Vec<DepartmentPromotion>,
}

#[derive(Default)]
struct SplitAcc {
  promoted: (f64, u64),
  baseline: (f64, u64),
}

impl SplitAcc {
  fn add(&mut self, fact: &SalesFact) {
    let slot = if fact.is_promoted() { &mut self.promoted } else { &mut self.baseline };
    slot.0 += fact.weekly_sales;
    slot.1 += 1;
  }

  fn finish(&self) -> PromotionSplit {
    let avg = |(sum, n): (f64, u64)| (n > 0).then(|| sum / n as f64);
    let promoted = avg(self.promoted);
    let baseline = avg(self.baseline);
    PromotionSplit {
      promoted_avg:   round2(promoted.unwrap_or(0.0)),
      baseline_avg:   round2(baseline.unwrap_or(0.0)),
      uplift_pct:     promoted.map_or(0.0, |p| growth_rate(p, baseline)),
      promoted_count: self.promoted.1,
      baseline_count: self.baseline.1,
    }
  }
}

pub fn promotion_impact(facts: &[SalesFact]) -> PromotionImpact {
  let mut overall = SplitAcc::default();
  let mut by_dept: BTreeMap<DeptId, SplitAcc> = BTreeMap::new();
  for fact in facts {
    overall.add(fact);
    by_dept.entry(fact.dept_id).or_default().add(fact);
  }
  PromotionImpact {
    overall:     overall.finish(),
    departments: by_dept
      .into_iter()
      .map(|(dept_id, acc)| DepartmentPromotion { dept_id, split: acc.finish() })
      .collect(),
  }
}

// ─── Accumulator ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Acc {
  total:  f64,
  count:  u64,
  stores: BTreeSet<StoreId>,
  depts:  BTreeSet<DeptId>,
  months: BTreeSet<(i32, u32)>,
}

impl Acc {
  fn add(&mut self, fact: &SalesFact) {
    self.total += fact.weekly_sales;
    self.count += 1;
    self.stores.insert(fact.store_id);
    self.depts.insert(fact.dept_id);
    self.months.insert((fact.date.year(), fact.date.month()));
  }

  fn avg(&self) -> f64 {
    if self.count == 0 {
      0.0
    } else {
      self.total / self.count as f64
    }
  }
}

/// Rank by total descending, then by id ascending.
fn by_total_then_id<K: Ord>(a: (&K, f64), b: (&K, f64)) -> std::cmp::Ordering {
  b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

// ─── Store performance ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentSales {
  pub dept_id:     DeptId,
  pub dept_name:   String,
  pub total_sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePerformance {
  pub store_id:          StoreId,
  pub store_name:        String,
  pub store_type:        String,
  pub dept_count:        u64,
  pub total_sales:       f64,
  pub avg_sales:         f64,
  pub transaction_count: u64,
  /// At most [`TOP_DEPARTMENTS`], by sales descending then id ascending.
  pub top_departments:   Vec<DepartmentSales>,
}

/// Per-store totals joined with each store's best departments. Stores with
/// no facts are omitted; the rest are ordered by id.
pub fn store_performance(
  facts: &[SalesFact],
  stores: &[Store],
  departments: &[Department],
) -> Vec<StorePerformance> {
  let mut per_store: BTreeMap<StoreId, Acc> = BTreeMap::new();
  let mut per_pair: HashMap<(StoreId, DeptId), f64> = HashMap::new();
  for fact in facts {
    per_store.entry(fact.store_id).or_default().add(fact);
    *per_pair.entry((fact.store_id, fact.dept_id)).or_default() +=
      fact.weekly_sales;
  }

  let store_by_id: HashMap<StoreId, &Store> =
    stores.iter().map(|s| (s.store_id, s)).collect();
  let dept_name: HashMap<DeptId, &str> = departments
    .iter()
    .map(|d| (d.dept_id, d.name.as_str()))
    .collect();

  per_store
    .into_iter()
    .map(|(store_id, acc)| {
      let mut depts: Vec<(DeptId, f64)> = per_pair
        .iter()
        .filter(|((s, _), _)| *s == store_id)
        .map(|((_, d), total)| (*d, *total))
        .collect();
      depts.sort_by(|a, b| by_total_then_id((&a.0, a.1), (&b.0, b.1)));
      depts.truncate(TOP_DEPARTMENTS);

      let store = store_by_id.get(&store_id);
      StorePerformance {
        store_id,
        store_name: store.map(|s| s.name.clone()).unwrap_or_default(),
        store_type: store.map(|s| s.store_type.clone()).unwrap_or_default(),
        dept_count: acc.depts.len() as u64,
        total_sales: round2(acc.total),
        avg_sales: round2(acc.avg()),
        transaction_count: acc.count,
        top_departments: depts
          .into_iter()
          .map(|(dept_id, total)| DepartmentSales {
            dept_id,
            dept_name: dept_name.get(&dept_id).unwrap_or(&"").to_string(),
            total_sales: round2(total),
          })
          .collect(),
      }
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreTypePerformance {
  pub store_type:        String,
  pub store_count:       u64,
  pub dept_count:        u64,
  pub total_sales:       f64,
  pub avg_sales:         f64,
  pub transaction_count: u64,
}

/// Totals per store format, ordered by format name.
pub fn store_type_performance(
  facts: &[SalesFact],
  stores: &[Store],
) -> Vec<StoreTypePerformance> {
  let type_of: HashMap<StoreId, &str> = stores
    .iter()
    .map(|s| (s.store_id, s.store_type.as_str()))
    .collect();
  let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
  for fact in facts {
    let ty = type_of.get(&fact.store_id).copied().unwrap_or_default();
    groups.entry(ty).or_default().add(fact);
  }
  groups
    .into_iter()
    .map(|(ty, acc)| StoreTypePerformance {
      store_type:        ty.to_string(),
      store_count:       acc.stores.len() as u64,
      dept_count:        acc.depts.len() as u64,
      total_sales:       round2(acc.total),
      avg_sales:         round2(acc.avg()),
      transaction_count: acc.count,
    })
    .collect()
}

// ─── Time series ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
  pub date:              NaiveDate,
  pub total_sales:       f64,
  pub store_count:       u64,
  pub transaction_count: u64,
  pub avg_sale:          f64,
}

/// One point per distinct date, in date order.
pub fn time_series(facts: &[SalesFact]) -> Vec<TimeSeriesPoint> {
  let mut days: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
  for fact in facts {
    days.entry(fact.date).or_default().add(fact);
  }
  days
    .into_iter()
    .map(|(date, acc)| TimeSeriesPoint {
      date,
      total_sales: round2(acc.total),
      store_count: acc.stores.len() as u64,
      transaction_count: acc.count,
      avg_sale: round2(acc.avg()),
    })
    .collect()
}

// ─── Top performers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePerformer {
  pub store_id:    StoreId,
  pub store_name:  String,
  pub region:      String,
  #[serde(rename = "type")]
  pub store_type:  String,
  pub total_sales: f64,
  pub avg_sales:   f64,
  pub dept_count:  u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentPerformer {
  pub dept_id:     DeptId,
  pub dept_name:   String,
  pub category:    String,
  pub total_sales: f64,
  pub avg_sales:   f64,
  pub store_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopPerformers {
  Stores(Vec<StorePerformer>),
  Departments(Vec<DepartmentPerformer>),
}

impl TopPerformers {
  pub fn len(&self) -> usize {
    match self {
      Self::Stores(v) => v.len(),
      Self::Departments(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Stores ranked by total sales, best first, at most `limit`.
pub fn top_stores(
  facts: &[SalesFact],
  stores: &[Store],
  limit: usize,
) -> Vec<StorePerformer> {
  let mut groups: HashMap<StoreId, Acc> = HashMap::new();
  for fact in facts {
    groups.entry(fact.store_id).or_default().add(fact);
  }
  let mut ranked: Vec<(StoreId, Acc)> = groups.into_iter().collect();
  ranked.sort_by(|a, b| by_total_then_id((&a.0, a.1.total), (&b.0, b.1.total)));
  ranked.truncate(limit);

  let by_id: HashMap<StoreId, &Store> =
    stores.iter().map(|s| (s.store_id, s)).collect();
  ranked
    .into_iter()
    .map(|(store_id, acc)| {
      let store = by_id.get(&store_id);
      StorePerformer {
        store_id,
        store_name: store.map(|s| s.name.clone()).unwrap_or_default(),
        region: store.map(|s| s.region.clone()).unwrap_or_default(),
        store_type: store.map(|s| s.store_type.clone()).unwrap_or_default(),
        total_sales: round2(acc.total),
        avg_sales: round2(acc.avg()),
        dept_count: acc.depts.len() as u64,
      }
    })
    .collect()
}

/// Departments ranked by total sales, best first, at most `limit`.
pub fn top_departments(
  facts: &[SalesFact],
  departments: &[Department],
  limit: usize,
) -> Vec<DepartmentPerformer> {
  let mut groups: HashMap<DeptId, Acc> = HashMap::new();
  for fact in facts {
    groups.entry(fact.dept_id).or_default().add(fact);
  }
  let mut ranked: Vec<(DeptId, Acc)> = groups.into_iter().collect();
  ranked.sort_by(|a, b| by_total_then_id((&a.0, a.1.total), (&b.0, b.1.total)));
  ranked.truncate(limit);

  let by_id: HashMap<DeptId, &Department> =
    departments.iter().map(|d| (d.dept_id, d)).collect();
  ranked
    .into_iter()
    .map(|(dept_id, acc)| {
      let dept = by_id.get(&dept_id);
      DepartmentPerformer {
        dept_id,
        dept_name: dept.map(|d| d.name.clone()).unwrap_or_default(),
        category: dept.map(|d| d.category.clone()).unwrap_or_default(),
        total_sales: round2(acc.total),
        avg_sales: round2(acc.avg()),
        store_count: acc.stores.len() as u64,
      }
    })
    .collect()
}

// ─── Department growth ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentGrowth {
  pub dept_id:           DeptId,
  pub name:              String,
  pub category:          String,
  /// Distinct stores selling the department across both windows.
  pub store_presence:    u64,
  /// Sales in the current window.
  pub total_sales:       f64,
  pub previous_sales:    f64,
  /// Mean weekly sales across both windows.
  pub avg_sales:         f64,
  /// Distinct calendar months with sales across both windows.
  pub months_active:     u64,
  pub sales_growth_rate: f64,
}

/// Current-versus-preceding-window growth per department. `facts` should
/// cover `current.preceding()` through `current.end`; rows outside that span
/// are ignored. Ordered by current sales descending, then id.
pub fn department_growth(
  facts: &[SalesFact],
  current: DateRange,
  departments: &[Department],
) -> Vec<DepartmentGrowth> {
  let previous = current.preceding();
  let span = previous.span(&current);

  #[derive(Default)]
  struct Windows {
    overall:       Acc,
    current:       f64,
    previous:      f64,
    seen_previous: bool,
  }

  let mut groups: HashMap<DeptId, Windows> = HashMap::new();
  for fact in facts.iter().filter(|f| span.contains(f.date)) {
    let w = groups.entry(fact.dept_id).or_default();
    w.overall.add(fact);
    if current.contains(fact.date) {
      w.current += fact.weekly_sales;
    } else {
      w.previous += fact.weekly_sales;
      w.seen_previous = true;
    }
  }

  let by_id: HashMap<DeptId, &Department> =
    departments.iter().map(|d| (d.dept_id, d)).collect();
  let mut rows: Vec<(DeptId, Windows)> = groups.into_iter().collect();
  rows.sort_by(|a, b| by_total_then_id((&a.0, a.1.current), (&b.0, b.1.current)));
  rows
    .into_iter()
    .map(|(dept_id, w)| {
      let dept = by_id.get(&dept_id);
      DepartmentGrowth {
        dept_id,
        name: dept.map(|d| d.name.clone()).unwrap_or_default(),
        category: dept.map(|d| d.category.clone()).unwrap_or_default(),
        store_presence: w.overall.stores.len() as u64,
        total_sales: round2(w.current),
        previous_sales: round2(w.previous),
        avg_sales: round2(w.overall.avg()),
        months_active: w.overall.months.len() as u64,
        sales_growth_rate: growth_rate(
          w.current,
          w.seen_previous.then_some(w.previous),
        ),
      }
    })
    .collect()
}

// ─── KPIs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
  pub total_sales:              f64,
  pub avg_weekly_sales:         f64,
  pub transaction_count:        u64,
  /// Distinct stores among the matching facts.
  pub store_count:              u64,
  /// Distinct departments among the matching facts.
  pub dept_count:               u64,
  /// Mean markdown over facts that carried one.
  pub avg_markdown:             f64,
  pub holiday_sales_percentage: f64,
  /// Present only when a full date range was requested.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub prev_period_sales:        Option<f64>,
  /// Period-over-period growth; present only with `prev_period_sales`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sales_growth:             Option<f64>,
}

/// Headline figures for `current`. Pass the facts of the preceding
/// equal-length window as `previous` to include growth.
pub fn kpis(current: &[SalesFact], previous: Option<&[SalesFact]>) -> Kpis {
  let mut acc = Acc::default();
  let (mut md_sum, mut md_n, mut holiday) = (0.0, 0u64, 0.0);
  for fact in current {
    acc.add(fact);
    if fact.markdown > 0.0 {
      md_sum += fact.markdown;
      md_n += 1;
    }
    if fact.is_holiday {
      holiday += fact.weekly_sales;
    }
  }

  let holiday_sales_percentage = if acc.total > 0.0 {
    holiday / acc.total * 100.0
  } else {
    0.0
  };
  let prev_total = previous.map(total_sales);

  Kpis {
    total_sales: round2(acc.total),
    avg_weekly_sales: round2(acc.avg()),
    transaction_count: acc.count,
    store_count: acc.stores.len() as u64,
    dept_count: acc.depts.len() as u64,
    avg_markdown: if md_n > 0 { round2(md_sum / md_n as f64) } else { 0.0 },
    holiday_sales_percentage: round2(holiday_sales_percentage),
    prev_period_sales: prev_total.map(round2),
    sales_growth: previous.map(|p| {
      growth_rate(acc.total, (!p.is_empty()).then(|| total_sales(p)))
    }),
  }
}

// ─── Sales summaries ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesMetrics {
  pub total_transactions: u64,
  pub total_sales:        f64,
  pub avg_sale:           f64,
  pub holiday_sales:      f64,
}

pub fn sales_metrics(facts: &[SalesFact]) -> SalesMetrics {
  let holiday: f64 = facts
    .iter()
    .filter(|f| f.is_holiday)
    .map(|f| f.weekly_sales)
    .sum();
  SalesMetrics {
    total_transactions: transaction_count(facts),
    total_sales:        round2(total_sales(facts)),
    avg_sale:           round2(avg_weekly_sales(facts)),
    holiday_sales:      round2(holiday),
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentSummary {
  pub window:             DateRange,
  pub min_sales:          f64,
  pub max_sales:          f64,
  pub average_sales:      f64,
  pub total_transactions: u64,
  pub holiday_sales:      HolidayComparison,
}

/// Spread of individual sales inside `window`; all zeros when empty.
pub fn recent_summary(facts: &[SalesFact], window: DateRange) -> RecentSummary {
  let in_window: Vec<SalesFact> = facts
    .iter()
    .filter(|f| window.contains(f.date))
    .cloned()
    .collect();
  let min = in_window
    .iter()
    .map(|f| f.weekly_sales)
    .min_by(f64::total_cmp)
    .unwrap_or(0.0);
  let max = in_window
    .iter()
    .map(|f| f.weekly_sales)
    .max_by(f64::total_cmp)
    .unwrap_or(0.0);
  RecentSummary {
    window,
    min_sales: round2(min),
    max_sales: round2(max),
    average_sales: round2(avg_weekly_sales(&in_window)),
    total_transactions: transaction_count(&in_window),
    holiday_sales: holiday_vs_non_holiday(&in_window),
  }
}

// ─── Grouped breakdowns ──────────────────────────────────────────────────────

/// One slice of a dashboard breakdown (category or region).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
  pub name:        String,
  pub total_sales: f64,
}

/// Order groups by sales descending (ties by name) and round them.
pub fn breakdown(groups: Vec<GroupAggregate>) -> Vec<Breakdown> {
  let mut out: Vec<Breakdown> = groups
    .into_iter()
    .map(|g| Breakdown { name: g.key, total_sales: g.total_sales })
    .collect();
  out.sort_by(|a, b| {
    b.total_sales
      .total_cmp(&a.total_sales)
      .then_with(|| a.name.cmp(&b.name))
  });
  for entry in &mut out {
    entry.total_sales = round2(entry.total_sales);
  }
  out
}

/// Round the monetary fields of grouped aggregates for output.
pub fn rounded(groups: Vec<GroupAggregate>) -> Vec<GroupAggregate> {
  groups
    .into_iter()
    .map(|g| GroupAggregate {
      total_sales: round2(g.total_sales),
      avg_sales: round2(g.avg_sales),
      ..g
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn fact(store: i64, dept: i64, date: NaiveDate, sales: f64) -> SalesFact {
    SalesFact {
      sale_id: 0,
      store_id: store,
      dept_id: dept,
      date,
      weekly_sales: sales,
      is_holiday: false,
      temperature: 0.0,
      fuel_price: 0.0,
      markdown: 0.0,
      cpi: 0.0,
      unemployment: 0.0,
    }
  }

  fn stores() -> Vec<Store> {
    (1..=2)
      .map(|id| Store {
        store_id:   id,
        name:       format!("Store {id}"),
        region:     if id == 1 { "North" } else { "South" }.into(),
        size_sqft:  100_000,
        store_type: if id == 1 { "Supercenter" } else { "Discount" }.into(),
      })
      .collect()
  }

  fn departments() -> Vec<Department> {
    (1..=7)
      .map(|id| Department {
        dept_id:  id,
        name:     format!("Dept {id}"),
        category: "General".into(),
      })
      .collect()
  }

  #[test]
  fn growth_rate_edge_cases() {
    assert_eq!(growth_rate(50.0, Some(0.0)), 100.0);
    assert_eq!(growth_rate(50.0, None), 100.0);
    assert_eq!(growth_rate(0.0, Some(0.0)), 0.0);
    assert_eq!(growth_rate(0.0, None), 0.0);
    assert_eq!(growth_rate(150.0, Some(100.0)), 50.0);
    assert_eq!(growth_rate(1.0, Some(3.0)), -66.67);
  }

  #[test]
  fn total_sales_ignores_row_order() {
    let mut facts = vec![
      fact(1, 1, d(2024, 1, 5), 10.25),
      fact(1, 2, d(2024, 1, 12), 20.5),
      fact(2, 1, d(2024, 1, 19), 30.75),
    ];
    let forward = total_sales(&facts);
    facts.reverse();
    assert_eq!(forward, total_sales(&facts));
    assert_eq!(forward, 61.5);
  }

  #[test]
  fn period_over_period_uses_equal_duration_window() {
    let current = DateRange::new(d(2024, 1, 15), d(2024, 1, 28)).unwrap();
    let facts = vec![
      fact(1, 1, d(2024, 1, 1), 100.0),
      fact(1, 1, d(2024, 1, 14), 100.0),
      fact(1, 1, d(2024, 1, 20), 300.0),
      // Outside both windows.
      fact(1, 1, d(2023, 12, 31), 1_000.0),
    ];
    let g = period_over_period_growth(&facts, current);
    assert_eq!(g.previous, DateRange::new(d(2024, 1, 1), d(2024, 1, 14)).unwrap());
    assert_eq!(g.previous_sales, 200.0);
    assert_eq!(g.current_sales, 300.0);
    assert_eq!(g.growth_rate, 50.0);
  }

  #[test]
  fn period_over_period_is_scale_invariant() {
    let current = DateRange::new(d(2024, 2, 1), d(2024, 2, 29)).unwrap();
    let base = vec![
      fact(1, 1, d(2024, 1, 10), 123.45),
      fact(1, 1, d(2024, 2, 10), 456.78),
      fact(2, 1, d(2024, 2, 20), 9.99),
    ];
    let scaled: Vec<SalesFact> = base
      .iter()
      .map(|f| SalesFact { weekly_sales: f.weekly_sales * 37.0, ..f.clone() })
      .collect();
    assert_eq!(
      period_over_period_growth(&base, current).growth_rate,
      period_over_period_growth(&scaled, current).growth_rate,
    );
  }

  #[test]
  fn year_over_year_shifts_by_365_days() {
    let current = DateRange::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
    let facts = vec![
      fact(1, 1, d(2023, 3, 10), 80.0),
      fact(1, 1, d(2024, 3, 10), 100.0),
    ];
    let g = year_over_year_growth(&facts, current);
    assert_eq!(g.kind, GrowthKind::YearOverYear);
    assert_eq!(g.previous.start, d(2023, 3, 2));
    assert_eq!(g.growth_rate, 25.0);
  }

  #[test]
  fn growth_with_empty_previous_is_exactly_100() {
    let current = DateRange::new(d(2024, 3, 1), d(2024, 3, 7)).unwrap();
    let facts = vec![fact(1, 1, d(2024, 3, 2), 5.0)];
    assert_eq!(period_over_period_growth(&facts, current).growth_rate, 100.0);
    assert_eq!(period_over_period_growth(&[], current).growth_rate, 0.0);
  }

  #[test]
  fn holiday_uplift_is_zero_without_baseline() {
    let mut f = fact(1, 1, d(2024, 12, 27), 200.0);
    f.is_holiday = true;
    let cmp = holiday_vs_non_holiday(&[f.clone()]);
    assert_eq!(cmp.holiday_avg, 200.0);
    assert_eq!(cmp.percentage_increase, 0.0);

    let cmp = holiday_vs_non_holiday(&[f, fact(1, 1, d(2024, 12, 6), 100.0)]);
    assert_eq!(cmp.difference, 100.0);
    assert_eq!(cmp.percentage_increase, 100.0);
  }

  fn promoted(store: i64, dept: i64, date: NaiveDate, sales: f64) -> SalesFact {
    let mut f = fact(store, dept, date, sales);
    f.markdown = 15.0;
    f
  }

  #[test]
  fn promotion_uplift_overall_and_per_department() {
    let facts = vec![
      fact(1, 1, d(2024, 3, 1), 100.0),
      fact(2, 1, d(2024, 3, 1), 100.0),
      promoted(1, 1, d(2024, 3, 8), 150.0),
      fact(1, 2, d(2024, 3, 1), 200.0),
      promoted(1, 2, d(2024, 3, 8), 300.0),
    ];
    let impact = promotion_impact(&facts);
    assert_eq!(impact.overall.promoted_avg, 225.0);
    assert_eq!(impact.overall.baseline_avg, 133.33);
    assert_eq!(impact.overall.uplift_pct, 68.75);
    assert_eq!(impact.overall.promoted_count, 2);
    assert_eq!(impact.overall.baseline_count, 3);

    let depts: Vec<(i64, f64)> =
      impact.departments.iter().map(|d| (d.dept_id, d.split.uplift_pct)).collect();
    assert_eq!(depts, vec![(1, 50.0), (2, 50.0)]);
  }

  #[test]
  fn promotion_uplift_without_promoted_weeks_is_zero() {
    let facts = vec![fact(1, 1, d(2024, 3, 1), 100.0), fact(1, 1, d(2024, 3, 8), 80.0)];
    let impact = promotion_impact(&facts);
    assert_eq!(impact.overall.promoted_count, 0);
    assert_eq!(impact.overall.promoted_avg, 0.0);
    assert_eq!(impact.overall.baseline_avg, 90.0);
    assert_eq!(impact.overall.uplift_pct, 0.0);
  }

  #[test]
  fn promotion_uplift_without_baseline_is_100() {
    let impact = promotion_impact(&[promoted(1, 3, d(2024, 3, 1), 40.0)]);
    assert_eq!(impact.overall.baseline_count, 0);
    assert_eq!(impact.overall.uplift_pct, 100.0);
    assert_eq!(impact.departments.len(), 1);
    assert_eq!(impact.departments[0].split.uplift_pct, 100.0);

    let empty = promotion_impact(&[]);
    assert_eq!(empty.overall.uplift_pct, 0.0);
    assert!(empty.departments.is_empty());
  }

  #[test]
  fn top_departments_break_ties_by_id() {
    let date = d(2024, 4, 5);
    let facts: Vec<SalesFact> = vec![
      fact(1, 7, date, 50.0),
      fact(1, 3, date, 50.0),
      fact(1, 5, date, 50.0),
      fact(1, 1, date, 10.0),
      fact(1, 2, date, 90.0),
      fact(1, 6, date, 50.0),
      fact(1, 4, date, 5.0),
    ];
    let perf = store_performance(&facts, &stores(), &departments());
    assert_eq!(perf.len(), 1);
    let ids: Vec<DeptId> =
      perf[0].top_departments.iter().map(|d| d.dept_id).collect();
    assert_eq!(ids, vec![2, 3, 5, 6, 7]);
    assert_eq!(perf[0].dept_count, 7);
    assert_eq!(perf[0].transaction_count, 7);
  }

  #[test]
  fn top_stores_rank_by_total() {
    let date = d(2024, 4, 5);
    let facts = vec![
      fact(1, 1, date, 10.0),
      fact(2, 1, date, 30.0),
      fact(2, 2, date, 30.0),
    ];
    let top = top_stores(&facts, &stores(), 1);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].store_id, 2);
    assert_eq!(top[0].total_sales, 60.0);
    assert_eq!(top[0].dept_count, 2);
    assert_eq!(top[0].store_type, "Discount");
  }

  #[test]
  fn store_types_group_by_format() {
    let date = d(2024, 4, 5);
    let facts = vec![fact(1, 1, date, 10.0), fact(2, 1, date, 30.0)];
    let types = store_type_performance(&facts, &stores());
    assert_eq!(types.len(), 2);
    assert_eq!(types[0].store_type, "Discount");
    assert_eq!(types[0].total_sales, 30.0);
  }

  #[test]
  fn department_growth_compares_windows() {
    let current = DateRange::new(d(2024, 2, 1), d(2024, 2, 29)).unwrap();
    let facts = vec![
      fact(1, 1, d(2024, 1, 15), 100.0),
      fact(2, 1, d(2024, 2, 15), 150.0),
      fact(1, 2, d(2024, 2, 16), 40.0),
    ];
    let rows = department_growth(&facts, current, &departments());
    assert_eq!(rows[0].dept_id, 1);
    assert_eq!(rows[0].sales_growth_rate, 50.0);
    assert_eq!(rows[0].store_presence, 2);
    assert_eq!(rows[0].months_active, 2);
    assert_eq!(rows[1].dept_id, 2);
    assert_eq!(rows[1].sales_growth_rate, 100.0);
  }

  #[test]
  fn kpis_count_distinct_entities() {
    let mut marked = fact(1, 2, d(2024, 1, 12), 40.0);
    marked.markdown = 20.0;
    marked.is_holiday = true;
    let facts = vec![
      fact(1, 1, d(2024, 1, 5), 60.0),
      fact(2, 1, d(2024, 1, 5), 100.0),
      marked,
    ];
    let k = kpis(&facts, None);
    assert_eq!(k.total_sales, 200.0);
    assert_eq!(k.store_count, 2);
    assert_eq!(k.dept_count, 2);
    assert_eq!(k.avg_markdown, 20.0);
    assert_eq!(k.holiday_sales_percentage, 20.0);
    assert_eq!(k.sales_growth, None);

    let prev = vec![fact(1, 1, d(2023, 12, 29), 100.0)];
    let k = kpis(&facts, Some(&prev));
    assert_eq!(k.prev_period_sales, Some(100.0));
    assert_eq!(k.sales_growth, Some(100.0));
  }

  #[test]
  fn recent_summary_only_counts_window() {
    let window = DateRange::trailing(d(2024, 3, 31), 30);
    let facts = vec![
      fact(1, 1, d(2024, 1, 1), 999.0),
      fact(1, 1, d(2024, 3, 10), 10.0),
      fact(1, 1, d(2024, 3, 17), 30.0),
    ];
    let s = recent_summary(&facts, window);
    assert_eq!(s.total_transactions, 2);
    assert_eq!(s.min_sales, 10.0);
    assert_eq!(s.max_sales, 30.0);
    assert_eq!(s.average_sales, 20.0);
  }

  #[test]
  fn breakdown_orders_by_sales() {
    let groups = vec![
      GroupAggregate {
        key:            "Food".into(),
        id:             None,
        total_sales:    10.004,
        avg_sales:      1.0,
        record_count:   1,
        distinct_weeks: 1,
      },
      GroupAggregate {
        key:            "Apparel".into(),
        id:             None,
        total_sales:    20.0,
        avg_sales:      2.0,
        record_count:   1,
        distinct_weeks: 1,
      },
    ];
    let out = breakdown(groups);
    assert_eq!(out[0].name, "Apparel");
    assert_eq!(out[1].total_sales, 10.0);
  }
}
