//! Typed filter predicate shared by every accessor query and engine.
//!
//! A [`SalesFilter`] is built once at the input boundary and handed down
//! unchanged; the SQLite backend translates it into a single parametrised
//! `WHERE` clause and [`SalesFilter::matches`] applies the same predicate in
//! memory.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  entity::{DeptId, StoreId},
  sale::SalesFact,
};

// ─── DateRange ───────────────────────────────────────────────────────────────

/// An inclusive calendar-date window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
    if start > end {
      return Err(Error::validation(format!(
        "start_date {start} must not be after end_date {end}"
      )));
    }
    Ok(Self { start, end })
  }

  /// January 1st through December 31st of `year`.
  pub fn year(year: i32) -> Result<Self> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
      .ok_or_else(|| Error::validation(format!("invalid year {year}")))?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)
      .ok_or_else(|| Error::validation(format!("invalid year {year}")))?;
    Ok(Self { start, end })
  }

  /// The `days` days ending on (and including) `end`.
  pub fn trailing(end: NaiveDate, days: i64) -> Self {
    Self { start: end - Duration::days(days.max(1) - 1), end }
  }

  /// Number of calendar days covered, counting both endpoints.
  pub fn days(&self) -> i64 { (self.end - self.start).num_days() + 1 }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }

  /// The window of equal duration that ends the day before `self.start`.
  pub fn preceding(&self) -> Self {
    let days = self.days();
    Self {
      start: self.start - Duration::days(days),
      end:   self.start - Duration::days(1),
    }
  }

  /// The same window moved `days` days into the past.
  pub fn shifted_back(&self, days: i64) -> Self {
    Self {
      start: self.start - Duration::days(days),
      end:   self.end - Duration::days(days),
    }
  }

  /// Smallest window covering both `self` and `other`.
  pub fn span(&self, other: &Self) -> Self {
    Self {
      start: self.start.min(other.start),
      end:   self.end.max(other.end),
    }
  }
}

// ─── SalesFilter ─────────────────────────────────────────────────────────────

/// Optional restrictions on the fact set. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalesFilter {
  /// Inclusive lower bound on `date`.
  pub start:    Option<NaiveDate>,
  /// Inclusive upper bound on `date`.
  pub end:      Option<NaiveDate>,
  pub store_id: Option<StoreId>,
  pub dept_id:  Option<DeptId>,
  pub year:     Option<i32>,
}

impl SalesFilter {
  pub fn new() -> Self { Self::default() }

  pub fn from_date(mut self, start: NaiveDate) -> Self {
    self.start = Some(start);
    self
  }

  pub fn until(mut self, end: NaiveDate) -> Self {
    self.end = Some(end);
    self
  }

  pub fn within(self, range: DateRange) -> Self {
    self.from_date(range.start).until(range.end)
  }

  pub fn store(mut self, store_id: StoreId) -> Self {
    self.store_id = Some(store_id);
    self
  }

  pub fn department(mut self, dept_id: DeptId) -> Self {
    self.dept_id = Some(dept_id);
    self
  }

  pub fn in_year(mut self, year: i32) -> Self {
    self.year = Some(year);
    self
  }

  /// The same store/department restrictions over a different date window.
  pub fn with_range(&self, range: DateRange) -> Self {
    self.clone().within(range)
  }

  /// The date window, if both ends are bounded.
  pub fn range(&self) -> Option<DateRange> {
    match (self.start, self.end) {
      (Some(start), Some(end)) => Some(DateRange { start, end }),
      _ => None,
    }
  }

  pub fn is_unrestricted(&self) -> bool { *self == Self::default() }

  /// In-memory form of the predicate the SQL builder emits.
  pub fn matches(&self, fact: &SalesFact) -> bool {
    self.start.is_none_or(|s| fact.date >= s)
      && self.end.is_none_or(|e| fact.date <= e)
      && self.store_id.is_none_or(|id| fact.store_id == id)
      && self.dept_id.is_none_or(|id| fact.dept_id == id)
      && self.year.is_none_or(|y| fact.date.year() == y)
  }
}

// ─── Grouping ────────────────────────────────────────────────────────────────

/// Calendar granularity for date grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
  Day,
  Week,
  #[default]
  Month,
  Year,
}

impl TimePeriod {
  pub const ALLOWED: &'static [&'static str] = &["day", "week", "month", "year"];

  /// Label for a date at this granularity; weeks are Monday-based
  /// (`%Y-%W`).
  pub fn label(self, date: NaiveDate) -> String {
    match self {
      Self::Day => date.format("%Y-%m-%d").to_string(),
      Self::Week => date.format("%Y-%W").to_string(),
      Self::Month => date.format("%Y-%m").to_string(),
      Self::Year => date.format("%Y").to_string(),
    }
  }
}

impl std::str::FromStr for TimePeriod {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "day" => Ok(Self::Day),
      "week" => Ok(Self::Week),
      "month" => Ok(Self::Month),
      "year" => Ok(Self::Year),
      other => Err(Error::invalid_choice("time_period", other, Self::ALLOWED)),
    }
  }
}

/// Key for grouped aggregation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
  Store,
  Department,
  Date(TimePeriod),
  StoreType,
  Region,
  Category,
  /// 0 = Sunday … 6 = Saturday.
  Weekday,
  /// 1 … 12.
  Month,
  /// 1 … 4.
  Quarter,
}

impl GroupKey {
  pub const ALLOWED: &'static [&'static str] = &[
    "store",
    "department",
    "date",
    "store_type",
    "region",
    "category",
    "weekday",
    "month",
    "quarter",
  ];

  /// Parse a `group_by` value; `time_period` only matters for `date`.
  pub fn parse(group_by: &str, time_period: TimePeriod) -> Result<Self> {
    match group_by {
      "store" => Ok(Self::Store),
      "department" => Ok(Self::Department),
      "date" => Ok(Self::Date(time_period)),
      "store_type" => Ok(Self::StoreType),
      "region" => Ok(Self::Region),
      "category" => Ok(Self::Category),
      "weekday" => Ok(Self::Weekday),
      "month" => Ok(Self::Month),
      "quarter" => Ok(Self::Quarter),
      other => Err(Error::invalid_choice("group_by", other, Self::ALLOWED)),
    }
  }
}

/// One group of a grouped aggregation. Monetary values are unrounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
  /// Group label: entity name, period label, store type, region, category,
  /// weekday, month or quarter number.
  pub key:            String,
  /// Entity id when grouping by store or department.
  pub id:             Option<i64>,
  pub total_sales:    f64,
  pub avg_sales:      f64,
  pub record_count:   u64,
  /// Distinct `%Y-%W` weeks covered by the group.
  pub distinct_weeks: u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn preceding_window_has_equal_duration() {
    let current = DateRange::new(d(2024, 3, 1), d(2024, 3, 31)).unwrap();
    let previous = current.preceding();
    assert_eq!(previous.days(), current.days());
    assert_eq!(previous.end, d(2024, 2, 29));
    assert_eq!(previous.start, d(2024, 1, 30));
  }

  #[test]
  fn single_day_window_precedes_by_one_day() {
    let current = DateRange::new(d(2024, 1, 10), d(2024, 1, 10)).unwrap();
    let previous = current.preceding();
    assert_eq!(previous, DateRange::new(d(2024, 1, 9), d(2024, 1, 9)).unwrap());
  }

  #[test]
  fn shifted_back_moves_both_ends() {
    let current = DateRange::new(d(2024, 6, 1), d(2024, 6, 30)).unwrap();
    let prior = current.shifted_back(365);
    assert_eq!(prior.start, d(2023, 6, 2));
    assert_eq!(prior.end, d(2023, 7, 1));
  }

  #[test]
  fn inverted_range_is_rejected() {
    assert!(DateRange::new(d(2024, 2, 1), d(2024, 1, 1)).is_err());
  }

  #[test]
  fn filter_matches_on_every_restriction() {
    let fact = SalesFact {
      sale_id:      1,
      store_id:     2,
      dept_id:      3,
      date:         d(2024, 5, 10),
      weekly_sales: 10.0,
      is_holiday:   false,
      temperature:  0.0,
      fuel_price:   0.0,
      markdown:     0.0,
      cpi:          0.0,
      unemployment: 0.0,
    };
    assert!(SalesFilter::new().matches(&fact));
    assert!(SalesFilter::new().store(2).department(3).matches(&fact));
    assert!(!SalesFilter::new().store(1).matches(&fact));
    assert!(!SalesFilter::new().from_date(d(2024, 5, 11)).matches(&fact));
    assert!(SalesFilter::new().until(d(2024, 5, 10)).matches(&fact));
    assert!(!SalesFilter::new().in_year(2023).matches(&fact));
  }

  #[test]
  fn unknown_group_by_lists_allowed_values() {
    let err = GroupKey::parse("planet", TimePeriod::Month).unwrap_err();
    assert!(err.to_string().contains("store, department, date"));
  }
}
