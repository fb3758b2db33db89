//! Query-string validation.
//!
//! Parameters arrive as optional strings so that every malformed value is
//! rejected here with a descriptive message, before any engine runs.

use std::str::FromStr;

use chrono::{Datelike as _, NaiveDate, Utc};
use mercato_core::filter::{DateRange, SalesFilter};
use serde::Deserialize;

use crate::{Limits, error::ApiError};

type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Earliest year accepted by year-scoped operations.
pub const MIN_YEAR: i32 = 2000;

/// The common filter parameters: date range, store and department.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
  pub start_date: Option<String>,
  pub end_date:   Option<String>,
  pub store_id:   Option<String>,
  pub dept_id:    Option<String>,
}

impl FilterParams {
  pub fn filter(&self) -> Result<SalesFilter> {
    let start = date("start_date", self.start_date.as_deref())?;
    let end = date("end_date", self.end_date.as_deref())?;
    if let (Some(s), Some(e)) = (start, end) {
      DateRange::new(s, e)?;
    }
    let mut filter = SalesFilter::new();
    filter.start = start;
    filter.end = end;
    filter.store_id = id("store_id", self.store_id.as_deref())?;
    filter.dept_id = id("dept_id", self.dept_id.as_deref())?;
    Ok(filter)
  }

  /// The date range when both ends are given.
  pub fn range(&self) -> Result<Option<DateRange>> { Ok(self.filter()?.range()) }

  /// The date range, which must be fully specified.
  pub fn required_range(&self) -> Result<DateRange> {
    self
      .range()?
      .ok_or_else(|| ApiError::validation("start_date and end_date are required"))
  }
}

fn blank(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|v| !v.is_empty())
}

/// A `YYYY-MM-DD` date.
pub fn date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
  blank(value)
    .map(|v| {
      NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
        ApiError::validation(format!("Invalid {field} {v:?}. Use YYYY-MM-DD format"))
      })
    })
    .transpose()
}

/// A positive integer identifier.
pub fn id(field: &str, value: Option<&str>) -> Result<Option<i64>> {
  blank(value)
    .map(|v| match v.parse::<i64>() {
      Ok(n) if n > 0 => Ok(n),
      _ => Err(ApiError::validation(format!(
        "Invalid {field} {v:?}. Must be a positive integer"
      ))),
    })
    .transpose()
}

/// An integer in `min..=max`.
pub fn bounded(
  field: &str,
  value: Option<&str>,
  min: i64,
  max: i64,
) -> Result<Option<i64>> {
  blank(value)
    .map(|v| match v.parse::<i64>() {
      Ok(n) if (min..=max).contains(&n) => Ok(n),
      _ => Err(ApiError::validation(format!(
        "Invalid {field} {v:?}. Must be an integer between {min} and {max}"
      ))),
    })
    .transpose()
}

/// Like [`bounded`] but as a count.
pub fn count(
  field: &str,
  value: Option<&str>,
  min: usize,
  max: usize,
) -> Result<Option<usize>> {
  let v = bounded(field, value, min as i64, max as i64)?;
  Ok(v.map(|n| n as usize))
}

/// A row limit: positive, at most `limits.max_limit`, defaulting to
/// `limits.default_limit`.
pub fn limit(value: Option<&str>, limits: Limits) -> Result<usize> {
  Ok(count("limit", value, 1, limits.max_limit)?.unwrap_or(limits.default_limit))
}

/// A calendar year between [`MIN_YEAR`] and the current year.
pub fn year(value: Option<&str>) -> Result<Option<i32>> {
  let current = Utc::now().year();
  let y = bounded("year", value, MIN_YEAR as i64, current as i64)?;
  Ok(y.map(|y| y as i32))
}

/// An enumerated value; the type's `FromStr` produces the allowed-values
/// message.
pub fn choice<T>(value: Option<&str>) -> Result<Option<T>>
where
  T: FromStr<Err = mercato_core::Error>,
{
  Ok(blank(value).map(T::from_str).transpose()?)
}

/// Expected outlier fraction in `(0, 0.5]`.
pub fn contamination(value: Option<&str>) -> Result<Option<f64>> {
  blank(value)
    .map(|v| match v.parse::<f64>() {
      Ok(c) if c > 0.0 && c <= 0.5 => Ok(c),
      _ => Err(ApiError::validation(format!(
        "Invalid contamination {v:?}. Must be greater than 0 and at most 0.5"
      ))),
    })
    .transpose()
}
