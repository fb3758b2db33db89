//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Dates are stored as `YYYY-MM-DD` text so that lexical order is calendar
//! order and `strftime` can group them. Booleans are stored as 0/1 integers.

use chrono::NaiveDate;
use mercato_core::{
  entity::{Department, Store},
  filter::{DateRange, GroupAggregate},
  sale::{SaleRow, SalesFact},
};

use crate::{Error, Result};

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(date: NaiveDate) -> String { date.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawFact::from_row`], for `sales s`.
pub const FACT_COLUMNS: &str = "s.sale_id, s.store_id, s.dept_id, s.date, \
  s.weekly_sales, s.is_holiday, s.temperature, s.fuel_price, s.markdown, \
  s.cpi, s.unemployment";

/// Raw values read directly from a `sales` row.
pub struct RawFact {
  pub sale_id:      i64,
  pub store_id:     i64,
  pub dept_id:      i64,
  pub date:         String,
  pub weekly_sales: f64,
  pub is_holiday:   bool,
  pub temperature:  f64,
  pub fuel_price:   f64,
  pub markdown:     f64,
  pub cpi:          f64,
  pub unemployment: f64,
}

impl RawFact {
  /// Read the [`FACT_COLUMNS`] starting at column 0.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sale_id:      row.get(0)?,
      store_id:     row.get(1)?,
      dept_id:      row.get(2)?,
      date:         row.get(3)?,
      weekly_sales: row.get(4)?,
      is_holiday:   row.get(5)?,
      temperature:  row.get(6)?,
      fuel_price:   row.get(7)?,
      markdown:     row.get(8)?,
      cpi:          row.get(9)?,
      unemployment: row.get(10)?,
    })
  }

  pub fn into_fact(self) -> Result<SalesFact> {
    Ok(SalesFact {
      sale_id:      self.sale_id,
      store_id:     self.store_id,
      dept_id:      self.dept_id,
      date:         decode_date(&self.date)?,
      weekly_sales: self.weekly_sales,
      is_holiday:   self.is_holiday,
      temperature:  self.temperature,
      fuel_price:   self.fuel_price,
      markdown:     self.markdown,
      cpi:          self.cpi,
      unemployment: self.unemployment,
    })
  }
}

/// A fact joined with its store and department names.
pub struct RawSaleRow {
  pub fact:       RawFact,
  pub store_name: String,
  pub dept_name:  String,
}

impl RawSaleRow {
  pub fn into_row(self) -> Result<SaleRow> {
    Ok(SaleRow {
      fact:       self.fact.into_fact()?,
      store_name: self.store_name,
      dept_name:  self.dept_name,
    })
  }
}

pub fn store_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Store> {
  Ok(Store {
    store_id:   row.get(0)?,
    name:       row.get(1)?,
    region:     row.get(2)?,
    size_sqft:  row.get(3)?,
    store_type: row.get(4)?,
  })
}

pub fn department_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Department> {
  Ok(Department {
    dept_id:  row.get(0)?,
    name:     row.get(1)?,
    category: row.get(2)?,
  })
}

pub fn group_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupAggregate> {
  let record_count: i64 = row.get(4)?;
  let distinct_weeks: i64 = row.get(5)?;
  Ok(GroupAggregate {
    key: row.get(0)?,
    id: row.get(1)?,
    total_sales: row.get(2)?,
    avg_sales: row.get(3)?,
    record_count: record_count.max(0) as u64,
    distinct_weeks: distinct_weeks.max(0) as u64,
  })
}

/// `MIN(date), MAX(date)` of a selection; both are NULL when it is empty.
pub fn decode_bounds(
  min: Option<String>,
  max: Option<String>,
) -> Result<Option<DateRange>> {
  match (min, max) {
    (Some(min), Some(max)) => Ok(Some(DateRange {
      start: decode_date(&min)?,
      end:   decode_date(&max)?,
    })),
    _ => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dates_round_trip_and_reject_garbage() {
    let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    assert_eq!(encode_date(d), "2024-02-29");
    assert_eq!(decode_date("2024-02-29").unwrap(), d);
    assert!(matches!(decode_date("29/02/2024"), Err(Error::DateParse(_))));
  }
}
