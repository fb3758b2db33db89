//! Seasonality index by calendar month, quarter or weekday.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, sale::SalesFact, stats::round2};

const MONTHS: [&str; 12] = [
  "January",
  "February",
  "March",
  "April",
  "May",
  "June",
  "July",
  "August",
  "September",
  "October",
  "November",
  "December",
];

const QUARTERS: [&str; 4] = ["Q1", "Q2", "Q3", "Q4"];

const WEEKDAYS: [&str; 7] = [
  "Sunday",
  "Monday",
  "Tuesday",
  "Wednesday",
  "Thursday",
  "Friday",
  "Saturday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
  /// Buckets 1 … 12.
  #[default]
  Month,
  /// Buckets 1 … 4.
  Quarter,
  /// Buckets 0 = Sunday … 6 = Saturday.
  Weekday,
}

impl Dimension {
  pub const ALLOWED: &'static [&'static str] = &["month", "quarter", "weekday"];

  pub fn bucket(self, date: NaiveDate) -> u32 {
    match self {
      Self::Month => date.month(),
      Self::Quarter => date.month0() / 3 + 1,
      Self::Weekday => date.weekday().num_days_from_sunday(),
    }
  }

  pub fn label(self, bucket: u32) -> &'static str {
    let names: &[&str] = match self {
      Self::Month => &MONTHS[..],
      Self::Quarter => &QUARTERS[..],
      Self::Weekday => &WEEKDAYS[..],
    };
    let idx = match self {
      Self::Month | Self::Quarter => bucket.saturating_sub(1),
      Self::Weekday => bucket,
    } as usize;
    names.get(idx).copied().unwrap_or("")
  }
}

impl std::str::FromStr for Dimension {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "month" => Ok(Self::Month),
      "quarter" => Ok(Self::Quarter),
      "weekday" => Ok(Self::Weekday),
      other => Err(Error::invalid_choice("dimension", other, Self::ALLOWED)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalIndex {
  pub bucket:       u32,
  pub label:        String,
  pub avg_sales:    f64,
  pub record_count: u64,
  /// `avg_sales / overall average × 100`.
  pub index:        f64,
}

/// Index of every bucket that has at least one fact, in bucket order.
///
/// The overall average is taken over the same facts; when it is zero it is
/// treated as 1 so the index degrades to `avg_sales × 100`.
pub fn seasonality_index(
  facts: &[SalesFact],
  dimension: Dimension,
) -> Vec<SeasonalIndex> {
  let mut buckets: BTreeMap<u32, (f64, u64)> = BTreeMap::new();
  for fact in facts {
    let slot = buckets.entry(dimension.bucket(fact.date)).or_default();
    slot.0 += fact.weekly_sales;
    slot.1 += 1;
  }

  let overall = if facts.is_empty() {
    0.0
  } else {
    facts.iter().map(|f| f.weekly_sales).sum::<f64>() / facts.len() as f64
  };
  let denom = if overall == 0.0 { 1.0 } else { overall };

  buckets
    .into_iter()
    .map(|(bucket, (sum, n))| {
      let avg = sum / n as f64;
      SeasonalIndex {
        bucket,
        label: dimension.label(bucket).to_string(),
        avg_sales: round2(avg),
        record_count: n,
        index: round2(avg / denom * 100.0),
      }
    })
    .collect()
}
