//! Daily total series shared by forecasting and anomaly detection.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::sale::SalesFact;

/// Fraction of the series used for training; the rest is held out.
pub const TRAIN_FRACTION: f64 = 0.8;

/// Summed `weekly_sales` per distinct date, in date order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
  pub dates:  Vec<NaiveDate>,
  pub values: Vec<f64>,
}

impl DailySeries {
  pub fn from_facts(facts: &[SalesFact]) -> Self {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for fact in facts {
      *days.entry(fact.date).or_default() += fact.weekly_sales;
    }
    let (dates, values) = days.into_iter().unzip();
    Self { dates, values }
  }

  pub fn len(&self) -> usize { self.values.len() }

  pub fn is_empty(&self) -> bool { self.values.is_empty() }

  /// Chronological split point: the first `floor(n × 0.8)` points train.
  pub fn train_len(&self) -> usize {
    (self.len() as f64 * TRAIN_FRACTION).floor() as usize
  }

  /// Most common gap between consecutive dates in days (smallest on ties);
  /// 1 when there are fewer than two dates.
  pub fn step_days(&self) -> i64 {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for pair in self.dates.windows(2) {
      *counts.entry((pair[1] - pair[0]).num_days()).or_default() += 1;
    }
    counts
      .into_iter()
      .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
      .map(|(step, _)| step.max(1))
      .unwrap_or(1)
  }

  /// Dates of the `n` periods after `last`, `step` days apart.
  pub fn continue_dates(last: NaiveDate, step: i64, n: usize) -> Vec<NaiveDate> {
    (1..=n as i64).map(|h| last + Duration::days(step * h)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fact(date: NaiveDate, sales: f64) -> SalesFact {
    SalesFact {
      sale_id: 0,
      store_id: 1,
      dept_id: 1,
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

  #[test]
  fn sums_by_date_regardless_of_order() {
    let a = NaiveDate::from_ymd_opt(2024, 1, 12).unwrap();
    let b = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    let series =
      DailySeries::from_facts(&[fact(a, 1.0), fact(b, 2.0), fact(a, 3.0)]);
    assert_eq!(series.dates, vec![b, a]);
    assert_eq!(series.values, vec![2.0, 4.0]);
  }

  #[test]
  fn weekly_data_steps_by_seven() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    let mut facts: Vec<SalesFact> = (0..10)
      .map(|w| fact(start + Duration::weeks(w), 1.0))
      .collect();
    // One irregular gap does not change the mode.
    facts.push(fact(start + Duration::days(66), 1.0));
    let series = DailySeries::from_facts(&facts);
    assert_eq!(series.step_days(), 7);
    assert_eq!(series.train_len(), 8);
  }
}
