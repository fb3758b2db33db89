//! Pearson correlation between weekly sales and each exogenous covariate.

use serde::{Deserialize, Serialize};

use crate::{sale::SalesFact, stats::round2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Covariate {
  Temperature,
  FuelPrice,
  Markdown,
  Cpi,
  Unemployment,
  /// `is_holiday` as 0 / 1.
  Holiday,
}

impl Covariate {
  pub const ALL: [Covariate; 6] = [
    Self::Temperature,
    Self::FuelPrice,
    Self::Markdown,
    Self::Cpi,
    Self::Unemployment,
    Self::Holiday,
  ];

  pub fn label(self) -> &'static str {
    match self {
      Self::Temperature => "Temperature",
      Self::FuelPrice => "Fuel Price",
      Self::Markdown => "Markdown",
      Self::Cpi => "CPI",
      Self::Unemployment => "Unemployment",
      Self::Holiday => "Holiday",
    }
  }

  pub fn value(self, fact: &SalesFact) -> f64 {
    match self {
      Self::Temperature => fact.temperature,
      Self::FuelPrice => fact.fuel_price,
      Self::Markdown => fact.markdown,
      Self::Cpi => fact.cpi,
      Self::Unemployment => fact.unemployment,
      Self::Holiday => f64::from(u8::from(fact.is_holiday)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
  pub factor:      String,
  pub covariate:   Covariate,
  /// Rounded to two decimals; 0 when undefined.
  pub correlation: f64,
}

/// Pearson coefficient of two equal-length series.
///
/// Returns 0 when there are fewer than two points or either series is
/// constant, where the coefficient is undefined.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
  let n = xs.len().min(ys.len());
  if n < 2 {
    return 0.0;
  }
  let (xs, ys) = (&xs[..n], &ys[..n]);
  let mx = xs.iter().sum::<f64>() / n as f64;
  let my = ys.iter().sum::<f64>() / n as f64;
  let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
  for (x, y) in xs.iter().zip(ys) {
    let (dx, dy) = (x - mx, y - my);
    sxy += dx * dy;
    sxx += dx * dx;
    syy += dy * dy;
  }
  if sxx == 0.0 || syy == 0.0 {
    return 0.0;
  }
  (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

/// Correlation of `weekly_sales` with every [`Covariate`], in
/// [`Covariate::ALL`] order.
pub fn correlations(facts: &[SalesFact]) -> Vec<Correlation> {
  let sales: Vec<f64> = facts.iter().map(|f| f.weekly_sales).collect();
  Covariate::ALL
    .iter()
    .map(|&covariate| {
      let values: Vec<f64> = facts.iter().map(|f| covariate.value(f)).collect();
      Correlation {
        factor: covariate.label().to_string(),
        covariate,
        correlation: round2(pearson(&sales, &values)),
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn fact(sales: f64, temperature: f64, fuel_price: f64) -> SalesFact {
    SalesFact {
      sale_id: 0,
      store_id: 1,
      dept_id: 1,
      date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
      weekly_sales: sales,
      is_holiday: false,
      temperature,
      fuel_price,
      markdown: 0.0,
      cpi: 0.0,
      unemployment: 0.0,
    }
  }

  #[test]
  fn series_with_itself_is_one() {
    let xs = [3.0, 7.5, 1.25, 9.0, 4.0];
    assert!((pearson(&xs, &xs) - 1.0).abs() < 1e-12);
    let neg: Vec<f64> = xs.iter().map(|x| -2.0 * x).collect();
    assert!((pearson(&xs, &neg) + 1.0).abs() < 1e-12);
  }

  #[test]
  fn constant_or_short_series_is_zero() {
    assert_eq!(pearson(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), 0.0);
    assert_eq!(pearson(&[1.0], &[2.0]), 0.0);
  }

  #[test]
  fn correlations_cover_every_covariate() {
    let facts: Vec<SalesFact> = (1..=6)
      .map(|i| fact(i as f64 * 10.0, i as f64 * 10.0, 3.0))
      .collect();
    let out = correlations(&facts);
    assert_eq!(out.len(), 6);
    assert_eq!(out[0].factor, "Temperature");
    assert_eq!(out[0].correlation, 1.0);
    // Constant fuel price, markdown, holiday flag.
    assert_eq!(out[1].correlation, 0.0);
    assert_eq!(out[2].correlation, 0.0);
    assert_eq!(out[5].correlation, 0.0);
  }
}
