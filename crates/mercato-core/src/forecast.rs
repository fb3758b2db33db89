//! Forecasting over the daily total series.
//!
//! The series is split chronologically 80 / 20. A [`Forecaster`] is fitted to
//! the training part and projects forward from the last training date; the
//! first `test_size` projected points are scored against the held-out values,
//! and the first `periods` points are returned with a 95 % interval.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Error, Result,
  error::ComputationError,
  series::DailySeries,
  stats::{mean, round2, round4, sample_std},
};

/// Two-sided 95 % normal quantile.
const Z_95: f64 = 1.96;

// ─── Strategy ────────────────────────────────────────────────────────────────

/// Output of fitting a model to a training series.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFit {
  /// Point forecasts for steps `1..=horizon` after the last training value.
  pub forecast:     Vec<f64>,
  /// Standard deviation of the in-sample one-step-ahead errors.
  pub residual_std: f64,
  pub parameters:   BTreeMap<String, f64>,
}

/// A univariate forecasting model.
pub trait Forecaster: Send + Sync {
  fn name(&self) -> &'static str;

  /// Fewest training points the model can be fitted to.
  fn min_points(&self) -> usize;

  fn fit(&self, train: &[f64], horizon: usize) -> Result<ModelFit, ComputationError>;
}

// ─── Holt-Winters ────────────────────────────────────────────────────────────

/// Additive Holt-Winters (level, trend and seasonal components). Smoothing
/// parameters are picked from a 0.1 … 0.9 grid by in-sample squared error.
#[derive(Debug, Clone, Copy)]
pub struct HoltWinters {
  pub season_length: usize,
}

impl Default for HoltWinters {
  fn default() -> Self { Self { season_length: 7 } }
}

struct HwRun {
  sse:      f64,
  level:    f64,
  trend:    f64,
  seasonal: Vec<f64>,
  errors:   Vec<f64>,
}

impl HoltWinters {
  const GRID: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

  /// Initial level, trend and seasonal indices from the first two seasons.
  /// The level is placed one step before the first observation so the first
  /// one-step forecast lines up with `y[0]`.
  fn initial(&self, y: &[f64]) -> (f64, f64, Vec<f64>) {
    let m = self.season_length;
    let first = mean(&y[..m]);
    let second = mean(&y[m..2 * m]);
    let trend = (second - first) / m as f64;
    let mid = (m as f64 - 1.0) / 2.0;
    let seasonal = (0..m)
      .map(|i| y[i] - (first + (i as f64 - mid) * trend))
      .collect();
    let level = first - (mid + 1.0) * trend;
    (level, trend, seasonal)
  }

  fn run(&self, y: &[f64], alpha: f64, beta: f64, gamma: f64) -> HwRun {
    let m = self.season_length;
    let (mut level, mut trend, mut seasonal) = self.initial(y);
    let mut errors = Vec::with_capacity(y.len());
    let mut sse = 0.0;
    for (t, &obs) in y.iter().enumerate() {
      let s = seasonal[t % m];
      let err = obs - (level + trend + s);
      errors.push(err);
      sse += err * err;

      let prev_level = level;
      level = alpha * (obs - s) + (1.0 - alpha) * (level + trend);
      trend = beta * (level - prev_level) + (1.0 - beta) * trend;
      seasonal[t % m] = gamma * (obs - level) + (1.0 - gamma) * s;
    }
    HwRun { sse, level, trend, seasonal, errors }
  }
}

impl Forecaster for HoltWinters {
  fn name(&self) -> &'static str { "holt_winters" }

  fn min_points(&self) -> usize { 2 * self.season_length }

  fn fit(&self, train: &[f64], horizon: usize) -> Result<ModelFit, ComputationError> {
    if self.season_length == 0 {
      return Err(ComputationError::DegenerateSeries(
        "season length must be positive".into(),
      ));
    }
    if train.len() < self.min_points() {
      return Err(ComputationError::InsufficientData {
        what:   "training points",
        needed: self.min_points(),
        got:    train.len(),
      });
    }

    let mut best: Option<(HwRun, [f64; 3])> = None;
    for &alpha in &Self::GRID {
      for &beta in &Self::GRID {
        for &gamma in &Self::GRID {
          let run = self.run(train, alpha, beta, gamma);
          if best.as_ref().is_none_or(|(b, _)| run.sse < b.sse) {
            best = Some((run, [alpha, beta, gamma]));
          }
        }
      }
    }
    let Some((run, [alpha, beta, gamma])) = best else {
      return Err(ComputationError::DegenerateSeries(
        "no Holt-Winters fit".into(),
      ));
    };
    if !run.sse.is_finite() {
      return Err(ComputationError::DegenerateSeries(
        "Holt-Winters errors are not finite".into(),
      ));
    }

    let m = self.season_length;
    let n = train.len();
    let forecast = (1..=horizon)
      .map(|h| run.level + h as f64 * run.trend + run.seasonal[(n + h - 1) % m])
      .collect();

    Ok(ModelFit {
      forecast,
      residual_std: sample_std(&run.errors),
      parameters: BTreeMap::from([
        ("alpha".to_string(), alpha),
        ("beta".to_string(), beta),
        ("gamma".to_string(), gamma),
        ("season_length".to_string(), m as f64),
      ]),
    })
  }
}

// ─── ARIMA(1,1,1) ────────────────────────────────────────────────────────────

/// ARIMA(1,1,1): first difference, AR(1) coefficient from the lag-1
/// autocorrelation (Yule-Walker), MA(1) coefficient from the lag-1
/// autocorrelation of the AR residuals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Arima;

impl Arima {
  /// Keep both coefficients inside the stationary / invertible region.
  const BOUND: f64 = 0.99;

  fn lag1_autocorrelation(x: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
      return 0.0;
    }
    let m = mean(x);
    let var: f64 = x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
    if var < 1e-10 {
      return 0.0;
    }
    let cov: f64 = (0..n - 1)
      .map(|i| (x[i] - m) * (x[i + 1] - m))
      .sum::<f64>()
      / n as f64;
    cov / var
  }
}

impl Forecaster for Arima {
  fn name(&self) -> &'static str { "arima" }

  fn min_points(&self) -> usize { 5 }

  fn fit(&self, train: &[f64], horizon: usize) -> Result<ModelFit, ComputationError> {
    if train.len() < self.min_points() {
      return Err(ComputationError::InsufficientData {
        what:   "training points",
        needed: self.min_points(),
        got:    train.len(),
      });
    }

    let diff: Vec<f64> = train.windows(2).map(|w| w[1] - w[0]).collect();
    let mu = mean(&diff);
    let z: Vec<f64> = diff.iter().map(|d| d - mu).collect();

    let phi = Self::lag1_autocorrelation(&z).clamp(-Self::BOUND, Self::BOUND);
    let ar_resid: Vec<f64> = z.windows(2).map(|w| w[1] - phi * w[0]).collect();
    let theta =
      Self::lag1_autocorrelation(&ar_resid).clamp(-Self::BOUND, Self::BOUND);

    // One-step innovations of the fitted ARMA(1,1) on the differences.
    let mut eps = vec![0.0; z.len()];
    for t in 1..z.len() {
      eps[t] = z[t] - phi * z[t - 1] - theta * eps[t - 1];
    }
    if eps.iter().any(|e| !e.is_finite()) {
      return Err(ComputationError::DegenerateSeries(
        "ARIMA innovations are not finite".into(),
      ));
    }

    let mut forecast = Vec::with_capacity(horizon);
    let mut level = train[train.len() - 1];
    let (mut z_prev, mut eps_prev) = (z[z.len() - 1], eps[eps.len() - 1]);
    for _ in 0..horizon {
      let z_hat = phi * z_prev + theta * eps_prev;
      level += mu + z_hat;
      forecast.push(level);
      z_prev = z_hat;
      eps_prev = 0.0;
    }

    Ok(ModelFit {
      forecast,
      residual_std: sample_std(&eps[1..]),
      parameters: BTreeMap::from([
        ("ar1".to_string(), phi),
        ("ma1".to_string(), theta),
        ("drift".to_string(), mu),
      ]),
    })
  }
}

// ─── Method selection ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
  #[default]
  HoltWinters,
  Arima,
}

impl ForecastMethod {
  pub const ALLOWED: &'static [&'static str] = &["holt_winters", "arima"];

  pub fn forecaster(self, season_length: usize) -> Box<dyn Forecaster> {
    match self {
      Self::HoltWinters => Box::new(HoltWinters {
        season_length: season_length.max(1),
      }),
      Self::Arima => Box::new(Arima),
    }
  }
}

impl std::str::FromStr for ForecastMethod {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "holt_winters" | "exponential_smoothing" => Ok(Self::HoltWinters),
      "arima" => Ok(Self::Arima),
      other => Err(Error::invalid_choice("method", other, Self::ALLOWED)),
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
  /// Future periods to report.
  pub periods:       usize,
  pub method:        ForecastMethod,
  pub season_length: usize,
}

impl Default for ForecastConfig {
  fn default() -> Self {
    Self {
      periods:       30,
      method:        ForecastMethod::default(),
      season_length: 7,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
  pub date:     NaiveDate,
  pub forecast: f64,
  pub lower_ci: f64,
  pub upper_ci: f64,
}

/// Hold-out accuracy of the fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
  pub mae:  f64,
  pub rmse: f64,
  /// Mean absolute percentage error over non-zero actuals; `None` if every
  /// actual is zero.
  pub mape: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
  pub method:       ForecastMethod,
  pub train_size:   usize,
  pub test_size:    usize,
  pub train_end:    NaiveDate,
  /// Spacing of forecast dates in days.
  pub step_days:    i64,
  pub points:       Vec<ForecastPoint>,
  pub evaluation:   Option<Evaluation>,
  pub residual_std: f64,
  pub parameters:   BTreeMap<String, f64>,
}

pub struct ForecastEngine {
  config: ForecastConfig,
}

impl ForecastEngine {
  pub fn new(config: ForecastConfig) -> Self { Self { config } }

  pub fn forecast(&self, series: &DailySeries) -> Result<Forecast, ComputationError> {
    let forecaster = self.config.method.forecaster(self.config.season_length);
    let train_size = series.train_len();
    if train_size < forecaster.min_points() {
      return Err(ComputationError::InsufficientData {
        what:   "training points",
        needed: forecaster.min_points(),
        got:    train_size,
      });
    }
    if series.values.iter().any(|v| !v.is_finite()) {
      return Err(ComputationError::DegenerateSeries(
        "series contains non-finite values".into(),
      ));
    }

    let (train, test) = series.values.split_at(train_size);
    let horizon = self.config.periods.max(test.len());
    let fit = forecaster.fit(train, horizon)?;

    let train_end = series.dates[train_size - 1];
    let step_days = series.step_days();
    let dates =
      DailySeries::continue_dates(train_end, step_days, self.config.periods);
    let points = dates
      .into_iter()
      .zip(&fit.forecast)
      .enumerate()
      .map(|(i, (date, &value))| {
        let half = Z_95 * fit.residual_std * ((i + 1) as f64).sqrt();
        ForecastPoint {
          date,
          forecast: round2(value),
          lower_ci: round2(value - half),
          upper_ci: round2(value + half),
        }
      })
      .collect();

    let evaluation = evaluate(&fit.forecast[..test.len()], test);
    info!(
      method = forecaster.name(),
      train_size,
      test_size = test.len(),
      mae = evaluation.as_ref().map(|e| e.mae),
      "forecast fitted"
    );

    Ok(Forecast {
      method: self.config.method,
      train_size,
      test_size: test.len(),
      train_end,
      step_days,
      points,
      evaluation,
      residual_std: round2(fit.residual_std),
      parameters: fit
        .parameters
        .into_iter()
        .map(|(k, v)| (k, round4(v)))
        .collect(),
    })
  }
}

fn evaluate(predicted: &[f64], actual: &[f64]) -> Option<Evaluation> {
  if actual.is_empty() {
    return None;
  }
  let n = actual.len() as f64;
  let errors: Vec<f64> =
    predicted.iter().zip(actual).map(|(p, a)| a - p).collect();
  let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
  let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt();
  let pct: Vec<f64> = errors
    .iter()
    .zip(actual)
    .filter(|(_, a)| **a != 0.0)
    .map(|(e, a)| (e / a).abs() * 100.0)
    .collect();
  Some(Evaluation {
    mae:  round2(mae),
    rmse: round2(rmse),
    mape: (!pct.is_empty()).then(|| round2(mean(&pct))),
  })
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  const SEASON: [f64; 7] = [0.0, 20.0, -10.0, 5.0, -15.0, 10.0, -10.0];

  fn daily(values: Vec<f64>) -> DailySeries {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    DailySeries {
      dates: (0..values.len() as i64)
        .map(|i| start + Duration::days(i))
        .collect(),
      values,
    }
  }

  fn seasonal_trend(n: usize) -> Vec<f64> {
    (0..n).map(|t| 500.0 + 3.0 * t as f64 + SEASON[t % 7]).collect()
  }

  fn engine(method: ForecastMethod, periods: usize) -> ForecastEngine {
    ForecastEngine::new(ForecastConfig { periods, method, season_length: 7 })
  }

  #[test]
  fn holt_winters_recovers_trend_and_season() {
    let series = daily(seasonal_trend(70));
    let fc = engine(ForecastMethod::HoltWinters, 20).forecast(&series).unwrap();
    assert_eq!(fc.train_size, 56);
    assert_eq!(fc.test_size, 14);
    let eval = fc.evaluation.unwrap();
    assert!(eval.mae < 0.01, "mae {}", eval.mae);
    // First forecast is the day after the last training date.
    assert_eq!(fc.train_end, NaiveDate::from_ymd_opt(2024, 2, 25).unwrap());
    assert_eq!(fc.points[0].date, NaiveDate::from_ymd_opt(2024, 2, 26).unwrap());
    assert_eq!(fc.points.len(), 20);
    assert!((fc.points[0].forecast - (500.0 + 3.0 * 56.0)).abs() < 0.01);
  }

  #[test]
  fn arima_extends_linear_trend() {
    let series = daily((0..20).map(|t| 100.0 + 5.0 * t as f64).collect());
    let fc = engine(ForecastMethod::Arima, 3).forecast(&series).unwrap();
    assert_eq!(fc.train_size, 16);
    let expected: Vec<f64> = (16..19).map(|t| 100.0 + 5.0 * t as f64).collect();
    let got: Vec<f64> = fc.points.iter().map(|p| p.forecast).collect();
    assert_eq!(got, expected);
    assert_eq!(fc.evaluation.unwrap().mae, 0.0);
  }

  #[test]
  fn interval_widens_with_horizon() {
    let values: Vec<f64> = (0..60)
      .map(|t| 1_000.0 + ((t * 7919) % 97) as f64)
      .collect();
    let fc = engine(ForecastMethod::Arima, 4).forecast(&daily(values)).unwrap();
    let width = |p: &ForecastPoint| p.upper_ci - p.lower_ci;
    assert!(fc.residual_std > 0.0);
    assert!((width(&fc.points[3]) - 2.0 * width(&fc.points[0])).abs() < 0.05);
    assert!(fc.points.iter().all(|p| p.lower_ci <= p.forecast));
  }

  #[test]
  fn too_short_series_is_insufficient() {
    let err = engine(ForecastMethod::HoltWinters, 5)
      .forecast(&daily(seasonal_trend(10)))
      .unwrap_err();
    assert_eq!(err, ComputationError::InsufficientData {
      what:   "training points",
      needed: 14,
      got:    8,
    });
  }

  #[test]
  fn method_names_parse() {
    assert_eq!("arima".parse::<ForecastMethod>().unwrap(), ForecastMethod::Arima);
    assert_eq!(
      "exponential_smoothing".parse::<ForecastMethod>().unwrap(),
      ForecastMethod::HoltWinters
    );
    assert!("prophet".parse::<ForecastMethod>().is_err());
  }
}
