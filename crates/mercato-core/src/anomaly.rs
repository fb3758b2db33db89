//! Outlier detection over the daily total series.
//!
//! Three interchangeable [`AnomalyDetector`] strategies: a seeded isolation
//! forest that flags the expected contamination fraction, z-score
//! thresholding at `|z| > 3`, and Tukey IQR fences at 1.5 × IQR.

use chrono::NaiveDate;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::index};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Error, Result,
  error::ComputationError,
  series::DailySeries,
  stats::{mean, quantile, round2, round4, sample_std, sorted},
};

// ─── Strategy ────────────────────────────────────────────────────────────────

/// Per-point verdicts from one detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub flags:  Vec<bool>,
  /// Detector-specific score per point (isolation score or z), if any.
  pub scores: Option<Vec<f64>>,
}

pub trait AnomalyDetector: Send + Sync {
  fn name(&self) -> &'static str;

  fn detect(&self, values: &[f64]) -> Detection;
}

// ─── Isolation forest ────────────────────────────────────────────────────────

enum INode {
  Internal {
    split: f64,
    left:  Box<INode>,
    right: Box<INode>,
  },
  External {
    size: usize,
  },
}

impl INode {
  fn build(samples: &[f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Self {
    if samples.len() <= 1 || depth >= max_depth {
      return Self::External { size: samples.len() };
    }
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max - min < 1e-10 {
      return Self::External { size: samples.len() };
    }

    let split = rng.random_range(min..max);
    let (left, right): (Vec<f64>, Vec<f64>) =
      samples.iter().partition(|&&v| v < split);
    Self::Internal {
      split,
      left: Box::new(Self::build(&left, depth + 1, max_depth, rng)),
      right: Box::new(Self::build(&right, depth + 1, max_depth, rng)),
    }
  }

  fn path_length(&self, value: f64, depth: usize) -> f64 {
    match self {
      Self::External { size } => depth as f64 + c_factor(*size),
      Self::Internal { split, left, right } => {
        if value < *split {
          left.path_length(value, depth + 1)
        } else {
          right.path_length(value, depth + 1)
        }
      }
    }
  }
}

/// Average unsuccessful-search path length in a binary search tree of `n`
/// nodes.
fn c_factor(n: usize) -> f64 {
  match n {
    0 | 1 => 0.0,
    2 => 1.0,
    _ => {
      let n = n as f64;
      2.0 * ((n - 1.0).ln() + 0.577_215_664_9) - 2.0 * (n - 1.0) / n
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsolationForestDetector {
  /// Expected fraction of outliers, in `(0, 0.5]`.
  pub contamination: f64,
  pub n_trees:       usize,
  pub sample_size:   usize,
  pub seed:          u64,
}

impl Default for IsolationForestDetector {
  fn default() -> Self {
    Self { contamination: 0.05, n_trees: 100, sample_size: 256, seed: 42 }
  }
}

impl IsolationForestDetector {
  /// Anomaly score `2^(-E[h(x)] / c(ψ))` for every value; higher is more
  /// anomalous.
  pub fn scores(&self, values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
      return Vec::new();
    }
    let psi = self.sample_size.clamp(1, n);
    let max_depth = (psi as f64).log2().ceil().max(1.0) as usize;
    let mut rng = StdRng::seed_from_u64(self.seed);

    let trees: Vec<INode> = (0..self.n_trees.max(1))
      .map(|_| {
        let sample: Vec<f64> = index::sample(&mut rng, n, psi)
          .into_iter()
          .map(|i| values[i])
          .collect();
        INode::build(&sample, 0, max_depth, &mut rng)
      })
      .collect();

    let norm = c_factor(psi).max(1.0);
    values
      .iter()
      .map(|&v| {
        let avg = trees.iter().map(|t| t.path_length(v, 0)).sum::<f64>()
          / trees.len() as f64;
        2f64.powf(-avg / norm)
      })
      .collect()
  }
}

impl AnomalyDetector for IsolationForestDetector {
  fn name(&self) -> &'static str { "isolation_forest" }

  fn detect(&self, values: &[f64]) -> Detection {
    let scores = self.scores(values);
    let threshold =
      quantile(&sorted(&scores), 1.0 - self.contamination.clamp(0.0, 0.5));
    Detection {
      flags:  scores.iter().map(|&s| s > threshold).collect(),
      scores: Some(scores),
    }
  }
}

// ─── Z-score ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreDetector {
  pub threshold: f64,
}

impl Default for ZScoreDetector {
  fn default() -> Self { Self { threshold: 3.0 } }
}

impl AnomalyDetector for ZScoreDetector {
  fn name(&self) -> &'static str { "zscore" }

  /// Uses the sample standard deviation. A constant series has no outliers.
  fn detect(&self, values: &[f64]) -> Detection {
    let (m, sd) = (mean(values), sample_std(values));
    let z: Vec<f64> = values
      .iter()
      .map(|v| if sd > 0.0 { (v - m) / sd } else { 0.0 })
      .collect();
    Detection {
      flags:  z.iter().map(|z| z.abs() > self.threshold).collect(),
      scores: Some(z),
    }
  }
}

// ─── IQR ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrDetector {
  pub multiplier: f64,
}

impl Default for IqrDetector {
  fn default() -> Self { Self { multiplier: 1.5 } }
}

impl IqrDetector {
  /// `(lower, upper)` fences.
  pub fn fences(&self, values: &[f64]) -> (f64, f64) {
    let s = sorted(values);
    let (q1, q3) = (quantile(&s, 0.25), quantile(&s, 0.75));
    let iqr = q3 - q1;
    (q1 - self.multiplier * iqr, q3 + self.multiplier * iqr)
  }
}

impl AnomalyDetector for IqrDetector {
  fn name(&self) -> &'static str { "iqr" }

  fn detect(&self, values: &[f64]) -> Detection {
    let (lower, upper) = self.fences(values);
    Detection {
      flags:  values.iter().map(|&v| v < lower || v > upper).collect(),
      scores: None,
    }
  }
}

// ─── Method selection ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyMethod {
  #[default]
  IsolationForest,
  Zscore,
  Iqr,
}

impl AnomalyMethod {
  pub const ALLOWED: &'static [&'static str] =
    &["isolation_forest", "zscore", "iqr"];
}

impl std::str::FromStr for AnomalyMethod {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "isolation_forest" => Ok(Self::IsolationForest),
      "zscore" => Ok(Self::Zscore),
      "iqr" => Ok(Self::Iqr),
      other => Err(Error::invalid_choice("method", other, Self::ALLOWED)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
  pub method:        AnomalyMethod,
  /// Used by the isolation forest only.
  pub contamination: f64,
  pub seed:          u64,
}

impl Default for AnomalyConfig {
  fn default() -> Self {
    Self {
      method:        AnomalyMethod::default(),
      contamination: 0.05,
      seed:          42,
    }
  }
}

impl AnomalyConfig {
  pub fn detector(&self) -> Box<dyn AnomalyDetector> {
    match self.method {
      AnomalyMethod::IsolationForest => Box::new(IsolationForestDetector {
        contamination: self.contamination,
        seed: self.seed,
        ..Default::default()
      }),
      AnomalyMethod::Zscore => Box::new(ZScoreDetector::default()),
      AnomalyMethod::Iqr => Box::new(IqrDetector::default()),
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDay {
  pub date:        NaiveDate,
  pub total_sales: f64,
  pub is_anomaly:  bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub score:       Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
  pub method:             AnomalyMethod,
  pub total_days:         usize,
  pub anomaly_count:      usize,
  pub anomaly_percentage: f64,
  pub days:               Vec<AnomalyDay>,
}

impl AnomalyReport {
  pub fn anomalies(&self) -> impl Iterator<Item = &AnomalyDay> {
    self.days.iter().filter(|d| d.is_anomaly)
  }
}

pub struct AnomalyEngine {
  config: AnomalyConfig,
}

impl AnomalyEngine {
  pub fn new(config: AnomalyConfig) -> Self { Self { config } }

  pub fn detect(
    &self,
    series: &DailySeries,
  ) -> Result<AnomalyReport, ComputationError> {
    if series.is_empty() {
      return Err(ComputationError::InsufficientData {
        what:   "days",
        needed: 1,
        got:    0,
      });
    }
    let detector = self.config.detector();
    let Detection { flags, scores } = detector.detect(&series.values);

    let days: Vec<AnomalyDay> = series
      .dates
      .iter()
      .zip(&series.values)
      .enumerate()
      .map(|(i, (&date, &value))| AnomalyDay {
        date,
        total_sales: round2(value),
        is_anomaly: flags[i],
        score: scores.as_ref().map(|s| round4(s[i])),
      })
      .collect();

    let anomaly_count = flags.iter().filter(|&&f| f).count();
    let anomaly_percentage = anomaly_count as f64 / days.len() as f64 * 100.0;
    info!(
      method = detector.name(),
      anomaly_count,
      total_days = days.len(),
      anomaly_percentage = round2(anomaly_percentage),
      "anomaly detection complete"
    );

    Ok(AnomalyReport {
      method: self.config.method,
      total_days: days.len(),
      anomaly_count,
      anomaly_percentage: round2(anomaly_percentage),
      days,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  /// 30 ordinary days around 1 000 and a 10× spike on day 17.
  fn spiked() -> DailySeries {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let values: Vec<f64> = (0..31)
      .map(|i| if i == 17 { 10_000.0 } else { 1_000.0 + (i % 5) as f64 * 10.0 })
      .collect();
    DailySeries {
      dates: (0..31).map(|i| start + Duration::days(i)).collect(),
      values,
    }
  }

  fn run(method: AnomalyMethod) -> AnomalyReport {
    AnomalyEngine::new(AnomalyConfig { method, ..Default::default() })
      .detect(&spiked())
      .unwrap()
  }

  #[test]
  fn iqr_flags_spike_only() {
    let series = spiked();
    let report = run(AnomalyMethod::Iqr);
    let (m, sd) = (mean(&series.values), sample_std(&series.values));
    assert!(report.days[17].is_anomaly);
    for (day, v) in report.days.iter().zip(&series.values) {
      if (v - m).abs() <= sd {
        assert!(!day.is_anomaly, "{} flagged", day.date);
      }
    }
    assert_eq!(report.anomaly_count, 1);
    assert_eq!(report.anomaly_percentage, 3.23);
  }

  #[test]
  fn zscore_flags_spike_only() {
    let report = run(AnomalyMethod::Zscore);
    let flagged: Vec<NaiveDate> = report.anomalies().map(|d| d.date).collect();
    assert_eq!(flagged, vec![report.days[17].date]);
    assert!(report.days[17].score.unwrap() > 3.0);
  }

  #[test]
  fn isolation_forest_scores_spike_highest() {
    let report = run(AnomalyMethod::IsolationForest);
    assert!(report.days[17].is_anomaly);
    assert!(report.anomaly_count <= 3);
    let top = report
      .days
      .iter()
      .max_by(|a, b| a.score.unwrap().total_cmp(&b.score.unwrap()))
      .unwrap();
    assert_eq!(top.date, report.days[17].date);
  }

  #[test]
  fn isolation_forest_is_deterministic() {
    let d = IsolationForestDetector::default();
    let values = spiked().values;
    assert_eq!(d.scores(&values), d.scores(&values));
  }

  #[test]
  fn constant_series_has_no_outliers() {
    let flat = vec![5.0; 10];
    assert!(ZScoreDetector::default().detect(&flat).flags.iter().all(|f| !f));
    assert!(IqrDetector::default().detect(&flat).flags.iter().all(|f| !f));
  }

  #[test]
  fn empty_series_is_insufficient() {
    let err = AnomalyEngine::new(AnomalyConfig::default())
      .detect(&DailySeries::default())
      .unwrap_err();
    assert!(matches!(err, ComputationError::InsufficientData { .. }));
  }

  #[test]
  fn unknown_method_is_rejected() {
    let err = "lof".parse::<AnomalyMethod>().unwrap_err();
    assert!(err.to_string().contains("isolation_forest, zscore, iqr"));
  }
}
