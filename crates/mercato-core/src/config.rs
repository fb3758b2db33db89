//! Analytics tuning knobs, passed explicitly into every engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
  anomaly::{AnomalyConfig, AnomalyMethod},
  forecast::{ForecastConfig, ForecastMethod},
  segmentation::SegmentationConfig,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
  /// Default `k` for segmentation.
  pub clusters:         usize,
  /// Seed for k-means and the isolation forest.
  pub seed:             u64,
  pub max_iterations:   usize,
  pub forecast_periods: usize,
  pub forecast_method:  ForecastMethod,
  pub season_length:    usize,
  pub contamination:    f64,
  pub anomaly_method:   AnomalyMethod,
  /// Upper bound on a single model fit when run behind the API.
  pub fit_timeout_ms:   u64,
}

impl Default for AnalyticsConfig {
  fn default() -> Self {
    Self {
      clusters:         4,
      seed:             42,
      max_iterations:   300,
      forecast_periods: 30,
      forecast_method:  ForecastMethod::HoltWinters,
      season_length:    7,
      contamination:    0.05,
      anomaly_method:   AnomalyMethod::IsolationForest,
      fit_timeout_ms:   10_000,
    }
  }
}

impl AnalyticsConfig {
  pub fn segmentation(&self, k: Option<usize>) -> SegmentationConfig {
    SegmentationConfig {
      k: k.unwrap_or(self.clusters),
      seed: self.seed,
      max_iterations: self.max_iterations,
      ..Default::default()
    }
  }

  pub fn forecast(
    &self,
    periods: Option<usize>,
    method: Option<ForecastMethod>,
  ) -> ForecastConfig {
    ForecastConfig {
      periods:       periods.unwrap_or(self.forecast_periods),
      method:        method.unwrap_or(self.forecast_method),
      season_length: self.season_length,
    }
  }

  pub fn anomaly(
    &self,
    method: Option<AnomalyMethod>,
    contamination: Option<f64>,
  ) -> AnomalyConfig {
    AnomalyConfig {
      method:        method.unwrap_or(self.anomaly_method),
      contamination: contamination.unwrap_or(self.contamination),
      seed:          self.seed,
    }
  }

  pub fn fit_timeout(&self) -> Duration { Duration::from_millis(self.fit_timeout_ms) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_keys_take_defaults() {
    let cfg: AnalyticsConfig =
      serde_json::from_str(r#"{ "clusters": 6, "anomaly_method": "iqr" }"#)
        .unwrap();
    assert_eq!(cfg.clusters, 6);
    assert_eq!(cfg.anomaly_method, AnomalyMethod::Iqr);
    assert_eq!(cfg.forecast_method, ForecastMethod::HoltWinters);
    assert_eq!(cfg.fit_timeout(), Duration::from_secs(10));
  }

  #[test]
  fn overrides_win_over_defaults() {
    let cfg = AnalyticsConfig::default();
    assert_eq!(cfg.segmentation(Some(3)).k, 3);
    assert_eq!(cfg.segmentation(None).k, 4);
    let a = cfg.anomaly(Some(AnomalyMethod::Zscore), None);
    assert_eq!(a.method, AnomalyMethod::Zscore);
    assert_eq!(a.contamination, 0.05);
    assert_eq!(cfg.forecast(Some(7), None).periods, 7);
  }
}
