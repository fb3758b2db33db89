//! The composite report: KPIs plus every analytical engine over one fact set.
//!
//! Each engine section is an independent [`Partial`]; a forecast that cannot
//! be fitted leaves seasonality, correlations, segments and anomalies intact.

use serde::{Deserialize, Serialize};

use crate::{
  anomaly::{AnomalyConfig, AnomalyEngine, AnomalyReport},
  config::AnalyticsConfig,
  correlation::{Correlation, correlations},
  entity::{Department, EntityKind, Store},
  error::ComputationError,
  filter::DateRange,
  forecast::{Forecast, ForecastConfig, ForecastEngine},
  metrics::{Kpis, kpis},
  partial::Partial,
  sale::SalesFact,
  seasonality::{Dimension, SeasonalIndex, seasonality_index},
  segmentation::{EntityFeatures, Segmentation, SegmentationConfig, SegmentationEngine},
  series::DailySeries,
};

/// Everything the engines need, fetched from the store up front so the
/// sections can run without further I/O.
#[derive(Debug, Clone, Default)]
pub struct ReportInputs {
  pub facts:       Vec<SalesFact>,
  pub stores:      Vec<Store>,
  pub departments: Vec<Department>,
  /// The requested date range, when both ends were given.
  pub range:       Option<DateRange>,
  /// Facts of the equal-length window before `range`.
  pub previous:    Option<Vec<SalesFact>>,
}

impl ReportInputs {
  pub fn kpis(&self) -> Kpis { kpis(&self.facts, self.previous.as_deref()) }

  pub fn seasonality(
    &self,
    dimension: Dimension,
  ) -> Result<Vec<SeasonalIndex>, ComputationError> {
    if self.facts.is_empty() {
      return Err(ComputationError::InsufficientData {
        what:   "facts",
        needed: 1,
        got:    0,
      });
    }
    Ok(seasonality_index(&self.facts, dimension))
  }

  pub fn correlations(&self) -> Result<Vec<Correlation>, ComputationError> {
    if self.facts.len() < 2 {
      return Err(ComputationError::InsufficientData {
        what:   "facts",
        needed: 2,
        got:    self.facts.len(),
      });
    }
    Ok(correlations(&self.facts))
  }

  pub fn entity_features(&self, kind: EntityKind) -> Vec<EntityFeatures> {
    EntityFeatures::from_facts(kind, &self.facts, &self.stores, &self.departments)
  }

  pub fn segments(
    &self,
    kind: EntityKind,
    config: SegmentationConfig,
  ) -> Result<Segmentation, ComputationError> {
    SegmentationEngine::new(config).segment(&self.entity_features(kind))
  }

  pub fn daily_series(&self) -> DailySeries { DailySeries::from_facts(&self.facts) }

  pub fn forecast(&self, config: ForecastConfig) -> Result<Forecast, ComputationError> {
    ForecastEngine::new(config).forecast(&self.daily_series())
  }

  pub fn anomalies(
    &self,
    config: AnomalyConfig,
  ) -> Result<AnomalyReport, ComputationError> {
    AnomalyEngine::new(config).detect(&self.daily_series())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
  pub kpis:         Kpis,
  pub seasonality:  Partial<Vec<SeasonalIndex>>,
  pub correlations: Partial<Vec<Correlation>>,
  pub segments:     Partial<Segmentation>,
  pub forecast:     Partial<Forecast>,
  pub anomalies:    Partial<AnomalyReport>,
}

impl Report {
  /// Run every section in turn on the current thread. Stores are the
  /// segmented entity; seasonality is by month.
  pub fn build(inputs: &ReportInputs, config: &AnalyticsConfig) -> Self {
    Self {
      kpis:         inputs.kpis(),
      seasonality:  Partial::section(
        "seasonality",
        inputs.seasonality(Dimension::Month),
      ),
      correlations: Partial::section("correlations", inputs.correlations()),
      segments:     Partial::section(
        "segments",
        inputs.segments(EntityKind::Store, config.segmentation(None)),
      ),
      forecast:     Partial::section(
        "forecast",
        inputs.forecast(config.forecast(None, None)),
      ),
      anomalies:    Partial::section(
        "anomalies",
        inputs.anomalies(config.anomaly(None, None)),
      ),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, NaiveDate};

  use super::*;
  use crate::sale::NewSale;

  fn store(id: i64) -> Store {
    Store {
      store_id:   id,
      name:       format!("Store {id}"),
      region:     "North".into(),
      size_sqft:  100_000,
      store_type: "Discount".into(),
    }
  }

  #[test]
  fn one_failing_section_keeps_the_others() {
    // Three days of data: too short for any forecast model, but enough for
    // seasonality, correlations and anomaly detection.
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let facts: Vec<SalesFact> = (0..3)
      .flat_map(|d| {
        [1, 2, 3].map(move |s| {
          let mut sale = NewSale::new(
            s,
            1,
            start + Duration::days(d),
            100.0 * s as f64 + d as f64,
          );
          sale.temperature = 50.0 + d as f64;
          sale
        })
      })
      .enumerate()
      .map(|(i, s)| s.into_fact(i as i64 + 1))
      .collect();

    let inputs = ReportInputs {
      facts,
      stores: vec![store(1), store(2), store(3)],
      ..Default::default()
    };
    let report = Report::build(&inputs, &AnalyticsConfig::default());

    assert!(!report.forecast.is_success());
    assert!(report.seasonality.is_success());
    assert!(report.correlations.is_success());
    assert!(report.segments.is_success());
    assert!(report.anomalies.is_success());
    assert_eq!(report.kpis.transaction_count, 9);
  }

  #[test]
  fn empty_inputs_fail_every_section_but_kpis() {
    let report = Report::build(&ReportInputs::default(), &AnalyticsConfig::default());
    assert_eq!(report.kpis.total_sales, 0.0);
    assert!(!report.seasonality.is_success());
    assert!(!report.correlations.is_success());
    assert!(!report.segments.is_success());
    assert!(!report.forecast.is_success());
    assert!(!report.anomalies.is_success());
  }
}
