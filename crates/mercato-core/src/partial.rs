//! Recovered engine failures.
//!
//! A [`Partial`] is what a composite response carries for each analytical
//! section: either the section's data, or the reason it could not be
//! computed. One failing section never hides the others.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ComputationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Partial<T> {
  Success { data: T },
  Failed { reason: String },
}

impl<T> Partial<T> {
  /// Fold an engine result into a section, logging the failure.
  pub fn section(name: &str, result: Result<T, ComputationError>) -> Self {
    match result {
      Ok(data) => Self::Success { data },
      Err(e) => {
        warn!(section = name, error = %e, "analysis section failed");
        Self::Failed { reason: e.to_string() }
      }
    }
  }

  pub fn is_success(&self) -> bool { matches!(self, Self::Success { .. }) }

  pub fn data(&self) -> Option<&T> {
    match self {
      Self::Success { data } => Some(data),
      Self::Failed { .. } => None,
    }
  }
}

impl<T> From<Result<T, ComputationError>> for Partial<T> {
  fn from(result: Result<T, ComputationError>) -> Self {
    Self::section("unnamed", result)
  }
}
