//! Error types for `mercato-core`.
//!
//! [`Error`] is what the accessor and the analytics service return.
//! [`ComputationError`] is the narrower failure of a single analytical engine;
//! callers usually fold it into a [`Partial`](crate::partial::Partial) rather
//! than propagating it.

use thiserror::Error;

use crate::entity::{DeptId, StoreId};

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or out-of-range input. Never reaches an engine.
  #[error("{0}")]
  Validation(String),

  #[error("store not found: {0}")]
  StoreNotFound(StoreId),

  #[error("department not found: {0}")]
  DepartmentNotFound(DeptId),

  #[error("computation failed: {0}")]
  Computation(#[from] ComputationError),

  /// Failure inside the backing fact store.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

  /// Rejection of an unrecognised enumeration value, listing what is allowed.
  pub fn invalid_choice(field: &str, value: &str, allowed: &[&str]) -> Self {
    Self::Validation(format!(
      "Invalid {field} value {value:?}. Must be one of: {}",
      allowed.join(", ")
    ))
  }
}

/// Model-fitting or clustering failure caused by insufficient or degenerate
/// data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
  #[error("insufficient data: need at least {needed} {what}, got {got}")]
  InsufficientData {
    what:   &'static str,
    needed: usize,
    got:    usize,
  },

  #[error("all features have zero variance")]
  ZeroVariance,

  #[error("degenerate series: {0}")]
  DegenerateSeries(String),

  #[error("model fitting timed out after {0} ms")]
  Timeout(u64),

  /// The worker running the computation stopped before producing a result.
  #[error("computation aborted: {0}")]
  Aborted(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
