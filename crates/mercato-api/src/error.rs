//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure renders as `{"status":"error","message":..}`. Store
//! failures are logged in full and reported with a generic message.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use mercato_core::ComputationError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  Validation(String),

  #[error("{0}")]
  NotFound(String),

  /// An engine could not produce a result from the selected data.
  #[error("{0}")]
  Computation(ComputationError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }
}

impl From<mercato_core::Error> for ApiError {
  fn from(e: mercato_core::Error) -> Self {
    use mercato_core::Error;
    match e {
      Error::Validation(m) => Self::Validation(m),
      Error::StoreNotFound(_) => Self::NotFound("Store not found".into()),
      Error::DepartmentNotFound(_) => Self::NotFound("Department not found".into()),
      Error::Computation(c) => Self::Computation(c),
      Error::Store(e) => Self::Store(e),
    }
  }
}

impl From<ComputationError> for ApiError {
  fn from(e: ComputationError) -> Self { Self::Computation(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Computation(e @ ComputationError::Timeout(_)) => {
        (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
      }
      ApiError::Computation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
      ApiError::Store(e) => {
        error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_owned())
      }
    };
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
  }
}
