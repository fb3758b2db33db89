//! JSON REST API for Mercato.
//!
//! Exposes an axum [`Router`] backed by any [`FactStore`]. TLS, CORS and
//! authentication are the caller's responsibility.
//!
//! Successful responses are `{"status":"success","data":..}`; failures are
//! `{"status":"error","message":..}` (see [`ApiError`]).

pub mod analytics;
pub mod dashboard;
pub mod error;
pub mod fit;
pub mod sales;
pub mod validate;

use axum::{Json, Router, routing::get};
use mercato_core::{accessor::FactStore, service::Analytics};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Row limits for listing endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Limits {
  pub default_limit: usize,
  pub max_limit:     usize,
}

impl Default for Limits {
  fn default() -> Self { Self { default_limit: 100, max_limit: 1000 } }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub analytics: Analytics<S>,
  pub limits:    Limits,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { analytics: self.analytics.clone(), limits: self.limits }
  }
}

// ─── Envelope ─────────────────────────────────────────────────────────────────

/// The `{"status":"success","data":..}` wrapper of every successful response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  pub status: &'static str,
  pub data:   T,
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
  Ok(Json(Envelope { status: "success", data }))
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: FactStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Sales
    .route("/api/sales", get(sales::list::<S>))
    .route("/api/sales/summary", get(sales::summary::<S>))
    .route("/api/sales/metrics", get(sales::metrics::<S>))
    .route("/api/sales/recent-summary", get(sales::recent_summary::<S>))
    .route("/api/sales/stores", get(sales::stores::<S>))
    .route("/api/sales/stores/{id}", get(sales::store::<S>))
    .route("/api/sales/departments", get(sales::departments::<S>))
    .route("/api/sales/departments/{id}", get(sales::department::<S>))
    // Analytics
    .route("/api/analytics/kpis", get(analytics::kpis::<S>))
    .route("/api/analytics/growth", get(analytics::growth::<S>))
    .route("/api/analytics/growth/yoy", get(analytics::growth_yoy::<S>))
    .route("/api/analytics/holiday", get(analytics::holiday::<S>))
    .route("/api/analytics/promotions", get(analytics::promotions::<S>))
    .route("/api/analytics/store-performance", get(analytics::store_performance::<S>))
    .route(
      "/api/analytics/store-type-performance",
      get(analytics::store_type_performance::<S>),
    )
    .route("/api/analytics/time-series", get(analytics::time_series::<S>))
    .route("/api/analytics/top-performers", get(analytics::top_performers::<S>))
    .route("/api/analytics/department-growth", get(analytics::department_growth::<S>))
    .route("/api/analytics/seasonality", get(analytics::seasonality::<S>))
    .route("/api/analytics/correlation", get(analytics::correlation::<S>))
    .route("/api/analytics/segments", get(analytics::segments::<S>))
    .route("/api/analytics/forecast", get(analytics::forecast::<S>))
    .route("/api/analytics/anomalies", get(analytics::anomalies::<S>))
    .route("/api/analytics/report", get(analytics::report::<S>))
    // Dashboard
    .route("/api/dashboard/categories", get(dashboard::categories::<S>))
    .route("/api/dashboard/regions", get(dashboard::regions::<S>))
    .fallback(not_found)
    .with_state(state)
}

/// `GET /health`
async fn health() -> Json<Value> {
  Json(json!({ "status": "healthy", "service": "mercato" }))
}

async fn not_found() -> ApiError { ApiError::NotFound("Resource not found".into()) }

#[cfg(test)]
mod tests;
