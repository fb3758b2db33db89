//! Router tests driving every layer against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode},
};
use chrono::NaiveDate;
use mercato_core::{
  accessor::FactStore,
  config::AnalyticsConfig,
  service::Analytics,
  synthetic::{self, GeneratorConfig},
};
use mercato_store_sqlite::SqliteStore;
use serde_json::Value;
use tower::ServiceExt as _;

use crate::{AppState, Limits, router};

const WEEKS: usize = 40;

async fn empty_state() -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState {
    analytics: Analytics::new(Arc::new(store), AnalyticsConfig::default()),
    limits:    Limits::default(),
  }
}

async fn loaded_state() -> AppState<SqliteStore> {
  let state = empty_state().await;
  let data = synthetic::generate(&GeneratorConfig {
    start: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
    weeks: WEEKS,
    seed:  42,
  });
  state.analytics.store().bulk_load(data).await.unwrap();
  state
}

async fn get(state: AppState<SqliteStore>, uri: &str) -> (StatusCode, Value) {
  let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
  let resp = router(state).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, body)
}

// ── Plumbing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_ok() {
  let (status, body) = get(empty_state().await, "/health").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn unknown_route_is_enveloped_404() {
  let (status, body) = get(empty_state().await, "/api/nope").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["status"], "error");
  assert_eq!(body["message"], "Resource not found");
}

// ── Sales ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_sales_respects_limit() {
  let (status, body) = get(loaded_state().await, "/api/sales?limit=5&store_id=3").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "success");
  let rows = body["data"].as_array().unwrap();
  assert_eq!(rows.len(), 5);
  assert!(rows.iter().all(|r| r["store_id"] == 3));
  assert_eq!(rows[0]["store_name"], "Store C");
}

#[tokio::test]
async fn limit_out_of_range_is_rejected() {
  let state = loaded_state().await;
  let (status, body) = get(state.clone(), "/api/sales?limit=0").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["status"], "error");
  let (status, _) = get(state, "/api/sales?limit=5000").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn store_lookup_statuses() {
  let state = loaded_state().await;
  let (status, body) = get(state.clone(), "/api/sales/stores/4").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["name"], "Store D");
  assert_eq!(body["data"]["type"], "Supercenter");

  let (status, body) = get(state.clone(), "/api/sales/stores/99").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["message"], "Store not found");

  let (status, _) = get(state, "/api/sales/stores/abc").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn summary_rejects_unknown_grouping() {
  let (status, body) =
    get(loaded_state().await, "/api/sales/summary?group_by=colour").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  let msg = body["message"].as_str().unwrap();
  assert!(msg.contains("Must be one of"), "{msg}");
  assert!(msg.contains("store_type"), "{msg}");
}

#[tokio::test]
async fn summary_by_region_covers_every_fact() {
  let (status, body) =
    get(loaded_state().await, "/api/sales/summary?group_by=region").await;
  assert_eq!(status, StatusCode::OK);
  let groups = body["data"].as_array().unwrap();
  assert_eq!(groups.len(), 4);
  let records: u64 = groups.iter().map(|g| g["record_count"].as_u64().unwrap()).sum();
  assert_eq!(records, (WEEKS * 100) as u64);
}

// ── Analytics ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn kpis_validate_inputs() {
  let state = loaded_state().await;
  let (status, _) = get(
    state.clone(),
    "/api/analytics/kpis?start_date=2024-03-01&end_date=2024-02-01",
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = get(state.clone(), "/api/analytics/kpis?start_date=March").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = get(state, "/api/analytics/kpis?dept_id=42").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn kpis_over_everything() {
  let (status, body) = get(loaded_state().await, "/api/analytics/kpis").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["store_count"], 10);
  assert_eq!(body["data"]["dept_count"], 10);
  assert_eq!(body["data"]["transaction_count"], (WEEKS * 100) as u64);
  assert!(body["data"].get("sales_growth").is_none());
}

#[tokio::test]
async fn growth_requires_a_range() {
  let state = loaded_state().await;
  let (status, _) = get(state.clone(), "/api/analytics/growth").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = get(
    state,
    "/api/analytics/growth?start_date=2024-06-01&end_date=2024-06-30",
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["previous"]["start"], "2024-05-02");
  assert_eq!(body["data"]["kind"], "period_over_period");
}

#[tokio::test]
async fn top_departments_are_ranked() {
  let (status, body) = get(
    loaded_state().await,
    "/api/analytics/top-performers?type=department&limit=3",
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let rows = body["data"].as_array().unwrap();
  assert_eq!(rows.len(), 3);
  let totals: Vec<f64> = rows.iter().map(|r| r["total_sales"].as_f64().unwrap()).collect();
  assert!(totals.windows(2).all(|w| w[0] >= w[1]));
  assert_eq!(rows[0]["dept_name"], "Grocery");
}

#[tokio::test]
async fn top_performers_default_to_five() {
  let (status, body) = get(loaded_state().await, "/api/analytics/top-performers").await;
  assert_eq!(status, StatusCode::OK);
  let rows = body["data"].as_array().unwrap();
  assert_eq!(rows.len(), 5);
  assert!(rows[0].get("store_id").is_some());
}

#[tokio::test]
async fn promotions_split_every_fact() {
  let state = loaded_state().await;
  let (status, body) = get(state.clone(), "/api/analytics/promotions").await;
  assert_eq!(status, StatusCode::OK);
  let data = &body["data"];
  let promoted = data["promoted_count"].as_u64().unwrap();
  let baseline = data["baseline_count"].as_u64().unwrap();
  assert!(promoted > 0);
  assert_eq!(promoted + baseline, (WEEKS * 100) as u64);
  assert_eq!(data["departments"].as_array().unwrap().len(), 10);
  assert!(data["departments"][0].get("uplift_pct").is_some());

  let (status, _) = get(state, "/api/analytics/promotions?store_id=99").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn seasonality_of_an_empty_window_is_an_empty_list() {
  let (status, body) = get(
    loaded_state().await,
    "/api/analytics/seasonality?start_date=2030-01-01&end_date=2030-12-31",
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"], serde_json::json!([]));
}

#[tokio::test]
async fn segments_bound_k() {
  let state = loaded_state().await;
  let (status, _) = get(state.clone(), "/api/analytics/segments?k=25").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = get(state, "/api/analytics/segments?k=3").await;
  assert_eq!(status, StatusCode::OK);
  assert!(body["data"]["k"].as_u64().unwrap() <= 3);
  assert_eq!(body["data"]["assignments"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn anomalies_by_iqr() {
  let (status, body) =
    get(loaded_state().await, "/api/analytics/anomalies?method=iqr").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["method"], "iqr");
  assert_eq!(body["data"]["total_days"], WEEKS as u64);
}

#[tokio::test]
async fn forecast_on_empty_store_is_unprocessable() {
  let (status, body) = get(empty_state().await, "/api/analytics/forecast").await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["message"].as_str().unwrap().contains("insufficient data"));
}

#[tokio::test]
async fn report_keeps_sections_independent() {
  let (status, body) = get(empty_state().await, "/api/analytics/report").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "success");
  assert_eq!(body["data"]["kpis"]["total_sales"], 0.0);
  for section in ["seasonality", "correlations", "segments", "forecast", "anomalies"] {
    assert_eq!(body["data"][section]["status"], "failed", "{section}");
  }

  let (status, body) = get(loaded_state().await, "/api/analytics/report").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["kpis"]["store_count"], 10);
  assert_eq!(body["data"]["seasonality"]["status"], "success");
  assert_eq!(body["data"]["anomalies"]["status"], "success");
}

// ── Dashboard ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn category_breakdown_is_descending() {
  let (status, body) = get(loaded_state().await, "/api/dashboard/categories").await;
  assert_eq!(status, StatusCode::OK);
  let rows = body["data"].as_array().unwrap();
  assert_eq!(rows[0]["name"], "Food");
  let totals: Vec<f64> = rows.iter().map(|r| r["total_sales"].as_f64().unwrap()).collect();
  assert!(totals.windows(2).all(|w| w[0] >= w[1]));
}
