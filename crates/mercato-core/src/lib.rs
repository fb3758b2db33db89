//! Domain types, the fact store abstraction, and the analytical engines of
//! the Mercato retail analytics backend.
//!
//! This crate is deliberately free of HTTP and database dependencies. Every
//! engine is a pure function (or a small struct holding explicit
//! configuration) over a slice of [`sale::SalesFact`]s.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod accessor;
pub mod anomaly;
pub mod config;
pub mod correlation;
pub mod entity;
pub mod error;
pub mod filter;
pub mod forecast;
pub mod metrics;
pub mod partial;
pub mod report;
pub mod sale;
pub mod seasonality;
pub mod segmentation;
pub mod series;
pub mod service;
pub mod stats;
pub mod synthetic;

pub use error::{ComputationError, Error, Result};
