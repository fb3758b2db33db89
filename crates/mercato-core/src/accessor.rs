//! The `FactStore` trait: read access to stores, departments and sales facts.
//!
//! Implemented by storage backends (e.g. `mercato-store-sqlite`). The
//! analytics service and the HTTP layer depend on this abstraction, never on
//! a concrete backend.

use std::future::Future;

use crate::{
  entity::{Department, DeptId, Store, StoreId},
  filter::{DateRange, GroupAggregate, GroupKey, SalesFilter},
  sale::{Dataset, SaleRow, SalesFact},
};

/// Abstraction over a sales fact store backend.
///
/// Apart from [`FactStore::bulk_load`], which seeds an empty store, every
/// method is a read. All methods return `Send` futures so the trait can be
/// used from a multi-threaded runtime behind axum.
pub trait FactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reference data ────────────────────────────────────────────────────

  /// All stores, ordered by id.
  fn list_stores(
    &self,
  ) -> impl Future<Output = Result<Vec<Store>, Self::Error>> + Send + '_;

  /// A store by id. Returns `None` if not found.
  fn get_store(
    &self,
    id: StoreId,
  ) -> impl Future<Output = Result<Option<Store>, Self::Error>> + Send + '_;

  /// All departments, ordered by id.
  fn list_departments(
    &self,
  ) -> impl Future<Output = Result<Vec<Department>, Self::Error>> + Send + '_;

  /// A department by id. Returns `None` if not found.
  fn get_department(
    &self,
    id: DeptId,
  ) -> impl Future<Output = Result<Option<Department>, Self::Error>> + Send + '_;

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Every fact matching `filter`, ordered by date then `sale_id`.
  fn facts(
    &self,
    filter: SalesFilter,
  ) -> impl Future<Output = Result<Vec<SalesFact>, Self::Error>> + Send + '_;

  /// Earliest and latest fact dates matching `filter`; `None` when nothing
  /// matches.
  fn date_bounds(
    &self,
    filter: SalesFilter,
  ) -> impl Future<Output = Result<Option<DateRange>, Self::Error>> + Send + '_;

  /// Facts matching `filter` joined with store and department names, newest
  /// first, at most `limit` rows.
  fn list_sales(
    &self,
    filter: SalesFilter,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<SaleRow>, Self::Error>> + Send + '_;

  /// Sums, averages and counts of the matching facts grouped by `key`.
  /// Groups are ordered by key ascending.
  fn aggregate(
    &self,
    filter: SalesFilter,
    key: GroupKey,
  ) -> impl Future<Output = Result<Vec<GroupAggregate>, Self::Error>> + Send + '_;

  // ── Loading ───────────────────────────────────────────────────────────

  /// Insert a whole dataset atomically after validating it. Returns the
  /// number of facts written.
  fn bulk_load(
    &self,
    dataset: Dataset,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
