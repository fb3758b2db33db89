//! Sales facts: one row per store × department × week.
//!
//! Facts are append-only. The core never mutates or deletes them; it only
//! reads and derives aggregates.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  entity::{Department, DeptId, Store, StoreId},
};

// ─── SalesFact ───────────────────────────────────────────────────────────────

/// A single observed weekly sales figure with its exogenous covariates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesFact {
  /// Monotonically assigned by the store on load.
  pub sale_id:      i64,
  pub store_id:     StoreId,
  pub dept_id:      DeptId,
  /// Serialised as `YYYY-MM-DD`.
  pub date:         NaiveDate,
  /// Non-negative currency amount.
  pub weekly_sales: f64,
  pub is_holiday:   bool,
  pub temperature:  f64,
  pub fuel_price:   f64,
  /// Promotional markdown percentage in `[0, 100]`; 0 when none applied.
  pub markdown:     f64,
  pub cpi:          f64,
  pub unemployment: f64,
}

impl SalesFact {
  /// Whether a promotional markdown applied to this week.
  pub fn is_promoted(&self) -> bool { self.markdown > 0.0 }
}

/// A fact joined with the names of the store and department it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRow {
  #[serde(flatten)]
  pub fact:       SalesFact,
  pub store_name: String,
  pub dept_name:  String,
}

// ─── NewSale ─────────────────────────────────────────────────────────────────

/// Input to [`crate::accessor::FactStore::bulk_load`]; `sale_id` is always
/// assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSale {
  pub store_id:     StoreId,
  pub dept_id:      DeptId,
  pub date:         NaiveDate,
  pub weekly_sales: f64,
  pub is_holiday:   bool,
  pub temperature:  f64,
  pub fuel_price:   f64,
  pub markdown:     f64,
  pub cpi:          f64,
  pub unemployment: f64,
}

impl NewSale {
  /// Convenience constructor with neutral covariates.
  pub fn new(
    store_id: StoreId,
    dept_id: DeptId,
    date: NaiveDate,
    weekly_sales: f64,
  ) -> Self {
    Self {
      store_id,
      dept_id,
      date,
      weekly_sales,
      is_holiday: false,
      temperature: 0.0,
      fuel_price: 0.0,
      markdown: 0.0,
      cpi: 0.0,
      unemployment: 0.0,
    }
  }

  pub fn into_fact(self, sale_id: i64) -> SalesFact {
    SalesFact {
      sale_id,
      store_id: self.store_id,
      dept_id: self.dept_id,
      date: self.date,
      weekly_sales: self.weekly_sales,
      is_holiday: self.is_holiday,
      temperature: self.temperature,
      fuel_price: self.fuel_price,
      markdown: self.markdown,
      cpi: self.cpi,
      unemployment: self.unemployment,
    }
  }
}

// ─── Dataset ─────────────────────────────────────────────────────────────────

/// Everything a data source hands to the store in one bulk load.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
  pub stores:      Vec<Store>,
  pub departments: Vec<Department>,
  pub sales:       Vec<NewSale>,
}

impl Dataset {
  /// Check referential integrity and value ranges before anything is written.
  pub fn validate(&self) -> Result<()> {
    let mut store_ids = HashSet::with_capacity(self.stores.len());
    for store in &self.stores {
      if store.store_id <= 0 {
        return Err(Error::validation(format!(
          "store id must be positive, got {}",
          store.store_id
        )));
      }
      if !store_ids.insert(store.store_id) {
        return Err(Error::validation(format!(
          "duplicate store id {}",
          store.store_id
        )));
      }
    }

    let mut dept_ids = HashSet::with_capacity(self.departments.len());
    for dept in &self.departments {
      if dept.dept_id <= 0 {
        return Err(Error::validation(format!(
          "department id must be positive, got {}",
          dept.dept_id
        )));
      }
      if !dept_ids.insert(dept.dept_id) {
        return Err(Error::validation(format!(
          "duplicate department id {}",
          dept.dept_id
        )));
      }
    }

    for sale in &self.sales {
      if !store_ids.contains(&sale.store_id) {
        return Err(Error::StoreNotFound(sale.store_id));
      }
      if !dept_ids.contains(&sale.dept_id) {
        return Err(Error::DepartmentNotFound(sale.dept_id));
      }
      if sale.weekly_sales.is_nan() || sale.weekly_sales < 0.0 {
        return Err(Error::validation(format!(
          "weekly_sales must be non-negative, got {} on {}",
          sale.weekly_sales, sale.date
        )));
      }
      if !(0.0..=100.0).contains(&sale.markdown) {
        return Err(Error::validation(format!(
          "markdown must be within [0, 100], got {} on {}",
          sale.markdown, sale.date
        )));
      }
    }

    Ok(())
  }
}
