//! Reference data: stores and departments.
//!
//! Both are immutable once loaded. Every sales fact references exactly one of
//! each by its integer id.

use serde::{Deserialize, Serialize};

pub type StoreId = i64;
pub type DeptId = i64;

/// A physical store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
  pub store_id:   StoreId,
  pub name:       String,
  /// Categorical region, e.g. "North".
  pub region:     String,
  pub size_sqft:  i64,
  /// Store format, e.g. "Supercenter", "Discount", "Neighborhood".
  #[serde(rename = "type")]
  pub store_type: String,
}

/// A department; the same department ids are shared by every store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
  pub dept_id:  DeptId,
  pub name:     String,
  /// Grouping of departments, e.g. "Food", "Apparel".
  pub category: String,
}

/// Which kind of reference entity an aggregate or segmentation is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  Store,
  Department,
}

impl EntityKind {
  pub const ALLOWED: &'static [&'static str] = &["store", "department"];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Store => "store",
      Self::Department => "department",
    }
  }
}

impl std::str::FromStr for EntityKind {
  type Err = crate::Error;

  fn from_str(s: &str) -> crate::Result<Self> {
    match s {
      "store" => Ok(Self::Store),
      "department" => Ok(Self::Department),
      other => Err(crate::Error::invalid_choice("type", other, Self::ALLOWED)),
    }
  }
}
