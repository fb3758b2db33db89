//! Error type for `mercato-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] mercato_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date parse error: {0}")]
  DateParse(String),

  /// `bulk_load` only seeds a store that holds no facts yet.
  #[error("store already holds {0} sales facts")]
  NotEmpty(u64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
