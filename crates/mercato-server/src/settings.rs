//! Runtime configuration, deserialised from `config.toml` layered under
//! `MERCATO_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use mercato_api::Limits;
use mercato_core::config::AnalyticsConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub database_path: PathBuf,
  pub default_limit: usize,
  pub max_limit:     usize,
  pub analytics:     AnalyticsConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let limits = Limits::default();
    Self {
      host:          "127.0.0.1".into(),
      port:          8000,
      database_path: PathBuf::from("mercato.db"),
      default_limit: limits.default_limit,
      max_limit:     limits.max_limit,
      analytics:     AnalyticsConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Read `path` (if it exists) and overlay the environment. Nested keys use
  /// `__`, e.g. `MERCATO_ANALYTICS__CLUSTERS=6`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("MERCATO")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.database_path = expand_tilde(&cfg.database_path);
    anyhow::ensure!(
      cfg.default_limit >= 1 && cfg.default_limit <= cfg.max_limit,
      "default_limit ({}) must be between 1 and max_limit ({})",
      cfg.default_limit,
      cfg.max_limit,
    );
    Ok(cfg)
  }

  pub fn limits(&self) -> Limits {
    Limits { default_limit: self.default_limit, max_limit: self.max_limit }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/mercato.toml")).unwrap();
    assert_eq!(cfg.port, 8000);
    assert_eq!(cfg.limits(), Limits::default());
    assert_eq!(cfg.analytics, AnalyticsConfig::default());
  }

  #[test]
  fn plain_paths_are_untouched() {
    assert_eq!(expand_tilde(Path::new("/var/db")), PathBuf::from("/var/db"));
    assert_eq!(expand_tilde(Path::new("rel.db")), PathBuf::from("rel.db"));
  }
}
