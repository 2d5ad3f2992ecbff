//! HTTP server wiring for Popcorn.
//!
//! Mounts the [`popcorn_api`] router under `/api`, backed by the SQLite
//! store and a filesystem [`content::FsContentStore`].

pub mod content;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use popcorn_core::store::MovieStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use content::FsContentStore;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `POPCORN_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:         String,
  pub port:         u16,
  pub store_path:   PathBuf,
  /// Directory uploaded images are written below.
  pub content_root: PathBuf,
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// The configuration with `~` expanded in every path.
  pub fn expanded(mut self) -> Self {
    self.store_path = expand_tilde(&self.store_path);
    self.content_root = expand_tilde(&self.content_root);
    self
  }
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

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application router: the API under `/api`, with request tracing.
pub fn router<S>(store: Arc<S>) -> Router
where
  S: MovieStore + 'static,
{
  Router::new()
    .nest("/api", popcorn_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
