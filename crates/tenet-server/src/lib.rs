//! HTTP server assembly for tenet.
//!
//! Configuration types and router construction live here so the
//! integration tests can drive the full HTTP surface without binding a
//! socket; `main.rs` only parses the CLI, reads config, and serves.

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use serde::Deserialize;
use tenet_core::{
  fact::{CategorySet, DEFAULT_CATEGORIES},
  store::FactStore,
};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Which storage backend the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  /// In-process map; state is lost on shutdown.
  Memory,
  /// SQLite file at `store_path`.
  #[default]
  Sqlite,
}

/// Runtime server configuration, deserialised from `config.toml` and the
/// `TENET_` environment.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:              String,
  #[serde(default = "default_port")]
  pub port:              u16,
  #[serde(default)]
  pub backend:           Backend,
  #[serde(default = "default_store_path")]
  pub store_path:        PathBuf,
  /// Replaces the default category catalog wholesale when set.
  #[serde(default)]
  pub categories:        Option<Vec<String>>,
  /// Whether fact validation reports a missing category.
  #[serde(default = "default_true")]
  pub category_required: bool,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 3042 }
fn default_store_path() -> PathBuf { PathBuf::from("tenet.db") }
fn default_true() -> bool { true }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:              default_host(),
      port:              default_port(),
      backend:           Backend::default(),
      store_path:        default_store_path(),
      categories:        None,
      category_required: true,
    }
  }
}

impl ServerConfig {
  /// The category set this deployment accepts.
  pub fn category_set(&self) -> CategorySet {
    match &self.categories {
      Some(names) => {
        CategorySet::new(names.iter().cloned(), self.category_required)
      }
      None => CategorySet::new(
        DEFAULT_CATEGORIES.iter().copied(),
        self.category_required,
      ),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete application router: the JSON API under `/api`,
/// with per-request tracing.
pub fn app<S>(store: Arc<S>, categories: CategorySet) -> Router
where
  S: FactStore + 'static,
{
  Router::new()
    .nest("/api", tenet_api::api_router(store, categories))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
