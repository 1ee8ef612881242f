//! tenet-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the
//! configured fact store backend, and serves the JSON API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tenet_core::memory::MemoryStore;
use tenet_server::{Backend, ServerConfig};
use tenet_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "tenet fact server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TENET"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let categories = server_cfg.category_set();

  let app = match server_cfg.backend {
    Backend::Memory => {
      tracing::info!("using in-memory store");
      let store = MemoryStore::new(categories.clone());
      tenet_server::app(Arc::new(store), categories)
    }
    Backend::Sqlite => {
      let store_path = expand_tilde(&server_cfg.store_path);
      tracing::info!("using sqlite store at {store_path:?}");
      let store = SqliteStore::open(&store_path, categories.clone())
        .await
        .with_context(|| format!("failed to open store at {store_path:?}"))?;
      tenet_server::app(Arc::new(store), categories)
    }
  };

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
