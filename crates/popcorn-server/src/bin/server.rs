//! popcorn server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) and `POPCORN_*`
//! environment variables, opens the SQLite store, and serves the REST API
//! over HTTP.
//!
//! # Creating users
//!
//! ```sh
//! cargo run -p popcorn-server --bin server -- add-user --username alice --permission all
//! ```

use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use popcorn_core::{
  store::MovieStore,
  user::{NewUser, Permission},
};
use popcorn_server::{FsContentStore, ServerConfig};
use popcorn_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Popcorn movie database server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: std::path::PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the REST API. This is the default.
  Serve,
  /// Create a user and print its id.
  AddUser {
    #[arg(long)]
    username:    String,
    /// Capability to grant, e.g. `all`, `new_movie` or `genre`. Repeatable.
    #[arg(long = "permission")]
    permissions: Vec<Permission>,
  },
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
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "~/.local/share/popcorn/popcorn.db")?
    .set_default("content_root", "~/.local/share/popcorn/content")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("POPCORN"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize::<ServerConfig>()
    .context("failed to deserialise ServerConfig")?
    .expanded();

  let store = open_store(&server_cfg).await?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(&server_cfg, store).await,
    Command::AddUser { username, permissions } => {
      let user = store
        .add_user(NewUser { username, permissions: permissions.into_iter().collect() })
        .await
        .context("failed to add user")?;
      println!("{}", user.user_id);
      Ok(())
    }
  }
}

async fn open_store(cfg: &ServerConfig) -> anyhow::Result<SqliteStore> {
  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let content = Arc::new(FsContentStore::new(&cfg.content_root));
  SqliteStore::open(&cfg.store_path, content)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))
}

async fn serve(cfg: &ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let app = popcorn_server::router(Arc::new(store));
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
