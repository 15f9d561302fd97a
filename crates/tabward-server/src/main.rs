//! tabward-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `TABWARD_*` environment variables, opens the SQLite store, and serves the
//! extension API over HTTP.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `TABWARD_IDENTITY__JWT_SECRET` or `TABWARD_PAYMENTS__WEBHOOK_SECRET`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use tabward_server::{
  AppState,
  ServerConfig,
  auth::TokenVerifier,
  identity::GoTrueClient,
  payments::{StripeClient, signature::WebhookVerifier},
};
use tabward_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tabward sync server")]
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
    .add_source(config::Environment::with_prefix("TABWARD").prefix_separator("_").separator("__"))
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.validate().context("invalid configuration")?;

  // Expand `~` in the database path.
  let database_path = expand_tilde(&server_cfg.database_path);

  let store = SqliteStore::open(&database_path)
    .await
    .with_context(|| format!("failed to open store at {database_path:?}"))?;

  let identity = GoTrueClient::new(&server_cfg.identity).context("failed to build identity client")?;
  let payments = StripeClient::new(&server_cfg.payments).context("failed to build payment client")?;
  let webhooks = WebhookVerifier::new(&server_cfg.payments.webhook_secret, server_cfg.payments.tolerance_secs)
    .map_err(|_| anyhow::anyhow!("invalid webhook secret"))?;

  let state = AppState::new(store, identity, payments, TokenVerifier::new(&server_cfg.identity), webhooks);

  let app = tabward_server::router(state);
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
