//! chmail server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `CHMAIL_*` environment variables, opens the SQLite store and serves the
//! change-email endpoints over HTTP.
//!
//! # Setup
//!
//! ```text
//! chmail add-user --user-name alice --email alice@example.com   # password on stdin
//! chmail set-allow-change-email true
//! chmail serve
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use chmail_core::{
  settings::SiteSettings,
  validation::{AddressValidator, DefaultAddressValidator},
};
use chmail_store_sqlite::SqliteStore;
use chmail_web::{AppState, ServerConfig};
use clap::{ArgAction, Parser, Subcommand};
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "chmail change-email server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve HTTP (the default).
  Serve,
  /// Create a user. The password is read from stdin.
  AddUser {
    #[arg(long)]
    user_name: String,
    #[arg(long)]
    email:     String,
  },
  /// Turn the change-email feature on or off.
  SetAllowChangeEmail {
    #[arg(action = ArgAction::Set)]
    allow: bool,
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
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CHMAIL"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .require_unique_email(server_cfg.require_unique_email);

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(store, &server_cfg).await,
    Command::AddUser { user_name, email } => add_user(&store, &user_name, &email).await,
    Command::SetAllowChangeEmail { allow } => {
      store
        .set_site_settings(SiteSettings { allow_change_email: allow })
        .await
        .context("failed to write site settings")?;
      tracing::info!(allow, "change email setting updated");
      Ok(())
    }
  }
}

async fn serve(store: SqliteStore, server_cfg: &ServerConfig) -> anyhow::Result<()> {
  let state = AppState::new(store, Arc::new(DefaultAddressValidator));

  let app = chmail_web::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn add_user(store: &SqliteStore, user_name: &str, email: &str) -> anyhow::Result<()> {
  if !DefaultAddressValidator.is_valid(email) {
    anyhow::bail!("{email:?} is not a valid email address");
  }

  let password = read_password()?;
  if password.is_empty() {
    anyhow::bail!("password must not be empty");
  }

  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
    .to_string();

  let user = store
    .add_user(user_name, email, &hash)
    .await
    .context("failed to create user")?;

  tracing::info!(user_name = %user.user_name, user_id = %user.user_id, "user created");
  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
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
