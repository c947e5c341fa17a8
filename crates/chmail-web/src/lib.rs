//! HTTP surface for the chmail change-email workflow.
//!
//! Exposes an axum [`Router`] backed by any store that is both the user
//! directory and the settings provider. TLS and anti-forgery tokens are the
//! deployment's responsibility.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use chmail_core::{
  directory::{CredentialStore, UserDirectory},
  settings::SettingsProvider,
  validation::AddressValidator,
  workflow::ChangeEmailService,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// Entry form: `GET` to display, `POST` to submit.
pub const FORM_PATH: &str = "/change-email";
/// Where a successful submission redirects.
pub const CONFIRMATION_PATH: &str = "/change-email/confirmation";

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CHMAIL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  /// Have the directory refuse addresses already held by another user.
  #[serde(default)]
  pub require_unique_email: bool,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("chmail.db") }

// ─── Application state ────────────────────────────────────────────────────────

/// Everything a store must provide to back the router.
pub trait Backend:
  UserDirectory + CredentialStore + SettingsProvider + Clone + 'static
{
}

impl<T> Backend for T where
  T: UserDirectory + CredentialStore + SettingsProvider + Clone + 'static
{
}

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: Backend> {
  pub store:    Arc<S>,
  pub workflow: Arc<ChangeEmailService<S, S>>,
}

impl<S: Backend> AppState<S> {
  pub fn new(store: S, validator: Arc<dyn AddressValidator>) -> Self {
    let workflow = ChangeEmailService::new(store.clone(), store.clone(), validator);
    Self { store: Arc::new(store), workflow: Arc::new(workflow) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the change-email endpoints.
pub fn router<S: Backend>(state: AppState<S>) -> Router {
  Router::new()
    .route(FORM_PATH, get(handlers::entry_form::<S>).post(handlers::submit::<S>))
    .route(CONFIRMATION_PATH, get(handlers::confirmation::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
