//! Site settings and the feature gate built on them.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// The change-email section of the site-wide settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
  #[serde(default)]
  pub allow_change_email: bool,
}

impl SiteSettings {
  /// Name of the settings section this type is stored under.
  pub const SECTION: &'static str = "ChangeEmailSettings";
}

/// Read access to the site settings. Implementations may cache.
pub trait SettingsProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn site_settings(
    &self,
  ) -> impl Future<Output = Result<SiteSettings, Self::Error>> + Send + '_;
}

// ─── Feature gate ────────────────────────────────────────────────────────────

/// Whether the change-email workflow is reachable at all.
///
/// Fails closed: if the provider errors the gate reports the feature as
/// disabled and logs the failure instead of passing it on.
#[derive(Debug, Clone)]
pub struct FeatureGate<P> {
  provider: P,
}

impl<P: SettingsProvider> FeatureGate<P> {
  pub fn new(provider: P) -> Self { Self { provider } }

  pub async fn is_enabled(&self) -> bool {
    match self.provider.site_settings().await {
      Ok(settings) => settings.allow_change_email,
      Err(e) => {
        tracing::warn!(error = %e, "site settings unavailable; change email disabled");
        false
      }
    }
  }
}
