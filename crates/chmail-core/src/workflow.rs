//! The change-email workflow.
//!
//! ```text
//! Start ─(gate off)─▶ Hidden
//!   │
//!   └─(gate on)─▶ FormDisplayed ─submit─▶ Validating ─┬─▶ Confirmed
//!                      ▲                              │
//!                      └──────── errors ──────────────┘
//! ```
//!
//! Every operation takes the already-authenticated [`User`] explicitly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  directory::UserDirectory,
  settings::{FeatureGate, SettingsProvider},
  user::{User, eq_ignore_case},
  validation::{AddressValidator, FieldError, MessageKey, ValidationErrors},
};

// ─── Form & results ──────────────────────────────────────────────────────────

/// The entry form: the address the user wants (or, on display, has).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEmailForm {
  #[serde(default)]
  pub email: String,
}

impl ChangeEmailForm {
  pub fn new(email: impl Into<String>) -> Self { Self { email: email.into() } }

  /// Field-level checks that run before any business rule: presence, then
  /// format.
  pub fn validate(&self, validator: &dyn AddressValidator) -> ValidationErrors {
    if self.email.trim().is_empty() {
      return FieldError::email(MessageKey::Required).into();
    }
    if !validator.is_valid(&self.email) {
      return FieldError::email(MessageKey::InvalidEmail).into();
    }
    ValidationErrors::new()
  }
}

/// The result of a change attempt that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
  /// The new address is persisted; carries the updated record.
  Changed(User),
  /// Nothing was written. Redisplay the form with these errors.
  Rejected(ValidationErrors),
}

impl ChangeOutcome {
  fn rejected(key: MessageKey) -> Self { Self::Rejected(FieldError::email(key).into()) }
}

/// The terminal view shown after a successful change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Confirmation {
  pub message: &'static str,
}

impl Default for Confirmation {
  fn default() -> Self { Self { message: "Your email has been changed." } }
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Runs the change-email workflow against a directory, gated by site
/// settings.
///
/// Holds no mutable state; share it behind an `Arc`.
pub struct ChangeEmailService<D, P> {
  directory: D,
  gate:      FeatureGate<P>,
  validator: Arc<dyn AddressValidator>,
}

impl<D, P> ChangeEmailService<D, P>
where
  D: UserDirectory,
  P: SettingsProvider,
{
  pub fn new(directory: D, settings: P, validator: Arc<dyn AddressValidator>) -> Self {
    Self { directory, gate: FeatureGate::new(settings), validator }
  }

  pub fn gate(&self) -> &FeatureGate<P> { &self.gate }

  /// The entry form pre-filled with the user's current address.
  ///
  /// The record is re-read from the directory, so the form reflects any
  /// change committed since `current` was resolved.
  pub async fn render_entry_form(&self, current: &User) -> Result<ChangeEmailForm> {
    if !self.gate.is_enabled().await {
      return Err(Error::Disabled);
    }

    let user = self
      .directory
      .find_by_user_name(&current.user_name)
      .await
      .map_err(Error::directory)?
      .ok_or_else(|| Error::UserNotFound(current.user_name.clone()))?;

    Ok(ChangeEmailForm { email: user.email })
  }

  /// Validate `form` for `current` and, if every rule passes, persist it.
  ///
  /// Rules run in order and the first failure is the only one reported:
  /// form checks, same-as-current, in use by another user name, then
  /// whatever the directory itself refuses.
  pub async fn request_change(
    &self,
    current: &User,
    form: &ChangeEmailForm,
  ) -> Result<ChangeOutcome> {
    if !self.gate.is_enabled().await {
      return Err(Error::Disabled);
    }

    let errors = form.validate(self.validator.as_ref());
    if let Some(error) = errors.iter().next() {
      tracing::debug!(user_name = %current.user_name, key = %error.key, "change email form invalid");
      return Ok(ChangeOutcome::Rejected(errors));
    }

    let requested = form.email.as_str();

    if eq_ignore_case(&current.email, requested) {
      return Ok(self.reject(current, MessageKey::AlreadyCurrentEmail));
    }

    let holder = self
      .directory
      .find_by_email(requested)
      .await
      .map_err(Error::directory)?;

    // A record under the same user name may hold the address already.
    if let Some(holder) = holder
      && holder.user_name != current.user_name
    {
      return Ok(self.reject(current, MessageKey::EmailAlreadyInUse));
    }

    let outcome = self
      .directory
      .update_email(current.user_id, requested)
      .await
      .map_err(Error::directory)?;

    match &outcome {
      ChangeOutcome::Changed(user) => {
        tracing::info!(user_name = %user.user_name, "email changed");
      }
      ChangeOutcome::Rejected(errors) => {
        for error in errors {
          tracing::debug!(
            user_name = %current.user_name,
            field = %error.field,
            key = %error.key,
            "directory refused email change"
          );
        }
      }
    }

    Ok(outcome)
  }

  fn reject(&self, current: &User, key: MessageKey) -> ChangeOutcome {
    tracing::debug!(user_name = %current.user_name, %key, "change email rejected");
    ChangeOutcome::rejected(key)
  }

  /// Shown after a successful change. Not gated.
  pub fn confirmation(&self) -> Confirmation { Confirmation::default() }
}
