//! Field-level validation results and the address format validator.
//!
//! Errors are `(field, key)` pairs. Keys are stable identifiers; the English
//! text returned by [`MessageKey::default_text`] is a fallback for hosts that
//! do not localise.

use serde::{Serialize, Serializer, ser::SerializeStruct as _};
use strum::{AsRefStr, Display};
use validator::ValidateEmail as _;

/// The form field every workflow rule reports against.
pub const EMAIL_FIELD: &str = "Email";

// ─── Message keys ────────────────────────────────────────────────────────────

/// Stable identifier of a validation message. Its string form (`snake_case`)
/// is what the JSON `key` field and the logs carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKey {
  Required,
  InvalidEmail,
  AlreadyCurrentEmail,
  EmailAlreadyInUse,
  DuplicateEmail,
}

impl MessageKey {
  pub fn default_text(self) -> &'static str {
    match self {
      Self::Required => "The Email field is required.",
      Self::InvalidEmail => "The email is invalid.",
      Self::AlreadyCurrentEmail => "This email is already your current one.",
      Self::EmailAlreadyInUse => "A user with the same email already exists.",
      Self::DuplicateEmail => "This email is already taken.",
    }
  }
}

// ─── Field errors ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  pub field: String,
  pub key:   MessageKey,
}

impl FieldError {
  pub fn new(field: impl Into<String>, key: MessageKey) -> Self {
    Self { field: field.into(), key }
  }

  /// An error against [`EMAIL_FIELD`].
  pub fn email(key: MessageKey) -> Self { Self::new(EMAIL_FIELD, key) }
}

impl Serialize for FieldError {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut s = serializer.serialize_struct("FieldError", 3)?;
    s.serialize_field("field", &self.field)?;
    s.serialize_field("key", self.key.as_ref())?;
    s.serialize_field("message", self.key.default_text())?;
    s.end()
  }
}

/// An ordered set of field errors. Empty means the input was accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> std::slice::Iter<'_, FieldError> { self.0.iter() }

  /// Keys reported against `field`, in insertion order.
  pub fn keys_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = MessageKey> + 'a {
    self.0.iter().filter(move |e| e.field == field).map(|e| e.key)
  }
}

impl From<FieldError> for ValidationErrors {
  fn from(error: FieldError) -> Self { Self(vec![error]) }
}

impl FromIterator<FieldError> for ValidationErrors {
  fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl IntoIterator for ValidationErrors {
  type Item = FieldError;
  type IntoIter = std::vec::IntoIter<FieldError>;

  fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

impl<'a> IntoIterator for &'a ValidationErrors {
  type Item = &'a FieldError;
  type IntoIter = std::slice::Iter<'a, FieldError>;

  fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

// ─── Address format ──────────────────────────────────────────────────────────

/// Decides whether a string is a well-formed email address.
///
/// Injected into the workflow so hosts can swap in their own rules.
pub trait AddressValidator: Send + Sync {
  fn is_valid(&self, address: &str) -> bool;
}

impl<F> AddressValidator for F
where
  F: Fn(&str) -> bool + Send + Sync,
{
  fn is_valid(&self, address: &str) -> bool { self(address) }
}

/// The `validator` crate's address check, narrowed to dotted domains
/// (`alice@localhost` is refused).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAddressValidator;

impl AddressValidator for DefaultAddressValidator {
  fn is_valid(&self, address: &str) -> bool {
    let dotted = address
      .rsplit_once('@')
      .is_some_and(|(_, domain)| domain.contains('.'));
    dotted && address.validate_email()
  }
}
