//! Error types for `chmail-core`.
//!
//! Business-rule violations are not errors: they travel as data inside
//! [`ChangeOutcome::Rejected`](crate::workflow::ChangeOutcome::Rejected).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The feature gate is off. Callers surface this as "not found".
  #[error("change email is disabled")]
  Disabled,

  #[error("user not found: {0}")]
  UserNotFound(String),

  #[error("directory error: {0}")]
  Directory(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn directory<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Directory(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
