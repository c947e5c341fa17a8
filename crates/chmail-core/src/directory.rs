//! The identity directory the workflow reads from and writes through.
//!
//! Implemented by storage backends (e.g. `chmail-store-sqlite`). The
//! workflow depends on these traits only.

use std::future::Future;

use uuid::Uuid;

use crate::{user::User, workflow::ChangeOutcome};

/// System of record for user accounts.
///
/// Lookups compare normalized keys (see [`crate::user::normalize`]). The
/// directory is responsible for serialising concurrent writes to the same
/// record; the workflow adds no locking of its own.
pub trait UserDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Any user currently holding `email`. `None` if nobody does.
  fn find_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  fn find_by_user_name<'a>(
    &'a self,
    user_name: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Persist a new email for `user_id`.
  ///
  /// The directory may refuse the address with its own field errors, which
  /// it returns as [`ChangeOutcome::Rejected`] rather than as `Err`.
  fn update_email<'a>(
    &'a self,
    user_id: Uuid,
    email: &'a str,
  ) -> impl Future<Output = Result<ChangeOutcome, Self::Error>> + Send + 'a;
}

/// Password hashes for authenticating users, keyed by user name.
pub trait CredentialStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The argon2 PHC string for `user_name`, if the user exists.
  fn password_hash<'a>(
    &'a self,
    user_name: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}
