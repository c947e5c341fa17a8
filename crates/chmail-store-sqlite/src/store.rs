//! [`SqliteStore`] — the SQLite implementation of the directory and settings
//! collaborators.

use std::path::Path;

use chmail_core::{
  directory::{CredentialStore, UserDirectory},
  settings::{SettingsProvider, SiteSettings},
  user::{User, normalize},
  validation::{FieldError, MessageKey},
  workflow::ChangeOutcome,
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawUser, encode_dt, encode_uuid},
  schema::{SCHEMA, USER_COLUMNS},
};

/// Longest address the `users` table accepts.
const MAX_EMAIL_LEN: usize = 256;

/// What happened inside the `update_email` write closure.
enum EmailWrite {
  Missing,
  Refused(MessageKey),
  Written(RawUser),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A chmail store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All writes
/// are serialised on the connection's thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn:                 tokio_rusqlite::Connection,
  require_unique_email: bool,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, require_unique_email: false };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, require_unique_email: false };
    store.init_schema().await?;
    Ok(store)
  }

  /// Refuse `update_email` when another user already holds the address.
  pub fn require_unique_email(mut self, require: bool) -> Self {
    self.require_unique_email = require;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Create a user. `password_hash` is an argon2 PHC string.
  ///
  /// Fails with [`Error::DuplicateUserName`] if the normalized user name is
  /// taken.
  pub async fn add_user(
    &self,
    user_name: &str,
    email: &str,
    password_hash: &str,
  ) -> Result<User> {
    let user = User {
      user_id:    Uuid::new_v4(),
      user_name:  user_name.to_owned(),
      email:      email.to_owned(),
      created_at: Utc::now(),
    };

    let id_str          = encode_uuid(user.user_id);
    let name            = user.user_name.clone();
    let normalized_name = normalize(&user.user_name);
    let email_str       = user.email.clone();
    let normalized_mail = normalize(&user.email);
    let hash            = password_hash.to_owned();
    let at_str          = encode_dt(user.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let taken = tx
          .query_row(
            "SELECT 1 FROM users WHERE normalized_user_name = ?1",
            rusqlite::params![normalized_name],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO users (
             user_id, user_name, normalized_user_name,
             email, normalized_email, password_hash, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            name,
            normalized_name,
            email_str,
            normalized_mail,
            hash,
            at_str,
          ],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateUserName(user.user_name));
    }
    Ok(user)
  }

  /// Overwrite the change-email settings section.
  pub async fn set_site_settings(&self, settings: SiteSettings) -> Result<()> {
    let document = serde_json::to_string(&settings)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO site_settings (section, document) VALUES (?1, ?2)
           ON CONFLICT (section) DO UPDATE SET document = excluded.document",
          rusqlite::params![SiteSettings::SECTION, document],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch at most one user where `column` equals the normalized `key`.
  async fn find_user_by(&self, column: &'static str, key: String) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1
           ORDER BY created_at, rowid LIMIT 1"
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![key], RawUser::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }
}

// ─── Directory impls ─────────────────────────────────────────────────────────

impl UserDirectory for SqliteStore {
  type Error = Error;

  async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
    self.find_user_by("normalized_email", normalize(email)).await
  }

  async fn find_by_user_name(&self, user_name: &str) -> Result<Option<User>> {
    self.find_user_by("normalized_user_name", normalize(user_name)).await
  }

  async fn update_email(&self, user_id: Uuid, email: &str) -> Result<ChangeOutcome> {
    let id_str          = encode_uuid(user_id);
    let email_str       = email.to_owned();
    let normalized_mail = normalize(email);
    let at_str          = encode_dt(Utc::now());
    let unique          = self.require_unique_email;

    let write = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(EmailWrite::Missing);
        }

        if email_str.chars().count() > MAX_EMAIL_LEN {
          return Ok(EmailWrite::Refused(MessageKey::InvalidEmail));
        }

        if unique {
          let held_elsewhere = tx
            .query_row(
              "SELECT 1 FROM users WHERE normalized_email = ?1 AND user_id != ?2 LIMIT 1",
              rusqlite::params![normalized_mail, id_str],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if held_elsewhere {
            return Ok(EmailWrite::Refused(MessageKey::DuplicateEmail));
          }
        }

        tx.execute(
          "UPDATE users
             SET email = ?1, normalized_email = ?2, email_changed_at = ?3
           WHERE user_id = ?4",
          rusqlite::params![email_str, normalized_mail, at_str, id_str],
        )?;

        let raw = tx.query_row(
          &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
          rusqlite::params![id_str],
          RawUser::from_row,
        )?;
        tx.commit()?;
        Ok(EmailWrite::Written(raw))
      })
      .await?;

    match write {
      EmailWrite::Missing => Err(Error::UserNotFound(user_id)),
      EmailWrite::Refused(key) => Ok(ChangeOutcome::Rejected(FieldError::email(key).into())),
      EmailWrite::Written(raw) => Ok(ChangeOutcome::Changed(raw.into_user()?)),
    }
  }
}

impl CredentialStore for SqliteStore {
  type Error = Error;

  async fn password_hash(&self, user_name: &str) -> Result<Option<String>> {
    let key = normalize(user_name);

    let hash: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT password_hash FROM users WHERE normalized_user_name = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(hash)
  }
}

// ─── Settings impl ───────────────────────────────────────────────────────────

impl SettingsProvider for SqliteStore {
  type Error = Error;

  /// Reads the section on every call; an absent section yields the defaults.
  async fn site_settings(&self) -> Result<SiteSettings> {
    let document: Option<String> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT document FROM site_settings WHERE section = ?1",
              rusqlite::params![SiteSettings::SECTION],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    match document {
      Some(doc) => Ok(serde_json::from_str(&doc)?),
      None => Ok(SiteSettings::default()),
    }
  }
}
