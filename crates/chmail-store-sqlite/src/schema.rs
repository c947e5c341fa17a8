//! SQL schema for the chmail SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Lookups go through the normalized_* columns (simple uppercase mapping).
CREATE TABLE IF NOT EXISTS users (
    user_id              TEXT PRIMARY KEY,
    user_name            TEXT NOT NULL,
    normalized_user_name TEXT NOT NULL UNIQUE,
    email                TEXT NOT NULL,
    normalized_email     TEXT NOT NULL,
    password_hash        TEXT NOT NULL,
    created_at           TEXT NOT NULL,   -- ISO 8601 UTC
    email_changed_at     TEXT             -- NULL until the first change
);

-- One JSON document per settings section, e.g. 'ChangeEmailSettings'.
CREATE TABLE IF NOT EXISTS site_settings (
    section  TEXT PRIMARY KEY,
    document TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS users_email_idx ON users(normalized_email);

PRAGMA user_version = 1;
";

/// Columns selected wherever a [`chmail_core::user::User`] is decoded.
pub const USER_COLUMNS: &str = "user_id, user_name, email, created_at";
