//! The user record and the case folding used to compare and look up
//! addresses and user names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An account as seen by the change-email workflow.
///
/// The directory owns and persists it; the workflow only reads it and asks
/// the directory to mutate `email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  /// Unique and immutable.
  pub user_name:  String,
  pub email:      String,
  pub created_at: DateTime<Utc>,
}

/// Simple uppercase mapping of one character. Characters whose uppercase
/// form expands to several characters (e.g. `ß`) map to themselves.
fn simple_upper(c: char) -> char {
  let mut upper = c.to_uppercase();
  match (upper.next(), upper.next()) {
    (Some(u), None) => u,
    _ => c,
  }
}

/// The lookup key under which the directory indexes emails and user names.
pub fn normalize(value: &str) -> String { value.chars().map(simple_upper).collect() }

/// Ordinal, case-insensitive equality. Does not depend on any locale.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
  a.chars().map(simple_upper).eq(b.chars().map(simple_upper))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ascii_case_variants_are_equal() {
    assert!(eq_ignore_case("a@x.com", "A@X.COM"));
    assert!(eq_ignore_case("Alice@Example.org", "alice@example.ORG"));
  }

  #[test]
  fn different_addresses_are_not_equal() {
    assert!(!eq_ignore_case("a@x.com", "a@x.co"));
    assert!(!eq_ignore_case("a@x.com", "b@x.com"));
  }

  #[test]
  fn non_ascii_letters_fold() {
    assert!(eq_ignore_case("élodie@x.fr", "ÉLODIE@X.FR"));
  }

  #[test]
  fn expanding_uppercase_is_left_alone() {
    // `ß` uppercases to "SS"; a simple mapping keeps it as is.
    assert_eq!(normalize("straße"), "STRAßE");
    assert!(!eq_ignore_case("strasse", "straße"));
  }

  #[test]
  fn normalize_matches_eq_ignore_case() {
    let a = "Bob@Example.com";
    let b = "bob@EXAMPLE.COM";
    assert_eq!(normalize(a), normalize(b));
    assert!(eq_ignore_case(a, b));
  }
}
