//! HTTP Basic-auth resolution of the current user.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use chmail_core::{
  directory::{CredentialStore, UserDirectory},
  user::User,
};

use crate::{AppState, Backend, error::Error};

/// The authenticated user, resolved from the request's credentials.
pub struct CurrentUser(pub User);

/// Split a `Basic` authorization header into user name and password.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (user_name, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;
  Ok((user_name.to_owned(), password.to_owned()))
}

/// Verify the request's credentials against `store` and load the user.
pub async fn resolve_user<S>(headers: &HeaderMap, store: &S) -> Result<User, Error>
where
  S: UserDirectory + CredentialStore,
{
  let (user_name, password) = basic_credentials(headers)?;

  let hash = store
    .password_hash(&user_name)
    .await
    .map_err(Error::store)?
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&hash).map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  store
    .find_by_user_name(&user_name)
    .await
    .map_err(Error::store)?
    .ok_or(Error::Unauthorized)
}

impl<S: Backend> FromRequestParts<AppState<S>> for CurrentUser {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let user = resolve_user(&parts.headers, &*state.store).await?;
    Ok(CurrentUser(user))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::{HeaderValue, header};

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn splits_user_and_password() {
    let (user, pass) = basic_credentials(&headers(&basic("alice", "s3:cret"))).unwrap();
    assert_eq!(user, "alice");
    // Only the first colon separates the two.
    assert_eq!(pass, "s3:cret");
  }

  #[test]
  fn missing_header() {
    assert!(matches!(basic_credentials(&HeaderMap::new()), Err(Error::Unauthorized)));
  }

  #[test]
  fn wrong_scheme() {
    let h = headers("Bearer abc");
    assert!(matches!(basic_credentials(&h), Err(Error::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let h = headers("Basic !!!not-base64!!!");
    assert!(matches!(basic_credentials(&h), Err(Error::Unauthorized)));
  }

  #[test]
  fn no_separator() {
    let h = headers(&format!("Basic {}", B64.encode("alice")));
    assert!(matches!(basic_credentials(&h), Err(Error::Unauthorized)));
  }
}
