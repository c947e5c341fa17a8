//! Workflow tests against an in-memory directory.

use std::sync::{
  Arc, Mutex,
  atomic::{AtomicUsize, Ordering},
};

use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error,
  directory::UserDirectory,
  settings::{SettingsProvider, SiteSettings},
  user::{User, normalize},
  validation::{DefaultAddressValidator, EMAIL_FIELD, FieldError, MessageKey},
  workflow::{ChangeEmailForm, ChangeEmailService, ChangeOutcome},
};

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("backend unavailable")]
struct Unavailable;

/// Settings that are either fixed or permanently unavailable.
#[derive(Clone)]
struct FixedSettings(Option<SiteSettings>);

impl SettingsProvider for FixedSettings {
  type Error = Unavailable;

  async fn site_settings(&self) -> Result<SiteSettings, Unavailable> {
    self.0.ok_or(Unavailable)
  }
}

fn enabled() -> FixedSettings {
  FixedSettings(Some(SiteSettings { allow_change_email: true }))
}

fn disabled() -> FixedSettings {
  FixedSettings(Some(SiteSettings { allow_change_email: false }))
}

#[derive(Default)]
struct DirectoryState {
  users:    Vec<User>,
  /// Field errors the next `update_email` call should return.
  refusal:  Option<FieldError>,
  calls:    AtomicUsize,
  failing:  bool,
}

/// A directory that keeps users in a `Vec` and counts every call.
#[derive(Clone, Default)]
struct MemoryDirectory(Arc<Mutex<DirectoryState>>);

impl MemoryDirectory {
  fn with_users(users: &[&User]) -> Self {
    let dir = Self::default();
    dir.0.lock().unwrap().users = users.iter().map(|u| (*u).clone()).collect();
    dir
  }

  fn calls(&self) -> usize { self.0.lock().unwrap().calls.load(Ordering::SeqCst) }

  fn email_of(&self, user_name: &str) -> Option<String> {
    let state = self.0.lock().unwrap();
    state
      .users
      .iter()
      .find(|u| u.user_name == user_name)
      .map(|u| u.email.clone())
  }

  fn refuse_next(&self, error: FieldError) { self.0.lock().unwrap().refusal = Some(error); }

  fn fail(&self) { self.0.lock().unwrap().failing = true; }

  fn enter(&self) -> Result<std::sync::MutexGuard<'_, DirectoryState>, Unavailable> {
    let state = self.0.lock().unwrap();
    state.calls.fetch_add(1, Ordering::SeqCst);
    if state.failing { Err(Unavailable) } else { Ok(state) }
  }
}

impl UserDirectory for MemoryDirectory {
  type Error = Unavailable;

  async fn find_by_email(&self, email: &str) -> Result<Option<User>, Unavailable> {
    let state = self.enter()?;
    let key = normalize(email);
    Ok(state.users.iter().find(|u| normalize(&u.email) == key).cloned())
  }

  async fn find_by_user_name(&self, user_name: &str) -> Result<Option<User>, Unavailable> {
    let state = self.enter()?;
    let key = normalize(user_name);
    Ok(state.users.iter().find(|u| normalize(&u.user_name) == key).cloned())
  }

  async fn update_email(&self, user_id: Uuid, email: &str) -> Result<ChangeOutcome, Unavailable> {
    let mut state = self.enter()?;
    if let Some(error) = state.refusal.take() {
      return Ok(ChangeOutcome::Rejected(error.into()));
    }
    let user = state
      .users
      .iter_mut()
      .find(|u| u.user_id == user_id)
      .ok_or(Unavailable)?;
    user.email = email.to_owned();
    Ok(ChangeOutcome::Changed(user.clone()))
  }
}

fn user(user_name: &str, email: &str) -> User {
  User {
    user_id:    Uuid::new_v4(),
    user_name:  user_name.to_owned(),
    email:      email.to_owned(),
    created_at: Utc::now(),
  }
}

fn service(
  directory: &MemoryDirectory,
  settings: FixedSettings,
) -> ChangeEmailService<MemoryDirectory, FixedSettings> {
  ChangeEmailService::new(directory.clone(), settings, Arc::new(DefaultAddressValidator))
}

fn rejected_keys(outcome: &ChangeOutcome) -> Vec<MessageKey> {
  match outcome {
    ChangeOutcome::Rejected(errors) => errors.keys_for(EMAIL_FIELD).collect(),
    ChangeOutcome::Changed(u) => panic!("expected rejection, got change to {}", u.email),
  }
}

// ─── Feature gate ────────────────────────────────────────────────────────────

#[tokio::test]
async fn gate_follows_setting() {
  let dir = MemoryDirectory::default();
  assert!(service(&dir, enabled()).gate().is_enabled().await);
  assert!(!service(&dir, disabled()).gate().is_enabled().await);
}

#[tokio::test]
async fn gate_fails_closed_when_settings_unavailable() {
  let dir = MemoryDirectory::default();
  let svc = service(&dir, FixedSettings(None));
  assert!(!svc.gate().is_enabled().await);
}

#[tokio::test]
async fn disabled_gate_hides_entry_form_without_touching_directory() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  let svc = service(&dir, disabled());

  assert!(matches!(svc.render_entry_form(&alice).await, Err(Error::Disabled)));
  assert_eq!(dir.calls(), 0);
}

#[tokio::test]
async fn disabled_gate_refuses_change_without_touching_directory() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  let svc = service(&dir, disabled());

  let valid = svc.request_change(&alice, &ChangeEmailForm::new("alice-new@x.com")).await;
  assert!(matches!(valid, Err(Error::Disabled)));

  let invalid = svc.request_change(&alice, &ChangeEmailForm::new("nope")).await;
  assert!(matches!(invalid, Err(Error::Disabled)));

  assert_eq!(dir.calls(), 0);
  assert_eq!(dir.email_of("alice").as_deref(), Some("a@x.com"));
}

#[tokio::test]
async fn unavailable_settings_hide_the_feature() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  let svc = service(&dir, FixedSettings(None));

  assert!(matches!(svc.render_entry_form(&alice).await, Err(Error::Disabled)));
}

// ─── Entry form ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn entry_form_is_prefilled_with_current_email() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  let svc = service(&dir, enabled());

  let form = svc.render_entry_form(&alice).await.unwrap();
  assert_eq!(form.email, "a@x.com");
}

#[tokio::test]
async fn entry_form_for_unknown_user_is_an_error() {
  let ghost = user("ghost", "g@x.com");
  let dir = MemoryDirectory::default();
  let svc = service(&dir, enabled());

  let err = svc.render_entry_form(&ghost).await.unwrap_err();
  assert!(matches!(err, Error::UserNotFound(name) if name == "ghost"));
}

// ─── Request change ──────────────────────────────────────────────────────────

#[tokio::test]
async fn same_email_in_any_case_is_already_current() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  let svc = service(&dir, enabled());

  for variant in ["a@x.com", "A@X.COM", "A@x.Com"] {
    let outcome = svc.request_change(&alice, &ChangeEmailForm::new(variant)).await.unwrap();
    assert_eq!(rejected_keys(&outcome), [MessageKey::AlreadyCurrentEmail], "{variant}");
  }
  assert_eq!(dir.email_of("alice").as_deref(), Some("a@x.com"));
}

#[tokio::test]
async fn email_owned_by_another_user_is_in_use() {
  let alice = user("alice", "a@x.com");
  let bob = user("bob", "bob@x.com");
  let dir = MemoryDirectory::with_users(&[&alice, &bob]);
  let svc = service(&dir, enabled());

  let outcome = svc.request_change(&alice, &ChangeEmailForm::new("bob@x.com")).await.unwrap();
  assert_eq!(rejected_keys(&outcome), [MessageKey::EmailAlreadyInUse]);

  let outcome = svc.request_change(&alice, &ChangeEmailForm::new("BOB@X.COM")).await.unwrap();
  assert_eq!(rejected_keys(&outcome), [MessageKey::EmailAlreadyInUse]);

  assert_eq!(dir.email_of("alice").as_deref(), Some("a@x.com"));
}

#[tokio::test]
async fn email_held_under_same_user_name_is_allowed() {
  let alice = user("alice", "a@x.com");
  // A second record linked to the same user name already holds the address.
  let linked = user("alice", "alice-new@x.com");
  let dir = MemoryDirectory::with_users(&[&alice, &linked]);
  let svc = service(&dir, enabled());

  let outcome = svc
    .request_change(&alice, &ChangeEmailForm::new("alice-new@x.com"))
    .await
    .unwrap();
  assert!(matches!(outcome, ChangeOutcome::Changed(_)));
}

#[tokio::test]
async fn fresh_email_is_persisted() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  let svc = service(&dir, enabled());

  let outcome = svc
    .request_change(&alice, &ChangeEmailForm::new("alice-new@x.com"))
    .await
    .unwrap();

  let updated = match outcome {
    ChangeOutcome::Changed(user) => user,
    other => panic!("expected change, got {other:?}"),
  };
  assert_eq!(updated.email, "alice-new@x.com");
  assert_eq!(updated.user_id, alice.user_id);
  assert_eq!(dir.email_of("alice").as_deref(), Some("alice-new@x.com"));
}

#[tokio::test]
async fn entry_form_after_change_shows_new_email() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  let svc = service(&dir, enabled());

  svc
    .request_change(&alice, &ChangeEmailForm::new("alice-new@x.com"))
    .await
    .unwrap();

  // `alice` still carries the old address; the form must not.
  let form = svc.render_entry_form(&alice).await.unwrap();
  assert_eq!(form.email, "alice-new@x.com");
}

#[tokio::test]
async fn empty_email_is_required() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  let svc = service(&dir, enabled());

  for blank in ["", "   "] {
    let outcome = svc.request_change(&alice, &ChangeEmailForm::new(blank)).await.unwrap();
    assert_eq!(rejected_keys(&outcome), [MessageKey::Required]);
  }
  assert_eq!(dir.calls(), 0);
}

#[tokio::test]
async fn malformed_email_is_invalid_before_any_lookup() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  let svc = service(&dir, enabled());

  let outcome = svc.request_change(&alice, &ChangeEmailForm::new("not-an-address")).await.unwrap();
  assert_eq!(rejected_keys(&outcome), [MessageKey::InvalidEmail]);
  assert_eq!(dir.calls(), 0);
}

#[tokio::test]
async fn injected_validator_decides_format() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  let only_corp = |a: &str| a.ends_with("@corp.example");
  let svc = ChangeEmailService::new(dir.clone(), enabled(), Arc::new(only_corp));

  let outcome = svc.request_change(&alice, &ChangeEmailForm::new("alice@x.com")).await.unwrap();
  assert_eq!(rejected_keys(&outcome), [MessageKey::InvalidEmail]);

  let outcome = svc.request_change(&alice, &ChangeEmailForm::new("alice@corp.example")).await.unwrap();
  assert!(matches!(outcome, ChangeOutcome::Changed(_)));
}

#[tokio::test]
async fn directory_refusal_is_forwarded_verbatim() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  dir.refuse_next(FieldError::new("Address", MessageKey::DuplicateEmail));
  let svc = service(&dir, enabled());

  let outcome = svc
    .request_change(&alice, &ChangeEmailForm::new("alice-new@x.com"))
    .await
    .unwrap();

  let errors = match outcome {
    ChangeOutcome::Rejected(errors) => errors,
    other => panic!("expected rejection, got {other:?}"),
  };
  let errors: Vec<_> = errors.into_iter().collect();
  assert_eq!(errors, [FieldError::new("Address", MessageKey::DuplicateEmail)]);
  assert_eq!(dir.email_of("alice").as_deref(), Some("a@x.com"));
}

#[tokio::test]
async fn directory_failure_is_an_error() {
  let alice = user("alice", "a@x.com");
  let dir = MemoryDirectory::with_users(&[&alice]);
  dir.fail();
  let svc = service(&dir, enabled());

  let err = svc
    .request_change(&alice, &ChangeEmailForm::new("alice-new@x.com"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Directory(_)));
}

#[test]
fn confirmation_is_static() {
  let dir = MemoryDirectory::default();
  let svc = service(&dir, disabled());
  assert_eq!(svc.confirmation().message, "Your email has been changed.");
}
