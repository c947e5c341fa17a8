//! Handlers for the change-email endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/change-email` | Current email; 404 when the feature is off |
//! | `POST` | `/change-email` | Body: `{"email":"..."}`; 404 when the feature is off (before auth); 303 on success, 422 with errors |
//! | `GET`  | `/change-email/confirmation` | Static; no auth |

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Redirect, Response},
};
use chmail_core::{
  validation::ValidationErrors,
  workflow::{ChangeEmailForm, ChangeOutcome, Confirmation},
};
use serde::Serialize;

use crate::{
  AppState, Backend, CONFIRMATION_PATH,
  auth::{CurrentUser, resolve_user},
  error::Error,
};

/// What the entry form displays: the address and any errors against it.
#[derive(Debug, Serialize)]
pub struct FormState {
  pub email:  String,
  pub errors: ValidationErrors,
}

/// `GET /change-email`
pub async fn entry_form<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<FormState>, Error> {
  let form = state.workflow.render_entry_form(&user).await?;
  Ok(Json(FormState { email: form.email, errors: ValidationErrors::new() }))
}

/// `POST /change-email` — body: `{"email":"..."}`
///
/// The gate is checked before credentials, so a disabled feature answers 404
/// to everyone and never reaches the credential store.
pub async fn submit<S: Backend>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Json(form): Json<ChangeEmailForm>,
) -> Result<Response, Error> {
  if !state.workflow.gate().is_enabled().await {
    return Err(Error::NotFound);
  }
  let user = resolve_user(&headers, &*state.store).await?;

  match state.workflow.request_change(&user, &form).await? {
    ChangeOutcome::Changed(_) => Ok(Redirect::to(CONFIRMATION_PATH).into_response()),
    ChangeOutcome::Rejected(errors) => {
      let body = FormState { email: form.email, errors };
      Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response())
    }
  }
}

/// `GET /change-email/confirmation`
pub async fn confirmation<S: Backend>(State(state): State<AppState<S>>) -> Json<Confirmation> {
  Json(state.workflow.confirmation())
}
