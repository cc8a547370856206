use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::invitation::Invitation;

pub type ApiResult<T = ()> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("Invalid credentials")]
  InvalidCredentials(),
  #[error("{0}")]
  Unauthorized(&'static str),
  #[error("User with email `{0}` already exists")]
  UserAlreadyExist(String),
  #[error("Entity `{0}` is not found")]
  ResourceNotFound(String),
  #[error("Permission denied: {0}")]
  PermissionDenied(&'static str),
  #[error("You cannot remove yourself from the project")]
  CannotRemoveSelf,
  #[error("The project owner cannot be removed")]
  CannotRemoveOwner,
  #[error("The project owner's role cannot be changed")]
  CannotChangeOwnerRole,
  #[error("Invalid invitation")]
  InvalidInvitation,
  #[error("This invitation has expired")]
  InvitationExpired,
  #[error("You are already a member of this project")]
  AlreadyMember,
  #[error("This invitation was sent to `{0}`, please sign in with that account")]
  InvitationEmailMismatch(String),
  #[error("Invitation created, but the email could not be sent: {reason}")]
  InvitationEmailFailed {
    invitation: Box<Invitation>,
    link: String,
    reason: String,
  },
  #[error("Record `{id}` was modified concurrently (expected version {expected}, found {actual})")]
  VersionConflict { id: Uuid, expected: i64, actual: i64 },
  #[error("Database error: {0}")]
  DatabaseError(#[from] SqlxError),
  #[error(transparent)]
  JsonRejection(JsonRejection),
  #[error(transparent)]
  InvalidInputError(#[from] validator::ValidationErrors),
  #[error("an internal server error occurred")]
  Anyhow(#[from] anyhow::Error),
}

impl ApiError {
  pub fn response(self) -> (StatusCode, AppResponseError) {
    use ApiError::*;
    let message = self.to_string();

    let (kind, code, details, status_code) = match self {
      JsonRejection(rejection) => (
        "INVALID_INPUT_ERROR",
        None,
        vec![(rejection.status().to_string(), vec![rejection.body_text()])],
        StatusCode::BAD_REQUEST,
      ),
      InvalidInputError(err) => (
        "INVALID_INPUT_ERROR",
        None,
        err
          .field_errors()
          .into_iter()
          .map(|(p, e)| {
            (
              p.to_string(),
              e.iter().map(|err| err.code.to_string()).collect::<Vec<String>>(),
            )
          })
          .collect(),
        StatusCode::BAD_REQUEST,
      ),
      InvalidCredentials() => ("INVALID_CREDENTIALS", None, vec![], StatusCode::UNAUTHORIZED),
      Unauthorized(_) => ("UNAUTHORIZED", None, vec![], StatusCode::UNAUTHORIZED),
      UserAlreadyExist(_) => ("USER_ALREADY_EXIST", None, vec![], StatusCode::CONFLICT),
      ResourceNotFound(_) => ("RESOURCE_NOT_FOUND", None, vec![], StatusCode::NOT_FOUND),
      PermissionDenied(_) => ("PERMISSION_DENIED", None, vec![], StatusCode::FORBIDDEN),
      CannotRemoveSelf => ("CANNOT_REMOVE_SELF", None, vec![], StatusCode::FORBIDDEN),
      CannotRemoveOwner => ("CANNOT_REMOVE_OWNER", None, vec![], StatusCode::FORBIDDEN),
      CannotChangeOwnerRole => ("CANNOT_CHANGE_OWNER_ROLE", None, vec![], StatusCode::FORBIDDEN),
      InvalidInvitation => ("INVALID_INVITATION", None, vec![], StatusCode::NOT_FOUND),
      InvitationExpired => ("INVITATION_EXPIRED", None, vec![], StatusCode::GONE),
      AlreadyMember => ("ALREADY_MEMBER", None, vec![], StatusCode::CONFLICT),
      InvitationEmailMismatch(_) => ("INVITATION_EMAIL_MISMATCH", None, vec![], StatusCode::FORBIDDEN),
      InvitationEmailFailed { invitation, link, .. } => {
        tracing::warn!(invitation_id = %invitation.id, "Invitation stored without email delivery");

        (
          "INVITATION_EMAIL_FAILED",
          None,
          vec![
            ("invitation_id".to_string(), vec![invitation.id.to_string()]),
            ("link".to_string(), vec![link]),
          ],
          StatusCode::BAD_GATEWAY,
        )
      },
      VersionConflict { expected, actual, .. } => (
        "VERSION_CONFLICT",
        None,
        vec![
          ("expected_version".to_string(), vec![expected.to_string()]),
          ("actual_version".to_string(), vec![actual.to_string()]),
        ],
        StatusCode::CONFLICT,
      ),
      DatabaseError(ref e) if is_unique_violation(e) => ("CONFLICT", None, vec![], StatusCode::CONFLICT),
      DatabaseError(ref e) => {
        tracing::error!("Database error: {:?}", e);

        ("INTERNAL_SERVER_ERROR", None, vec![], StatusCode::INTERNAL_SERVER_ERROR)
      },
      Anyhow(ref e) => {
        tracing::error!("Generic error: {:?}", e);

        ("INTERNAL_SERVER_ERROR", None, vec![], StatusCode::INTERNAL_SERVER_ERROR)
      },
    };

    (status_code, AppResponseError::new(kind, message, code, details))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status_code, body) = self.response();
    (status_code, Json(body)).into_response()
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::JsonRejection(rejection)
  }
}

pub(crate) fn is_unique_violation(err: &SqlxError) -> bool {
  matches!(err, SqlxError::Database(db) if db.is_unique_violation())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AppResponseError {
  pub kind: String,
  pub error_message: String,
  pub code: Option<i32>,
  pub details: Vec<(String, Vec<String>)>,
}

impl AppResponseError {
  pub fn new(
    kind: impl Into<String>,
    message: impl Into<String>,
    code: Option<i32>,
    details: Vec<(String, Vec<String>)>,
  ) -> Self {
    Self {
      kind: kind.into(),
      error_message: message.into(),
      code,
      details,
    }
  }
}
