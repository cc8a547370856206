use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore};
use serde::Deserialize;
use sqlx::{types::Json, SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  context::ProjectContext,
  entities::{
    invitation::{Invitation, InvitationRow},
    member::{AssignableRole, MemberRole, MemberRow, Scope},
    user::User,
  },
  error::{is_unique_violation, ApiError, ApiResult},
  mailer::{invite_link, InvitationEmail, InvitationMailer},
  service::access,
};

const TOKEN_BYTES: usize = 32;
pub const INVITATION_TTL_DAYS: i64 = 7;

const INSERT_INVITATION: &str = r#"
  INSERT INTO project_invitations (id, project_id, email, token, role, scopes, invited_by, expires_at)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
  RETURNING *
"#;
const FIND_MEMBER: &str = "SELECT * FROM project_members WHERE project_id = ?1 AND user_id = ?2";
const INSERT_MEMBER: &str = r#"
  INSERT INTO project_members (id, project_id, user_id, role, scopes)
  VALUES (?1, ?2, ?3, ?4, ?5)
  RETURNING *
"#;
const DELETE_INVITATION_BY_TOKEN: &str = "DELETE FROM project_invitations WHERE token = ?1 RETURNING *";

#[derive(Debug, Deserialize)]
pub struct IssueInvitationParams {
  pub email: String,
  pub role: AssignableRole,
  pub scopes: Vec<Scope>,
}

/// Creates an invitation and emails its link to the invitee
///
/// The invitation is stored before the email is sent. If sending fails the
/// invitation stays valid and `InvitationEmailFailed` carries it together
/// with the link, so the inviter can share it by other means.
///
/// # Errors
/// - PermissionDenied unless the actor is the owner or an admin
/// - InvitationEmailFailed if the invitation exists but the email was not sent
/// - DatabaseError for any database-related issues
pub async fn issue(
  pool: &SqlitePool,
  mailer: &dyn InvitationMailer,
  app_origin: &str,
  ctx: &ProjectContext,
  params: IssueInvitationParams,
) -> ApiResult<Invitation> {
  access::require_manager(pool, ctx).await?;

  let row = sqlx::query_as::<_, InvitationRow>(INSERT_INVITATION)
    .bind(Uuid::new_v4())
    .bind(ctx.project_id())
    .bind(&params.email)
    .bind(generate_token())
    .bind(params.role)
    .bind(Json(params.scopes))
    .bind(ctx.actor_id())
    .bind(Utc::now() + Duration::days(INVITATION_TTL_DAYS))
    .fetch_one(pool)
    .await?;

  info!(
    project_id = %ctx.project_id(),
    invitation_id = %row.id,
    role = %row.role,
    "Issued invitation"
  );

  let message = InvitationEmail {
    email: row.email.clone(),
    token: row.token.clone(),
    role: row.role,
    project_name: ctx.project.name.clone(),
    inviter_name: ctx.actor.display_name.clone(),
  };

  let invitation = Invitation::from(row);

  if let Err(err) = mailer.send_invitation(&message).await {
    warn!(invitation_id = %invitation.id, "Failed to send invitation email: {}", err);

    return Err(ApiError::InvitationEmailFailed {
      link: invite_link(app_origin, &invitation.token),
      invitation: Box::new(invitation),
      reason: err.to_string(),
    });
  }

  Ok(invitation)
}

/// Joins the invited project as `actor`
///
/// The transaction starts by deleting the invitation, so the write lock is
/// taken before anything is read and concurrent accepts of one token are
/// serialized. Checks then run on the deleted row in order: it has not
/// expired, the actor is not already a member, and the actor's email equals
/// the invitee email exactly. A failed check rolls back, which leaves the
/// invitation in place. A token is consumed at most once.
///
/// # Errors
/// - InvalidInvitation if the token is unknown or already consumed
/// - InvitationExpired if the invitation is past its expiry
/// - AlreadyMember if the actor already belongs to the project
/// - InvitationEmailMismatch if the actor signed in with another email
pub async fn accept(pool: &SqlitePool, token: &str, actor: &User) -> ApiResult<MemberRow> {
  let mut tx = pool.begin().await?;

  let (invitation, member) = match consume(&mut tx, token, actor).await {
    Ok(accepted) => accepted,
    Err(err) => {
      tx.rollback().await?;
      return Err(err);
    },
  };

  tx.commit().await?;

  info!(
    project_id = %invitation.project_id,
    invitation_id = %invitation.id,
    user_id = %actor.id,
    "Accepted invitation"
  );

  Ok(member)
}

async fn consume(conn: &mut SqliteConnection, token: &str, actor: &User) -> ApiResult<(InvitationRow, MemberRow)> {
  let invitation = sqlx::query_as::<_, InvitationRow>(DELETE_INVITATION_BY_TOKEN)
    .bind(token)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ApiError::InvalidInvitation)?;

  if invitation.is_expired(Utc::now()) {
    return Err(ApiError::InvitationExpired);
  }

  if find_member(conn, invitation.project_id, actor.id).await?.is_some() {
    return Err(ApiError::AlreadyMember);
  }

  if actor.email != invitation.email {
    return Err(ApiError::InvitationEmailMismatch(invitation.email));
  }

  let member = sqlx::query_as::<_, MemberRow>(INSERT_MEMBER)
    .bind(Uuid::new_v4())
    .bind(invitation.project_id)
    .bind(actor.id)
    .bind(MemberRole::from(invitation.role))
    .bind(&invitation.scopes)
    .fetch_one(&mut *conn)
    .await
    .map_err(|err| {
      if is_unique_violation(&err) {
        ApiError::AlreadyMember
      } else {
        ApiError::DatabaseError(err)
      }
    })?;

  Ok((invitation, member))
}

/// Deletes the invitation behind `token`
///
/// Declining is idempotent. The removed invitation is returned when there
/// was one.
pub async fn decline(pool: &SqlitePool, token: &str) -> ApiResult<Option<InvitationRow>> {
  let removed = sqlx::query_as::<_, InvitationRow>(DELETE_INVITATION_BY_TOKEN)
    .bind(token)
    .fetch_optional(pool)
    .await?;

  match &removed {
    Some(invitation) => info!(
      project_id = %invitation.project_id,
      invitation_id = %invitation.id,
      "Declined invitation"
    ),
    None => info!("Declined unknown invitation"),
  }

  Ok(removed)
}

async fn find_member(conn: &mut SqliteConnection, project_id: Uuid, user_id: Uuid) -> ApiResult<Option<MemberRow>> {
  sqlx::query_as::<_, MemberRow>(FIND_MEMBER)
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(Into::into)
}

/// 256 random bits, URL-safe base64 without padding.
fn generate_token() -> String {
  let mut bytes = [0u8; TOKEN_BYTES];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}
