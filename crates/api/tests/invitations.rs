//! Invitation issue, accept and decline.

mod common;

use chrono::{Duration, Utc};
use common::{FailingMailer, RecordingMailer, APP_ORIGIN};
use designdesk_api::{
  entities::member::{AssignableRole, MemberRole, Scope},
  error::ApiError,
  mailer::invite_link,
  service::{mutation, query},
};
use sqlx::SqlitePool;
use uuid::Uuid;

use mutation::invitations::IssueInvitationParams;

fn invite(email: &str, role: AssignableRole) -> IssueInvitationParams {
  IssueInvitationParams {
    email: email.to_string(),
    role,
    scopes: vec![Scope::Requirements],
  }
}

async fn member_count(pool: &SqlitePool, project_id: Uuid) -> i64 {
  common::count(
    pool,
    "SELECT COUNT(*) FROM project_members WHERE project_id = ?1",
    project_id,
  )
  .await
}

/// Issuing stores the invitation for seven days and emails the deep link.
#[sqlx::test]
async fn test_issue_sends_invitation_email(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Olivia").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;
  let mailer = RecordingMailer::default();

  let before = Utc::now();
  let invitation = mutation::invitations::issue(&pool, &mailer, APP_ORIGIN, &ctx, invite("a@x.com", AssignableRole::Member))
    .await
    .unwrap();

  assert_eq!(invitation.email, "a@x.com");
  assert_eq!(invitation.role, AssignableRole::Member);
  assert!(!invitation.is_expired);
  assert!(invitation.expires_at >= before + Duration::days(7) - Duration::seconds(1));
  assert!(invitation.expires_at <= Utc::now() + Duration::days(7));

  let sent = mailer.sent();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].email, "a@x.com");
  assert_eq!(sent[0].token, invitation.token);
  assert_eq!(sent[0].project_name, "Shop");
  assert_eq!(sent[0].inviter_name, "Olivia");
  assert!(sent[0]
    .text_body(APP_ORIGIN)
    .contains(&format!("{APP_ORIGIN}/invite?token={}", invitation.token)));
}

/// Members cannot invite, and nothing is written when they try.
#[sqlx::test]
async fn test_member_cannot_invite(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let member = common::create_user(&pool, "member@x.com", "Member").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  common::add_member(&pool, project.id, &member, "member").await;

  let ctx = common::context(&pool, project.id, &member).await;
  let mailer = RecordingMailer::default();
  let result =
    mutation::invitations::issue(&pool, &mailer, APP_ORIGIN, &ctx, invite("a@x.com", AssignableRole::Member)).await;

  assert!(matches!(result, Err(ApiError::PermissionDenied(_))));
  assert!(query::invitations::list(&pool, project.id).await.unwrap().is_empty());
  assert!(mailer.sent().is_empty());
}

/// A failed email still leaves a usable invitation and reports its link.
#[sqlx::test]
async fn test_email_failure_keeps_invitation(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let result =
    mutation::invitations::issue(&pool, &FailingMailer, APP_ORIGIN, &ctx, invite("a@x.com", AssignableRole::Admin))
      .await;

  let (invitation, link) = match result {
    Err(ApiError::InvitationEmailFailed { invitation, link, .. }) => (invitation, link),
    other => panic!("expected a partial failure, got {other:?}"),
  };
  assert_eq!(link, invite_link(APP_ORIGIN, &invitation.token));

  let stored = query::invitations::find_by_token(&pool, &invitation.token)
    .await
    .unwrap()
    .expect("invitation must survive the email failure");
  assert_eq!(stored.id, invitation.id);

  let invitee = common::create_user(&pool, "a@x.com", "Ann").await;
  let member = mutation::invitations::accept(&pool, &invitation.token, &invitee)
    .await
    .unwrap();
  assert_eq!(member.role, MemberRole::Admin);
}

/// Invite as member, decline, and the token is gone from the project list.
#[sqlx::test]
async fn test_decline_removes_invitation(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let invitation = mutation::invitations::issue(
    &pool,
    &RecordingMailer::default(),
    APP_ORIGIN,
    &ctx,
    invite("a@x.com", AssignableRole::Member),
  )
  .await
  .unwrap();

  let removed = mutation::invitations::decline(&pool, &invitation.token).await.unwrap();
  assert_eq!(removed.map(|row| row.id), Some(invitation.id));

  let invitations = query::invitations::list(&pool, project.id).await.unwrap();
  assert!(invitations.iter().all(|row| row.token != invitation.token));

  // Declining again is not an error.
  assert!(mutation::invitations::decline(&pool, &invitation.token)
    .await
    .unwrap()
    .is_none());
}

/// Invite as admin, accept as the invitee: admin membership, invitation consumed.
#[sqlx::test]
async fn test_accept_grants_role_and_consumes_token(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let invitee = common::create_user(&pool, "a@x.com", "Ann").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let invitation = mutation::invitations::issue(
    &pool,
    &RecordingMailer::default(),
    APP_ORIGIN,
    &ctx,
    invite("a@x.com", AssignableRole::Admin),
  )
  .await
  .unwrap();

  let membership = mutation::invitations::accept(&pool, &invitation.token, &invitee)
    .await
    .unwrap();
  assert_eq!(membership.project_id, project.id);
  assert_eq!(membership.role, MemberRole::Admin);
  assert_eq!(membership.scopes.0, vec![Scope::Requirements]);

  let members = query::members::list(&pool, project.id).await.unwrap();
  let admin = members.iter().find(|m| m.user_id == invitee.id).unwrap();
  assert_eq!(admin.role, MemberRole::Admin);
  assert_eq!(admin.effective_scopes, Scope::ALL.to_vec());

  let invitations = query::invitations::list(&pool, project.id).await.unwrap();
  assert!(invitations.iter().all(|row| row.token != invitation.token));

  // The token is single use.
  let again = mutation::invitations::accept(&pool, &invitation.token, &invitee).await;
  assert!(matches!(again, Err(ApiError::InvalidInvitation)));
}

/// Expired invitations are refused and left in place.
#[sqlx::test]
async fn test_accept_expired_invitation_fails(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let invitee = common::create_user(&pool, "a@x.com", "Ann").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let invitation = mutation::invitations::issue(
    &pool,
    &RecordingMailer::default(),
    APP_ORIGIN,
    &ctx,
    invite("a@x.com", AssignableRole::Member),
  )
  .await
  .unwrap();

  sqlx::query("UPDATE project_invitations SET expires_at = ?1 WHERE id = ?2")
    .bind(Utc::now() - Duration::minutes(1))
    .bind(invitation.id)
    .execute(&pool)
    .await
    .unwrap();

  let result = mutation::invitations::accept(&pool, &invitation.token, &invitee).await;
  assert!(matches!(result, Err(ApiError::InvitationExpired)));
  assert_eq!(member_count(&pool, project.id).await, 1);

  let stored = query::invitations::find_by_token(&pool, &invitation.token)
    .await
    .unwrap()
    .unwrap();
  assert!(stored.is_expired(Utc::now()));
}

/// The signed-in email must equal the invitee email exactly.
#[sqlx::test]
async fn test_accept_with_other_email_fails(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let shouting = common::create_user(&pool, "A@x.com", "Ann").await;
  let someone = common::create_user(&pool, "b@x.com", "Ben").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let invitation = mutation::invitations::issue(
    &pool,
    &RecordingMailer::default(),
    APP_ORIGIN,
    &ctx,
    invite("a@x.com", AssignableRole::Member),
  )
  .await
  .unwrap();

  for user in [&someone, &shouting] {
    let result = mutation::invitations::accept(&pool, &invitation.token, user).await;
    assert!(
      matches!(result, Err(ApiError::InvitationEmailMismatch(ref email)) if email == "a@x.com"),
      "{} must not accept",
      user.email
    );
  }

  assert_eq!(member_count(&pool, project.id).await, 1);
  assert!(query::invitations::find_by_token(&pool, &invitation.token)
    .await
    .unwrap()
    .is_some());
}

/// Existing members get a distinct error and the invitation stays intact.
#[sqlx::test]
async fn test_accept_as_existing_member_fails(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let invitation = mutation::invitations::issue(
    &pool,
    &RecordingMailer::default(),
    APP_ORIGIN,
    &ctx,
    invite("owner@x.com", AssignableRole::Admin),
  )
  .await
  .unwrap();

  let result = mutation::invitations::accept(&pool, &invitation.token, &owner).await;
  assert!(matches!(result, Err(ApiError::AlreadyMember)));

  assert!(query::invitations::find_by_token(&pool, &invitation.token)
    .await
    .unwrap()
    .is_some());
  let owner_row = query::members::find(&pool, project.id, owner.id).await.unwrap().unwrap();
  assert_eq!(owner_row.role, MemberRole::Owner);
}

/// Unknown tokens are reported as invalid.
#[sqlx::test]
async fn test_accept_unknown_token_fails(pool: SqlitePool) {
  let user = common::create_user(&pool, "a@x.com", "Ann").await;

  let result = mutation::invitations::accept(&pool, "no-such-token", &user).await;
  assert!(matches!(result, Err(ApiError::InvalidInvitation)));
}

/// Several invitations to the same address may coexist.
#[sqlx::test]
async fn test_duplicate_invitations_are_allowed(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;
  let mailer = RecordingMailer::default();

  let first = mutation::invitations::issue(&pool, &mailer, APP_ORIGIN, &ctx, invite("a@x.com", AssignableRole::Member))
    .await
    .unwrap();
  let second = mutation::invitations::issue(&pool, &mailer, APP_ORIGIN, &ctx, invite("a@x.com", AssignableRole::Admin))
    .await
    .unwrap();

  assert_ne!(first.token, second.token);
  assert_eq!(query::invitations::list(&pool, project.id).await.unwrap().len(), 2);
}

/// Racing accepts of one token: exactly one joins, the other sees a consumed token.
#[sqlx::test]
async fn test_concurrent_accepts_consume_token_once(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let invitee = common::create_user(&pool, "a@x.com", "Ann").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;
  let mailer = RecordingMailer::default();

  for _ in 0..10 {
    let invitation = mutation::invitations::issue(&pool, &mailer, APP_ORIGIN, &ctx, invite("a@x.com", AssignableRole::Member))
      .await
      .unwrap();

    let (left, right) = tokio::join!(
      mutation::invitations::accept(&pool, &invitation.token, &invitee),
      mutation::invitations::accept(&pool, &invitation.token, &invitee),
    );

    let (joined, refused) = match (left, right) {
      (Ok(member), Err(err)) | (Err(err), Ok(member)) => (member, err),
      (left, right) => panic!("expected one winner, got {left:?} and {right:?}"),
    };
    assert_eq!(joined.user_id, invitee.id);
    assert!(matches!(refused, ApiError::InvalidInvitation), "got {refused:?}");
    assert_eq!(member_count(&pool, project.id).await, 2);

    sqlx::query("DELETE FROM project_members WHERE project_id = ?1 AND user_id = ?2")
      .bind(project.id)
      .bind(invitee.id)
      .execute(&pool)
      .await
      .unwrap();
  }
}

/// A refused accept leaves the invitation usable by the right person.
#[sqlx::test]
async fn test_refused_accept_keeps_invitation_usable(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let invitee = common::create_user(&pool, "a@x.com", "Ann").await;
  let someone = common::create_user(&pool, "b@x.com", "Ben").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let invitation = mutation::invitations::issue(
    &pool,
    &RecordingMailer::default(),
    APP_ORIGIN,
    &ctx,
    invite("a@x.com", AssignableRole::Member),
  )
  .await
  .unwrap();

  let refused = mutation::invitations::accept(&pool, &invitation.token, &someone).await;
  assert!(matches!(refused, Err(ApiError::InvitationEmailMismatch(_))));

  let member = mutation::invitations::accept(&pool, &invitation.token, &invitee)
    .await
    .unwrap();
  assert_eq!(member.user_id, invitee.id);
}
