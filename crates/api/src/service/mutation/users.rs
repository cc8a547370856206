use anyhow::Context;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand_core::OsRng;
use secrecy::{ExposeSecret, SecretBox};
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::task;
use tracing::{error, info};
use uuid::Uuid;

use crate::entities::user::User;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::service::query;

const CREATE_USER: &str =
  "INSERT INTO users (id, email, display_name, password) VALUES (?1, ?2, ?3, ?4) RETURNING *";

#[derive(Debug, Deserialize)]
pub struct SignInParams {
  pub email: String,
  pub password: SecretBox<String>,
}

/// Checks the password of the account registered under `email`.
///
/// Unknown emails and wrong passwords are indistinguishable to the caller.
pub async fn sign_in(pool: &SqlitePool, params: SignInParams) -> ApiResult<User> {
  let user = query::users::find_by_email(pool, &params.email)
    .await?
    .ok_or(ApiError::InvalidCredentials())?;

  verify_password(SecretBox::from(Box::new(user.password.to_owned())), params.password).await?;
  Ok(user)
}

#[derive(Debug, Deserialize)]
pub struct SignUpParams {
  pub email: String,
  pub display_name: String,
  pub password: SecretBox<String>,
}

/// Registers a new account.
///
/// # Errors
/// - UserAlreadyExist if the email is taken
/// - DatabaseError for any database-related issues
pub async fn sign_up(pool: &SqlitePool, mut params: SignUpParams) -> ApiResult<User> {
  if query::users::find_by_email(pool, &params.email).await?.is_some() {
    return Err(ApiError::UserAlreadyExist(params.email));
  }

  let password = std::mem::take(&mut params.password);
  let hashed_password = hash_password(password).await?;

  let user = sqlx::query_as::<_, User>(CREATE_USER)
    .bind(Uuid::new_v4())
    .bind(&params.email)
    .bind(&params.display_name)
    .bind(hashed_password)
    .fetch_one(pool)
    .await
    .map_err(|err| {
      if is_unique_violation(&err) {
        ApiError::UserAlreadyExist(params.email.clone())
      } else {
        ApiError::DatabaseError(err)
      }
    })?;

  info!(user_id = %user.id, "Registered new user");

  Ok(user)
}

async fn hash_password(password: SecretBox<String>) -> ApiResult<String> {
  task::spawn_blocking(move || {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params::new(15000, 2, 1, None).map_err(|err| {
      error!("Invalid argon2 parameters: {}", err);
      ApiError::InvalidCredentials()
    })?;
    let argon2_config = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    argon2_config
      .hash_password(password.expose_secret().as_bytes(), &salt)
      .map_err(|err| {
        error!("Failed to hash password: {}", err);
        ApiError::InvalidCredentials()
      })
      .map(|hash| hash.to_string())
  })
  .await
  .context("panic in hash_password()")?
}

async fn verify_password(
  expected_password_hash: SecretBox<String>,
  password_candidate: SecretBox<String>,
) -> ApiResult<()> {
  task::spawn_blocking(move || {
    let parsed_hash = PasswordHash::new(expected_password_hash.expose_secret()).map_err(|err| {
      info!("Failed to parse password hash: {}", err);
      ApiError::InvalidCredentials()
    })?;

    Argon2::default()
      .verify_password(password_candidate.expose_secret().as_bytes(), &parsed_hash)
      .map_err(|_| ApiError::InvalidCredentials())
  })
  .await
  .context("panic in verify_password()")?
}
