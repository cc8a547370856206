use std::sync::Arc;

use axum::{
  extract::{Request, State},
  http::header,
  middleware::Next,
  response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{ApiError, ApiResult};
use crate::service::query;

pub const AUTH_COOKIE_NAME: &str = "token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  pub sub: String, // User associated with token
  pub iat: usize,  // Issued at time of the token
  pub exp: usize,  // Expiry time of the token
}

/// Signing keys and session lifetime, built once from [`AuthConfig`].
pub struct Keys {
  encoding: EncodingKey,
  decoding: DecodingKey,
  maxage_minutes: i64,
}

impl Keys {
  pub fn new(config: &AuthConfig) -> Self {
    let secret = config.jwt_secret.as_bytes();

    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      maxage_minutes: config.jwt_maxage_minutes,
    }
  }

  pub fn maxage_minutes(&self) -> i64 {
    self.maxage_minutes
  }
}

pub fn encode_jwt(keys: &Keys, user_id: Uuid) -> ApiResult<String> {
  let now = chrono::Utc::now();
  let iat = now.timestamp() as usize;
  let exp = (now + chrono::Duration::minutes(keys.maxage_minutes)).timestamp() as usize;
  let claims: Claims = Claims {
    sub: user_id.to_string(),
    exp,
    iat,
  };

  encode(&Header::default(), &claims, &keys.encoding)
    .map_err(|_| ApiError::Anyhow(anyhow::anyhow!("Can't encode token")))
}

fn decode_jwt(keys: &Keys, token: &str) -> ApiResult<Uuid> {
  let claims = decode::<Claims>(token, &keys.decoding, &Validation::default())
    .map_err(|_| ApiError::Unauthorized("Invalid token"))?
    .claims;

  Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized("Invalid token"))
}

/// Resolves the session user from the `token` cookie or a bearer header and
/// stores it in the request extensions.
pub async fn auth_guard(
  cookie_jar: CookieJar,
  State(pool): State<Arc<SqlitePool>>,
  State(keys): State<Arc<Keys>>,
  mut req: Request,
  next: Next,
) -> ApiResult<impl IntoResponse> {
  let token = cookie_jar
    .get(AUTH_COOKIE_NAME)
    .map(|cookie| cookie.value().to_string())
    .or_else(|| {
      req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| {
          auth_value
            .strip_prefix("Bearer ")
            .map(|auth_value| auth_value.to_owned())
        })
    })
    .ok_or(ApiError::Unauthorized("You are not logged in, please provide token"))?;

  let user_id = decode_jwt(&keys, &token)?;

  let user = query::users::find_by_id(&pool, user_id)
    .await?
    .ok_or(ApiError::Unauthorized("The user belonging to this token no longer exists"))?;

  debug!(user_id = %user.id, "Authenticated request");

  req.extensions_mut().insert(user);
  Ok(next.run(req).await)
}
