use std::sync::Arc;

use axum::{
  extract::State,
  http::{header, HeaderValue, StatusCode},
  middleware::from_fn_with_state,
  response::IntoResponse,
  Extension, Json,
};
use secrecy::SecretBox;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tower_cookies::{
  cookie::{time::Duration, SameSite},
  Cookie,
};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use validator::Validate;

use crate::{
  entities::user::User,
  error::{ApiError, ApiResult},
  handlers::auth::{encode_jwt, Keys, AUTH_COOKIE_NAME},
  service::mutation,
  AppJson, AppState,
};

use super::auth::auth_guard;

const USERS_TAG: &str = "users";

pub fn init_users_routes(state: AppState) -> OpenApiRouter<AppState> {
  let public_routes = OpenApiRouter::new().routes(routes!(sign_up)).routes(routes!(login));

  let protected_auth_routes = OpenApiRouter::new()
    .routes(routes!(get_me))
    .routes(routes!(logout))
    .layer(from_fn_with_state(state, auth_guard));

  public_routes.merge(protected_auth_routes)
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
pub struct SignUp {
  #[validate(email)]
  email: String,
  #[validate(length(min = 1, max = 100))]
  display_name: String,
  #[validate(length(min = 8))]
  password: String,
}

#[utoipa::path(
  post,
  path = "/signup",
  tag = USERS_TAG,
  request_body = SignUp,
  responses(
    (status = 201, description = "Account created", body = User),
    (status = 400, description = "Validation error"),
    (status = 409, description = "Email already registered")
  )
)]
#[instrument(skip(pool, input))]
async fn sign_up(
  State(pool): State<Arc<SqlitePool>>,
  AppJson(input): AppJson<SignUp>,
) -> ApiResult<(StatusCode, Json<User>)> {
  input.validate()?;

  let params = mutation::users::SignUpParams {
    email: input.email,
    display_name: input.display_name,
    password: SecretBox::new(Box::new(input.password)),
  };

  debug!("Register new user with request: {:?}", params);

  let user = mutation::users::sign_up(&pool, params).await?;

  Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginParams {
  #[validate(email)]
  email: String,
  #[validate(length(min = 1))]
  password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
  pub status: String,
  pub token: String,
}

#[utoipa::path(
  post,
  path = "/login",
  tag = USERS_TAG,
  request_body = LoginParams,
  responses(
    (status = 200, description = "Login successful", body = LoginResponse),
    (status = 401, description = "Invalid credentials"),
    (status = 400, description = "Validation error")
  )
)]
#[instrument(skip(pool, keys, input))]
async fn login(
  State(pool): State<Arc<SqlitePool>>,
  State(keys): State<Arc<Keys>>,
  AppJson(input): AppJson<LoginParams>,
) -> ApiResult<impl IntoResponse> {
  input.validate()?;

  let params = mutation::users::SignInParams {
    email: input.email,
    password: SecretBox::new(Box::new(input.password)),
  };

  debug!("Try login user with params {:?}", params);

  let user = mutation::users::sign_in(&pool, params).await?;
  let token = encode_jwt(&keys, user.id)?;

  let cookie = build_auth_cookie(token.clone(), Duration::minutes(keys.maxage_minutes()));
  let response = LoginResponse {
    status: "success".to_string(),
    token,
  };

  Ok(([(header::SET_COOKIE, cookie_header(&cookie)?)], Json(response)))
}

#[utoipa::path(
  get,
  path = "/me",
  tag = USERS_TAG,
  responses(
    (status = OK, description = "Return current logged user", body = User),
    (status = 401, description = "Unauthorized")
  )
)]
async fn get_me(Extension(user): Extension<User>) -> ApiResult<Json<User>> {
  Ok(Json(user))
}

#[utoipa::path(
  post,
  path = "/logout",
  tag = USERS_TAG,
  responses(
    (status = 200, description = "Logout successful")
  )
)]
async fn logout() -> ApiResult<impl IntoResponse> {
  let cookie = build_auth_cookie(String::new(), Duration::seconds(-1));

  Ok((
    [(header::SET_COOKIE, cookie_header(&cookie)?)],
    Json(json!({"status": "success"})),
  ))
}

fn build_auth_cookie(token: String, max_age: Duration) -> Cookie<'static> {
  Cookie::build((AUTH_COOKIE_NAME, token))
    .path("/")
    .max_age(max_age)
    .same_site(SameSite::Lax)
    .http_only(true)
    .build()
}

fn cookie_header(cookie: &Cookie<'_>) -> ApiResult<HeaderValue> {
  HeaderValue::from_str(&cookie.to_string()).map_err(|err| ApiError::Anyhow(err.into()))
}
