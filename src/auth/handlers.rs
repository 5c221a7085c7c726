use actix_web::{HttpResponse, get, web};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::api::error::ApiError;
use crate::auth::auth::AuthUser;
use crate::auth::jwt::generate_access_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::service::UserService;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "taro")]
    pub username: String,
    #[schema(example = "correct-horse-battery")]
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Seconds until the token expires.
    #[schema(example = 1800)]
    pub expires_in: usize,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: Option<Role>,
}

/// Exchange credentials for an access token
#[utoipa::path(
    post,
    path = "/auth/token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials", body = Object, example = json!({
            "message": "Invalid credentials"
        }))
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(users, config, payload),
    fields(username = %payload.username)
)]
pub async fn login(
    payload: web::Json<LoginRequest>,
    users: web::Data<UserService>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    if payload.username.trim().is_empty() || payload.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(ApiError::BadRequest(
            "Username or password required".to_string(),
        ));
    }

    let Some(user) = users
        .authenticate(&payload.username, &payload.password)
        .await?
    else {
        info!("Invalid credentials");
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    };

    debug!(user_id = %user.id, "Generating access token");
    let access_token = generate_access_token(
        user.id,
        &user.username,
        user.primary_role(),
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))?;

    info!(user_id = %user.id, "Login successful");
    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: config.access_token_ttl,
    }))
}

/// The authenticated caller
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[get("/auth/me")]
pub async fn me(auth: AuthUser, users: web::Data<UserService>) -> Result<HttpResponse, ApiError> {
    let user = users.get_user(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(MeResponse {
        user_id: user.id.to_string(),
        role: user.primary_role(),
        username: user.username,
        email: user.email,
    }))
}
