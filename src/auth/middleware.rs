use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::{Error, HttpMessage, ResponseError};
use tracing::debug;

use crate::api::error::ApiError;
use crate::auth::auth::{AuthUser, token_subject};
use crate::config::Config;
use crate::model::error::DomainError;
use crate::service::UserService;

/// Rejects requests without a valid bearer token for an active account and
/// stashes the caller in the request extensions for the `AuthUser` extractor.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let secret = match req.app_data::<Data<Config>>() {
        Some(config) => config.jwt_secret.clone(),
        None => {
            let resp = ApiError::Internal("App config missing".to_string()).error_response();
            return Ok(req.into_response(resp));
        }
    };

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v,
            Err(_) => {
                let resp = ApiError::Unauthorized(
                    "Invalid Authorization header encoding".to_string(),
                )
                .error_response();
                return Ok(req.into_response(resp));
            }
        },
        None => {
            let resp =
                ApiError::Unauthorized("Missing Authorization header".to_string()).error_response();
            return Ok(req.into_response(resp));
        }
    };

    let Some(token) = header_value.strip_prefix("Bearer ") else {
        let resp = ApiError::Unauthorized("Authorization header must start with Bearer".to_string())
            .error_response();
        return Ok(req.into_response(resp));
    };

    let user_id = match token_subject(token, &secret) {
        Ok(id) => id,
        Err(e) => {
            debug!(error = %e, "Rejected bearer token");
            let resp = e.error_response();
            return Ok(req.into_response(resp));
        }
    };

    let Some(users) = req.app_data::<Data<UserService>>().cloned() else {
        let resp = ApiError::Internal("User service missing".to_string()).error_response();
        return Ok(req.into_response(resp));
    };

    // removed accounts and role changes take effect on the next request
    let auth_user = match users.get_user(user_id).await {
        Ok(user) => AuthUser::from_user(&user),
        Err(DomainError::UserNotFound { .. }) => {
            debug!(%user_id, "Token subject no longer active");
            let resp =
                ApiError::Unauthorized("Account is no longer active".to_string()).error_response();
            return Ok(req.into_response(resp));
        }
        Err(e) => {
            let resp = ApiError::from(e).error_response();
            return Ok(req.into_response(resp));
        }
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
