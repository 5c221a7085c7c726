use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

use crate::api::error::ApiError;
use crate::auth::jwt::verify_token;
use crate::model::ids::UserId;
use crate::model::role::{Role, has_manager_rank};
use crate::model::user::User;

/// The caller behind a verified access token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub username: String,
    pub role: Option<Role>,
}

impl AuthUser {
    /// The role is read from the stored account, never from token claims.
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.primary_role(),
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Some(Role::Admin) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only".to_string()))
        }
    }

    pub fn require_manager(&self) -> Result<(), ApiError> {
        if has_manager_rank(self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Manager or admin only".to_string()))
        }
    }

    /// Admins and managers may act on anyone; everybody else only on themselves.
    pub fn require_self_or_manager(&self, owner: UserId) -> Result<(), ApiError> {
        if self.user_id == owner || has_manager_rank(self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Not allowed for this user".to_string()))
        }
    }
}

/// Verifies a bearer token and returns the account it was issued to.
pub fn token_subject(token: &str, secret: &str) -> Result<UserId, ApiError> {
    let claims = verify_token(token, secret)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid or expired token: {e}")))?;
    claims
        .sub
        .parse::<UserId>()
        .map_err(|_| ApiError::Unauthorized("Invalid subject".to_string()))
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ApiError::Unauthorized("Missing token".to_string())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Option<Role>) -> AuthUser {
        AuthUser {
            user_id: UserId::generate(),
            username: "someone".to_string(),
            role,
        }
    }

    #[test]
    fn admin_gate() {
        assert!(caller(Some(Role::Admin)).require_admin().is_ok());
        assert!(caller(Some(Role::Manager)).require_admin().is_err());
        assert!(caller(None).require_admin().is_err());
    }

    #[test]
    fn manager_gate_accepts_admin() {
        assert!(caller(Some(Role::Admin)).require_manager().is_ok());
        assert!(caller(Some(Role::Manager)).require_manager().is_ok());
        assert!(caller(Some(Role::User)).require_manager().is_err());
    }

    #[test]
    fn owner_may_act_on_self() {
        let me = caller(Some(Role::User));
        assert!(me.require_self_or_manager(me.user_id).is_ok());
        assert!(me.require_self_or_manager(UserId::generate()).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let user = UserId::generate();
        let token =
            crate::auth::jwt::generate_access_token(user, "taro", None, "right", 60).unwrap();
        assert_eq!(token_subject(&token, "right").unwrap(), user);
        assert!(matches!(
            token_subject(&token, "wrong"),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[actix_web::test]
    async fn extractor_needs_the_middleware() {
        let req = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "Bearer whatever"))
            .to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());

        let stored = caller(Some(Role::Manager));
        req.extensions_mut().insert(stored.clone());
        assert_eq!(AuthUser::extract(&req).await.unwrap(), stored);
    }
}
