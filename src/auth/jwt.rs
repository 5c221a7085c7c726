use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ids::UserId;
use crate::model::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    /// Highest hierarchical role at issue time; `None` for guests.
    pub role: Option<Role>,
    pub exp: usize,
    pub jti: String,
}

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

pub fn generate_access_token(
    user_id: UserId,
    username: &str,
    role: Option<Role>,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_same_secret_only() {
        let user = UserId::generate();
        let token = generate_access_token(user, "taro", Some(Role::Manager), "s3cret", 60).unwrap();

        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, user.to_string());
        assert_eq!(claims.username, "taro");
        assert_eq!(claims.role, Some(Role::Manager));

        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: UserId::generate().to_string(),
            username: "taro".to_string(),
            role: Some(Role::User),
            exp: 1_000,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();
        assert!(verify_token(&token, "s3cret").is_err());
    }
}
