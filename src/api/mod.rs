pub mod attendance;
pub mod error;
pub mod health;
pub mod user;

use std::str::FromStr;

use error::ApiError;

/// Parses an id taken from a path or query string.
pub(crate) fn parse_id<T: FromStr>(field: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {field}: {raw}")))
}
