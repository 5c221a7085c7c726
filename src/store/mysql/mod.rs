//! MySQL adapters built on sqlx runtime queries.

mod attendance;
mod role;
mod user;

pub use attendance::MySqlAttendanceRepository;
pub use role::MySqlRoleRepository;
pub use user::MySqlUserRepository;

use std::str::FromStr;

use anyhow::anyhow;

use crate::repository::UniqueViolation;

/// SQLSTATE for integrity constraint violations, duplicate keys included.
const DUPLICATE_KEY: &str = "23000";

/// Turns a duplicate-key failure into [`UniqueViolation`]; anything else passes through.
fn classify(e: sqlx::Error) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some(DUPLICATE_KEY) {
            return UniqueViolation::new(db_err.message().to_string()).into();
        }
    }
    e.into()
}

fn parse_id<T>(column: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|e| anyhow!("invalid uuid in column {column}: {raw} ({e})"))
}
