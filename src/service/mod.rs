//! Application services. Each one orchestrates the repository ports and the
//! domain model, and speaks only in [`DomainError`].

pub mod attendance;
pub mod role;
pub mod user;

pub use attendance::{AttendanceQuery, AttendanceService};
pub use role::RoleService;
pub use user::{UserListQuery, UserService};

use tracing::error;

use crate::model::error::DomainError;

/// Logs a storage failure and folds it into [`DomainError::Database`].
pub(crate) fn storage_error(e: anyhow::Error) -> DomainError {
    error!(error = %e, "Storage operation failed");
    DomainError::database(e.to_string())
}
