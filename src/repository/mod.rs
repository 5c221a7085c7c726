//! Persistence ports used by the services.
//!
//! Implementations live in `crate::store`. All methods are object-safe and
//! async via `async_trait`; storage failures come back as `anyhow::Error` and
//! are turned into domain errors by the services.

pub mod attendance;
pub mod role;
pub mod user;

pub use attendance::{AttendanceOrderField, AttendanceRepository, Ordering};
pub use role::{RoleAssignmentRepository, RoleUnitOfWork};
pub use user::UserRepository;

use serde::Deserialize;
use thiserror::Error;

/// Carried inside the `anyhow::Error` of a write that hit a uniqueness
/// constraint, so services can tell it apart from other storage failures.
#[derive(Debug, Error)]
#[error("unique constraint violated: {key}")]
pub struct UniqueViolation {
    /// Name or description of the violated key.
    pub key: String,
}

impl UniqueViolation {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Finds a violation anywhere in the error chain.
    pub fn find(err: &anyhow::Error) -> Option<&UniqueViolation> {
        err.chain().find_map(|cause| cause.downcast_ref::<UniqueViolation>())
    }
}

/// Offset/limit window. `None` means "no bound".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Pagination {
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Self {
        Self { limit, offset }
    }

    /// Applies the window to an already sorted list.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = self.offset.unwrap_or(0) as usize;
        let iter = items.into_iter().skip(offset);
        match self.limit {
            Some(limit) => iter.take(limit as usize).collect(),
            None => iter.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_windows() {
        let items: Vec<u32> = (1..=10).collect();
        assert_eq!(Pagination::default().apply(items.clone()), items);
        assert_eq!(Pagination::new(Some(3), None).apply(items.clone()), vec![1, 2, 3]);
        assert_eq!(Pagination::new(Some(3), Some(8)).apply(items.clone()), vec![9, 10]);
        assert!(Pagination::new(None, Some(20)).apply(items).is_empty());
    }
}
