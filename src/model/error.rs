use chrono::NaiveDate;
use thiserror::Error;

use crate::model::attendance::TimeBoundary;
use crate::model::ids::{AttendanceId, UserId};
use crate::model::role::Role;

/// Errors raised by the domain and application layers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{0}")]
    InvalidTimeOrder(TimeBoundary),

    #[error("Transportation expenses must not be negative (got {amount})")]
    InvalidAmount { amount: i64 },

    #[error("User {user_id} is not eligible: requires role '{required}', has {}", describe(.actual))]
    NotEligibleForTransition {
        user_id: UserId,
        required: Role,
        actual: Option<Role>,
    },

    #[error("Role '{0}' is missing from the role catalog")]
    RoleNotFound(Role),

    #[error("Attendance with ID {id} not found")]
    AttendanceNotFound { id: AttendanceId },

    #[error("User with ID {id} not found")]
    UserNotFound { id: UserId },

    #[error("Attendance record for user {user_id} on {work_date} already exists")]
    DuplicateAttendance { user_id: UserId, work_date: NaiveDate },

    #[error("Username {username} already exists")]
    UsernameTaken { username: String },

    #[error("Email {email} already exists")]
    EmailTaken { email: String },

    #[error("Validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Database error: {message}")]
    Database { message: String },
}

fn describe(role: &Option<Role>) -> String {
    match role {
        Some(r) => format!("'{r}'"),
        None => "no hierarchical role".to_string(),
    }
}

impl DomainError {
    pub fn not_eligible(user_id: UserId, required: Role, actual: Option<Role>) -> Self {
        Self::NotEligibleForTransition {
            user_id,
            required,
            actual,
        }
    }

    pub fn attendance_not_found(id: AttendanceId) -> Self {
        Self::AttendanceNotFound { id }
    }

    pub fn user_not_found(id: UserId) -> Self {
        Self::UserNotFound { id }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Errors caused by bad caller input rather than missing data or a broken system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidTimeOrder(_)
                | DomainError::InvalidAmount { .. }
                | DomainError::DuplicateAttendance { .. }
                | DomainError::Validation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let e = DomainError::InvalidTimeOrder(TimeBoundary::ClockInRestIn);
        assert_eq!(e.to_string(), "Clock-in time must be before rest-in time");

        let e = DomainError::InvalidAmount { amount: -1 };
        assert!(e.to_string().contains("-1"));

        let user = UserId::generate();
        let e = DomainError::not_eligible(user, Role::User, None);
        assert!(e.to_string().contains("no hierarchical role"));

        let e = DomainError::not_eligible(user, Role::Manager, Some(Role::Admin));
        assert!(e.to_string().contains("'admin'"));
    }

    #[test]
    fn validation_classification() {
        assert!(DomainError::InvalidAmount { amount: -5 }.is_validation());
        assert!(DomainError::validation("email", "bad").is_validation());
        assert!(!DomainError::RoleNotFound(Role::Manager).is_validation());
        assert!(!DomainError::database("boom").is_validation());
    }
}
