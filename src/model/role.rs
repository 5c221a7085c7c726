use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::model::error::DomainError;
use crate::model::ids::{AssignmentId, RoleId, UserId};

/// Named roles known to the catalog.
///
/// `User`, `Manager` and `Admin` form a strictly linear hierarchy. `Guest` is a
/// plain label with no rank and never takes part in promotion or demotion.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Manager,
    Admin,
    Guest,
}

impl Role {
    pub fn rank(&self) -> Option<u8> {
        match self {
            Role::User => Some(1),
            Role::Manager => Some(2),
            Role::Admin => Some(3),
            Role::Guest => None,
        }
    }

    pub fn is_hierarchical(&self) -> bool {
        self.rank().is_some()
    }

    /// Role granted to every newly registered account.
    pub fn default_for_new_user() -> Self {
        Role::User
    }
}

/// True when `role` ranks at or above `manager`.
pub fn has_manager_rank(role: Option<Role>) -> bool {
    let floor = Role::Manager.rank();
    role.and_then(|r| r.rank()).is_some_and(|rank| Some(rank) >= floor)
}

/// The four single-step moves along the hierarchy.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RoleTransition {
    PromoteToManager,
    PromoteToAdmin,
    DemoteFromAdminToManager,
    DemoteFromManagerToUser,
}

impl RoleTransition {
    /// Role the user must currently hold.
    pub fn from(&self) -> Role {
        match self {
            RoleTransition::PromoteToManager => Role::User,
            RoleTransition::PromoteToAdmin => Role::Manager,
            RoleTransition::DemoteFromAdminToManager => Role::Admin,
            RoleTransition::DemoteFromManagerToUser => Role::Manager,
        }
    }

    /// Role the user holds afterwards.
    pub fn to(&self) -> Role {
        match self {
            RoleTransition::PromoteToManager => Role::Manager,
            RoleTransition::PromoteToAdmin => Role::Admin,
            RoleTransition::DemoteFromAdminToManager => Role::Manager,
            RoleTransition::DemoteFromManagerToUser => Role::User,
        }
    }

    /// Checks the exact precondition. Anything other than `from()`, including
    /// no hierarchical role at all, is rejected.
    pub fn check(&self, user_id: UserId, current: Option<Role>) -> Result<(), DomainError> {
        if current == Some(self.from()) {
            Ok(())
        } else {
            Err(DomainError::not_eligible(user_id, self.from(), current))
        }
    }
}

/// One row of the user ↔ role link table.
///
/// Transitions never edit an assignment's role; they retire the old row and
/// insert a new one, so the table doubles as an audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub role: Role,
    pub delete_flag: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl RoleAssignment {
    pub fn new(user_id: UserId, role_id: RoleId, role: Role, actor: &str) -> Self {
        let now = Utc::now();
        Self {
            id: AssignmentId::generate(),
            user_id,
            role_id,
            role,
            delete_flag: false,
            created_at: now,
            created_by: actor.to_string(),
            updated_at: now,
            updated_by: actor.to_string(),
        }
    }

    pub fn retire(&self, actor: &str) -> Self {
        Self {
            delete_flag: true,
            updated_at: Utc::now(),
            updated_by: actor.to_string(),
            ..self.clone()
        }
    }

    pub fn is_active(&self) -> bool {
        !self.delete_flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ranks_are_strictly_increasing() {
        assert_eq!(Role::User.rank(), Some(1));
        assert_eq!(Role::Manager.rank(), Some(2));
        assert_eq!(Role::Admin.rank(), Some(3));
        assert_eq!(Role::Guest.rank(), None);
        assert!(!Role::Guest.is_hierarchical());
    }

    #[test]
    fn role_names_round_trip_through_strings() {
        for role in Role::iter() {
            let parsed: Role = role.as_ref().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert_eq!(Role::Manager.to_string(), "manager");
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn manager_rank_check() {
        assert!(!has_manager_rank(Some(Role::User)));
        assert!(has_manager_rank(Some(Role::Manager)));
        assert!(has_manager_rank(Some(Role::Admin)));
        assert!(!has_manager_rank(Some(Role::Guest)));
        assert!(!has_manager_rank(None));
    }

    #[test]
    fn transitions_are_single_step() {
        for t in [
            RoleTransition::PromoteToManager,
            RoleTransition::PromoteToAdmin,
            RoleTransition::DemoteFromAdminToManager,
            RoleTransition::DemoteFromManagerToUser,
        ] {
            let from = t.from().rank().unwrap() as i8;
            let to = t.to().rank().unwrap() as i8;
            assert_eq!((from - to).abs(), 1, "{t} skips a level");
        }
    }

    #[test]
    fn check_requires_exact_precondition() {
        let user = UserId::generate();
        assert!(RoleTransition::PromoteToManager.check(user, Some(Role::User)).is_ok());

        match RoleTransition::PromoteToManager.check(user, Some(Role::Admin)) {
            Err(DomainError::NotEligibleForTransition { required, actual, .. }) => {
                assert_eq!(required, Role::User);
                assert_eq!(actual, Some(Role::Admin));
            }
            other => panic!("expected NotEligibleForTransition, got {other:?}"),
        }

        assert!(RoleTransition::PromoteToAdmin.check(user, None).is_err());
        assert!(RoleTransition::DemoteFromManagerToUser.check(user, Some(Role::Guest)).is_err());
    }

    #[test]
    fn retire_keeps_identity_and_marks_deleted() {
        let a = RoleAssignment::new(UserId::generate(), RoleId::generate(), Role::User, "system");
        let retired = a.retire("admin");
        assert_eq!(retired.id, a.id);
        assert_eq!(retired.role, Role::User);
        assert!(!retired.is_active());
        assert_eq!(retired.updated_by, "admin");
        assert_eq!(retired.created_by, "system");
    }
}
