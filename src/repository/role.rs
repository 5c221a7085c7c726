use async_trait::async_trait;

use crate::model::ids::{AssignmentId, RoleId, UserId};
use crate::model::role::{Role, RoleAssignment};

/// Access to the role catalog and the user ↔ role link table.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// The user's active assignment to `user`, `manager` or `admin`, if any.
    async fn current_hierarchical_role(
        &self,
        user_id: UserId,
    ) -> anyhow::Result<Option<RoleAssignment>>;

    /// Every active assignment, hierarchical or not.
    async fn active_roles(&self, user_id: UserId) -> anyhow::Result<Vec<RoleAssignment>>;

    /// Canonical catalog id for a role name.
    async fn role_id_by_name(&self, role: Role) -> anyhow::Result<Option<RoleId>>;

    /// Opens a unit of work; nothing is visible to readers until `commit`.
    async fn begin(&self) -> anyhow::Result<Box<dyn RoleUnitOfWork>>;
}

/// A transactional boundary around "retire old assignment, create new one".
///
/// Dropping the unit without calling `commit` discards the staged changes.
#[async_trait]
pub trait RoleUnitOfWork: Send {
    async fn retire(&mut self, assignment_id: AssignmentId, actor: &str) -> anyhow::Result<()>;

    async fn assign(&mut self, assignment: RoleAssignment) -> anyhow::Result<()>;

    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
}
