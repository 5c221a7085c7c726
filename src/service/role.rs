use std::sync::Arc;

use tracing::{info, instrument};

use super::storage_error;
use crate::model::error::DomainError;
use crate::model::ids::UserId;
use crate::model::role::{Role, RoleAssignment, RoleTransition, has_manager_rank};
use crate::repository::RoleAssignmentRepository;
use crate::utils::role_catalog::RoleCatalog;

/// Moves users one step up or down the `user → manager → admin` ladder.
#[derive(Clone)]
pub struct RoleService {
    repo: Arc<dyn RoleAssignmentRepository>,
    catalog: RoleCatalog,
}

impl RoleService {
    pub fn new(repo: Arc<dyn RoleAssignmentRepository>, catalog: RoleCatalog) -> Self {
        Self { repo, catalog }
    }

    pub async fn promote_to_manager(
        &self,
        user_id: UserId,
        actor: &str,
    ) -> Result<RoleAssignment, DomainError> {
        self.transition(user_id, RoleTransition::PromoteToManager, actor)
            .await
    }

    pub async fn promote_to_admin(
        &self,
        user_id: UserId,
        actor: &str,
    ) -> Result<RoleAssignment, DomainError> {
        self.transition(user_id, RoleTransition::PromoteToAdmin, actor)
            .await
    }

    pub async fn demote_from_admin_to_manager(
        &self,
        user_id: UserId,
        actor: &str,
    ) -> Result<RoleAssignment, DomainError> {
        self.transition(user_id, RoleTransition::DemoteFromAdminToManager, actor)
            .await
    }

    pub async fn demote_from_manager_to_user(
        &self,
        user_id: UserId,
        actor: &str,
    ) -> Result<RoleAssignment, DomainError> {
        self.transition(user_id, RoleTransition::DemoteFromManagerToUser, actor)
            .await
    }

    /// Verifies the exact current role, then retires it and assigns the
    /// target inside one unit of work. Returns the new assignment.
    #[instrument(name = "role.transition", skip(self), fields(transition = %transition))]
    pub async fn transition(
        &self,
        user_id: UserId,
        transition: RoleTransition,
        actor: &str,
    ) -> Result<RoleAssignment, DomainError> {
        let current = self
            .repo
            .current_hierarchical_role(user_id)
            .await
            .map_err(storage_error)?;

        transition.check(user_id, current.as_ref().map(|a| a.role))?;
        // check() only passes with an assignment present
        let Some(current) = current else {
            return Err(DomainError::not_eligible(user_id, transition.from(), None));
        };

        let target = transition.to();
        let role_id = self.catalog.resolve(target).await?;
        let assignment = RoleAssignment::new(user_id, role_id, target, actor);

        let mut uow = self.repo.begin().await.map_err(storage_error)?;
        uow.retire(current.id, actor).await.map_err(storage_error)?;
        uow.assign(assignment.clone())
            .await
            .map_err(storage_error)?;
        uow.commit().await.map_err(storage_error)?;

        info!(from = %current.role, to = %target, "Role changed");
        Ok(assignment)
    }

    /// Current hierarchical role, if the user holds one.
    pub async fn current_role(&self, user_id: UserId) -> Result<Option<Role>, DomainError> {
        Ok(self
            .repo
            .current_hierarchical_role(user_id)
            .await
            .map_err(storage_error)?
            .map(|a| a.role))
    }

    pub async fn has_manager_role(&self, user_id: UserId) -> Result<bool, DomainError> {
        Ok(has_manager_rank(self.current_role(user_id).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::store::memory::MemoryRoleRepository;

    fn setup(repo: MemoryRoleRepository) -> (RoleService, Arc<MemoryRoleRepository>) {
        let repo = Arc::new(repo);
        let catalog = RoleCatalog::new(repo.clone(), Duration::from_secs(60));
        (RoleService::new(repo.clone(), catalog), repo)
    }

    fn assert_not_eligible(err: DomainError, required: Role, actual: Option<Role>) {
        match err {
            DomainError::NotEligibleForTransition {
                required: r,
                actual: a,
                ..
            } => {
                assert_eq!(r, required);
                assert_eq!(a, actual);
            }
            other => panic!("expected NotEligibleForTransition, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn full_promotion_and_demotion_sequence() {
        let (svc, repo) = setup(MemoryRoleRepository::seeded());
        let user = UserId::generate();
        repo.grant(user, Role::User, "system").unwrap();

        let manager = svc.promote_to_manager(user, "root").await.unwrap();
        assert_eq!(manager.role, Role::Manager);
        assert!(svc.has_manager_role(user).await.unwrap());

        let err = svc.promote_to_manager(user, "root").await.unwrap_err();
        assert_not_eligible(err, Role::User, Some(Role::Manager));

        svc.promote_to_admin(user, "root").await.unwrap();
        assert_eq!(svc.current_role(user).await.unwrap(), Some(Role::Admin));

        svc.demote_from_admin_to_manager(user, "root").await.unwrap();
        assert_eq!(svc.current_role(user).await.unwrap(), Some(Role::Manager));

        let err = svc.promote_to_manager(user, "root").await.unwrap_err();
        assert_not_eligible(err, Role::User, Some(Role::Manager));

        svc.demote_from_manager_to_user(user, "root").await.unwrap();
        assert!(!svc.has_manager_role(user).await.unwrap());
    }

    #[actix_web::test]
    async fn transitions_keep_audit_history() {
        let (svc, repo) = setup(MemoryRoleRepository::seeded());
        let user = UserId::generate();
        repo.grant(user, Role::User, "system").unwrap();

        svc.promote_to_manager(user, "root").await.unwrap();
        svc.promote_to_admin(user, "root").await.unwrap();

        let history = repo.history(user);
        let roles: Vec<(Role, bool)> = history.iter().map(|a| (a.role, a.is_active())).collect();
        assert_eq!(
            roles,
            vec![
                (Role::User, false),
                (Role::Manager, false),
                (Role::Admin, true)
            ]
        );
        assert!(history.iter().filter(|a| !a.is_active()).all(|a| a.updated_by == "root"));
        assert_eq!(repo.active_roles(user).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn user_without_assignment_is_not_eligible() {
        let (svc, _) = setup(MemoryRoleRepository::seeded());
        let user = UserId::generate();

        let err = svc.promote_to_manager(user, "root").await.unwrap_err();
        assert_not_eligible(err, Role::User, None);
        assert!(!svc.has_manager_role(user).await.unwrap());
    }

    #[actix_web::test]
    async fn guest_is_outside_the_ladder() {
        let (svc, repo) = setup(MemoryRoleRepository::seeded());
        let user = UserId::generate();
        repo.grant(user, Role::Guest, "system").unwrap();

        let err = svc.promote_to_manager(user, "root").await.unwrap_err();
        assert_not_eligible(err, Role::User, None);
        assert!(!svc.has_manager_role(user).await.unwrap());
    }

    #[actix_web::test]
    async fn missing_target_role_leaves_assignment_untouched() {
        let (svc, repo) = setup(MemoryRoleRepository::with_catalog(&[Role::User]));
        let user = UserId::generate();
        let original = repo.grant(user, Role::User, "system").unwrap();

        let err = svc.promote_to_manager(user, "root").await.unwrap_err();
        assert_eq!(err, DomainError::RoleNotFound(Role::Manager));

        let active = repo.active_roles(user).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, original.id);
    }
}
