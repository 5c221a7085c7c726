use async_trait::async_trait;

use crate::model::ids::{RoleId, UserId};
use crate::model::user::User;
use crate::repository::Pagination;

/// Storage for user accounts. Lookups skip logically deleted users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persists the account together with its first role assignment.
    async fn create(&self, user: User, initial_role_id: RoleId) -> anyhow::Result<User>;

    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Ordered by `created_at`.
    async fn list(&self, page: Pagination, ascending: bool) -> anyhow::Result<Vec<User>>;

    /// Writes profile and contact fields plus attribution.
    async fn update(&self, user: User) -> anyhow::Result<User>;

    /// Logical delete. Returns false if no active user had that id.
    async fn remove(&self, id: UserId, updated_by: &str) -> anyhow::Result<bool>;

    /// Every username ever registered, used to warm the username filter.
    async fn list_usernames(&self) -> anyhow::Result<Vec<String>>;
}
