use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, error};

use crate::model::error::DomainError;
use crate::model::ids::RoleId;
use crate::model::role::Role;
use crate::repository::RoleAssignmentRepository;

/// Resolves role names to catalog ids, caching hits.
///
/// The catalog is seeded once and practically never changes, so a long TTL is
/// fine. Misses are not cached: a missing role is a data-integrity problem
/// that should keep failing loudly until someone fixes the catalog.
#[derive(Clone)]
pub struct RoleCatalog {
    repo: Arc<dyn RoleAssignmentRepository>,
    cache: Cache<Role, RoleId>,
}

impl RoleCatalog {
    pub fn new(repo: Arc<dyn RoleAssignmentRepository>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(16) // one slot per role name
            .time_to_live(ttl)
            .build();
        Self { repo, cache }
    }

    pub async fn resolve(&self, role: Role) -> Result<RoleId, DomainError> {
        if let Some(id) = self.cache.get(&role).await {
            return Ok(id);
        }

        debug!(role = %role, "Role id cache miss");
        let found = self.repo.role_id_by_name(role).await.map_err(|e| {
            error!(error = %e, role = %role, "Failed to look up role id");
            DomainError::database(e.to_string())
        })?;

        match found {
            Some(id) => {
                self.cache.insert(role, id).await;
                Ok(id)
            }
            None => {
                error!(role = %role, "Role missing from catalog");
                Err(DomainError::RoleNotFound(role))
            }
        }
    }
}
