use std::sync::Arc;

use actix_web::web::{Data, ServiceConfig};
use sqlx::MySqlPool;

use crate::config::Config;
use crate::repository::{AttendanceRepository, RoleAssignmentRepository, UserRepository};
use crate::service::{AttendanceService, RoleService, UserService};
use crate::store::mysql::{MySqlAttendanceRepository, MySqlRoleRepository, MySqlUserRepository};
use crate::utils::role_catalog::RoleCatalog;
use crate::utils::username_filter::UsernameFilter;

/// Services shared by every worker.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub roles: RoleService,
    pub attendances: AttendanceService,
    pub user_repo: Arc<dyn UserRepository>,
    pub usernames: Arc<UsernameFilter>,
}

impl AppState {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        role_repo: Arc<dyn RoleAssignmentRepository>,
        attendance_repo: Arc<dyn AttendanceRepository>,
        config: &Config,
    ) -> Self {
        let catalog = RoleCatalog::new(role_repo.clone(), config.role_cache_ttl);
        let usernames = Arc::new(UsernameFilter::new(config.username_filter_capacity));
        Self {
            users: UserService::new(user_repo.clone(), catalog.clone(), usernames.clone()),
            roles: RoleService::new(role_repo, catalog),
            attendances: AttendanceService::new(attendance_repo),
            user_repo,
            usernames,
        }
    }

    pub fn mysql(pool: MySqlPool, config: &Config) -> Self {
        Self::new(
            Arc::new(MySqlUserRepository::new(pool.clone())),
            Arc::new(MySqlRoleRepository::new(pool.clone())),
            Arc::new(MySqlAttendanceRepository::new(pool)),
            config,
        )
    }

    /// Loads every known username into the filter.
    pub async fn warmup(&self) -> anyhow::Result<usize> {
        self.usernames.warmup(self.user_repo.as_ref()).await
    }

    /// Registers the services and config as app data.
    pub fn register(&self, cfg: &mut ServiceConfig, config: &Config) {
        cfg.app_data(Data::new(self.users.clone()))
            .app_data(Data::new(self.roles.clone()))
            .app_data(Data::new(self.attendances.clone()))
            .app_data(Data::new(config.clone()));
    }
}
