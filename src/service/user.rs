use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use utoipa::IntoParams;

use super::storage_error;
use crate::auth::password::{hash_password, verify_password};
use crate::model::error::DomainError;
use crate::model::ids::UserId;
use crate::model::role::Role;
use crate::model::user::{NewUser, User, UserPatch};
use crate::repository::{Pagination, UniqueViolation, UserRepository};
use crate::utils::role_catalog::RoleCatalog;
use crate::utils::username_filter::UsernameFilter;

pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Paging for the user listing, oldest account first unless `ascending` is false.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub ascending: Option<bool>,
}

impl Default for UserListQuery {
    fn default() -> Self {
        Self {
            offset: Some(0),
            limit: Some(DEFAULT_PAGE_SIZE),
            ascending: Some(true),
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    catalog: RoleCatalog,
    usernames: Arc<UsernameFilter>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        catalog: RoleCatalog,
        usernames: Arc<UsernameFilter>,
    ) -> Self {
        Self {
            users,
            catalog,
            usernames,
        }
    }

    /// Registers an account holding the default role.
    #[instrument(
        name = "user.create",
        skip(self, new),
        fields(username = %new.username, email = %new.email)
    )]
    pub async fn create_user(&self, new: NewUser, actor: &str) -> Result<User, DomainError> {
        new.validate()?;
        let username = new.username.trim().to_string();

        if self.usernames.is_definitely_free(&username) {
            debug!("Username filter ruled out a clash, skipping lookup");
        } else if self
            .users
            .find_by_username(&username)
            .await
            .map_err(storage_error)?
            .is_some()
        {
            return Err(DomainError::UsernameTaken { username });
        }

        if self
            .users
            .find_by_email(&new.email)
            .await
            .map_err(storage_error)?
            .is_some()
        {
            return Err(DomainError::EmailTaken { email: new.email });
        }

        let role_id = self.catalog.resolve(Role::default_for_new_user()).await?;
        let hashed = hash_password(&new.password)
            .map_err(|e| DomainError::database(format!("password hashing failed: {e}")))?;

        let email = new.email.clone();
        let user = User::register(new, hashed, actor);
        let created = self.users.create(user, role_id).await.map_err(|e| {
            match UniqueViolation::find(&e) {
                Some(v) if v.key.contains("email") => DomainError::EmailTaken {
                    email: email.clone(),
                },
                Some(_) => DomainError::UsernameTaken {
                    username: username.clone(),
                },
                None => storage_error(e),
            }
        })?;

        self.usernames.insert(&created.username);
        info!(user_id = %created.id, "User registered");
        Ok(created)
    }

    #[instrument(name = "user.get", skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: UserId) -> Result<User, DomainError> {
        self.users
            .find_by_id(id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| DomainError::user_not_found(id))
    }

    #[instrument(name = "user.list", skip(self))]
    pub async fn list_users(&self, query: UserListQuery) -> Result<Vec<User>, DomainError> {
        let page = Pagination::new(
            Some(query.limit.unwrap_or(DEFAULT_PAGE_SIZE)),
            Some(query.offset.unwrap_or(0)),
        );
        let users = self
            .users
            .list(page, query.ascending.unwrap_or(true))
            .await
            .map_err(storage_error)?;
        debug!(count = users.len(), "Listed users");
        Ok(users)
    }

    #[instrument(name = "user.update", skip(self, patch), fields(user_id = %id))]
    pub async fn update_user(
        &self,
        id: UserId,
        patch: UserPatch,
        updated_by: &str,
    ) -> Result<User, DomainError> {
        patch.validate()?;
        let current = self.get_user(id).await?;
        let updated = current.apply(patch, updated_by);
        let saved = self.users.update(updated).await.map_err(storage_error)?;
        info!("User updated");
        Ok(saved)
    }

    /// Logical delete.
    #[instrument(name = "user.remove", skip(self), fields(user_id = %id))]
    pub async fn remove_user(&self, id: UserId, updated_by: &str) -> Result<(), DomainError> {
        let removed = self
            .users
            .remove(id, updated_by)
            .await
            .map_err(storage_error)?;
        if !removed {
            return Err(DomainError::user_not_found(id));
        }
        info!("User removed");
        Ok(())
    }

    /// The active account matching the credentials, or `None`.
    #[instrument(name = "user.authenticate", skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DomainError> {
        let Some(user) = self
            .users
            .find_by_username(username.trim())
            .await
            .map_err(storage_error)?
        else {
            debug!("No active user with that name");
            return Ok(None);
        };

        if verify_password(password, &user.hashed_password) {
            Ok(Some(user))
        } else {
            warn!(user_id = %user.id, "Password mismatch");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::NaiveDate;

    use crate::model::user::Gender;
    use crate::store::memory::{MemoryRoleRepository, MemoryUserRepository};

    fn registration(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "correct-horse".to_string(),
            first_name: Some("Hanako".to_string()),
            first_name_ruby: None,
            last_name: Some("Suzuki".to_string()),
            last_name_ruby: None,
            gender: Gender::Female,
            birth_day: NaiveDate::from_ymd_opt(1992, 8, 15).unwrap(),
            phone_number: None,
            zip_code: None,
            address: None,
        }
    }

    fn setup_with(roles: MemoryRoleRepository) -> UserService {
        let roles = Arc::new(roles);
        let users = Arc::new(MemoryUserRepository::new(roles.clone()));
        let catalog = RoleCatalog::new(roles, Duration::from_secs(60));
        UserService::new(users, catalog, Arc::new(UsernameFilter::new(1_000)))
    }

    fn setup() -> UserService {
        setup_with(MemoryRoleRepository::seeded())
    }

    #[actix_web::test]
    async fn registration_assigns_user_role_and_hashes_password() {
        let svc = setup();
        let user = svc
            .create_user(registration("hanako", "hanako@example.com"), "system")
            .await
            .unwrap();

        assert_eq!(user.roles, vec![Role::User]);
        assert_ne!(user.hashed_password, "correct-horse");
        assert_eq!(svc.get_user(user.id).await.unwrap().username, "hanako");
    }

    #[actix_web::test]
    async fn duplicate_username_and_email_are_rejected() {
        let svc = setup();
        svc.create_user(registration("hanako", "hanako@example.com"), "system")
            .await
            .unwrap();

        let err = svc
            .create_user(registration("hanako", "other@example.com"), "system")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::UsernameTaken { .. }));

        let err = svc
            .create_user(registration("hanako2", "hanako@example.com"), "system")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::EmailTaken { .. }));
    }

    #[actix_web::test]
    async fn missing_default_role_fails_registration() {
        let svc = setup_with(MemoryRoleRepository::with_catalog(&[Role::Admin]));
        let err = svc
            .create_user(registration("hanako", "hanako@example.com"), "system")
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::RoleNotFound(Role::User));
    }

    #[actix_web::test]
    async fn authenticate_checks_password_and_deletion() {
        let svc = setup();
        let user = svc
            .create_user(registration("hanako", "hanako@example.com"), "system")
            .await
            .unwrap();

        assert!(svc.authenticate("hanako", "correct-horse").await.unwrap().is_some());
        assert!(svc.authenticate("hanako", "wrong-horse").await.unwrap().is_none());
        assert!(svc.authenticate("nobody", "correct-horse").await.unwrap().is_none());

        svc.remove_user(user.id, "admin").await.unwrap();
        assert!(svc.authenticate("hanako", "correct-horse").await.unwrap().is_none());
        assert_eq!(
            svc.remove_user(user.id, "admin").await.unwrap_err(),
            DomainError::user_not_found(user.id)
        );
    }

    #[actix_web::test]
    async fn update_and_list() {
        let svc = setup();
        let first = svc
            .create_user(registration("hanako", "hanako@example.com"), "system")
            .await
            .unwrap();
        svc.create_user(registration("jiro", "jiro@example.com"), "system")
            .await
            .unwrap();

        let updated = svc
            .update_user(
                first.id,
                UserPatch {
                    zip_code: Some("150-0001".to_string()),
                    ..Default::default()
                },
                "hanako",
            )
            .await
            .unwrap();
        assert_eq!(updated.zip_code.as_deref(), Some("150-0001"));
        assert_eq!(updated.updated_by, "hanako");

        let err = svc
            .update_user(
                first.id,
                UserPatch {
                    zip_code: Some("1500001".to_string()),
                    ..Default::default()
                },
                "hanako",
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let all = svc.list_users(UserListQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].username, "hanako");

        let newest = svc
            .list_users(UserListQuery {
                offset: None,
                limit: Some(1),
                ascending: Some(false),
            })
            .await
            .unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].username, "jiro");
    }
}
