//! In-process implementations of the persistence ports.
//!
//! Used by the test suites and handy for running the API without MySQL. They
//! honour the same contracts as the MySQL adapters, including "deleted rows are
//! invisible" and "role changes only land on commit".

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::model::attendance::AttendanceRecord;
use crate::model::ids::{AssignmentId, AttendanceId, RoleId, UserId};
use crate::model::role::{Role, RoleAssignment};
use crate::model::user::User;
use crate::repository::{
    AttendanceOrderField, AttendanceRepository, Ordering, Pagination, RoleAssignmentRepository,
    RoleUnitOfWork, UniqueViolation, UserRepository,
};

fn read<T>(lock: &RwLock<T>) -> anyhow::Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> anyhow::Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

/// Case-insensitive match, like the default MySQL collation on `users`.
fn same_key(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryAttendanceRepository {
    rows: RwLock<HashMap<AttendanceId, AttendanceRecord>>,
}

impl MemoryAttendanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn active_where<F>(&self, pred: F) -> anyhow::Result<Vec<AttendanceRecord>>
    where
        F: Fn(&AttendanceRecord) -> bool,
    {
        Ok(read(&self.rows)?
            .values()
            .filter(|r| r.is_active() && pred(r))
            .cloned()
            .collect())
    }

    /// Raw row including deleted ones, for assertions.
    pub fn raw(&self, id: AttendanceId) -> Option<AttendanceRecord> {
        self.rows.read().ok().and_then(|rows| rows.get(&id).cloned())
    }
}

fn sort_records(records: &mut [AttendanceRecord], ordering: Ordering) {
    records.sort_by(|a, b| {
        let ord = match ordering.field {
            AttendanceOrderField::WorkDate => a.work_date.cmp(&b.work_date),
            AttendanceOrderField::ClockIn => a.clock_in.cmp(&b.clock_in),
            AttendanceOrderField::ClockOut => a.clock_out.cmp(&b.clock_out),
            AttendanceOrderField::CreatedAt => a.created_at.cmp(&b.created_at),
            AttendanceOrderField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        if ordering.ascending { ord } else { ord.reverse() }
    });
}

#[async_trait]
impl AttendanceRepository for MemoryAttendanceRepository {
    async fn find_by_id(&self, id: AttendanceId) -> anyhow::Result<Option<AttendanceRecord>> {
        Ok(read(&self.rows)?.get(&id).filter(|r| r.is_active()).cloned())
    }

    async fn find_by_user_and_date(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
    ) -> anyhow::Result<Option<AttendanceRecord>> {
        Ok(self
            .active_where(|r| r.user_id == user_id && r.work_date == work_date)?
            .into_iter()
            .next())
    }

    async fn find_by_user(
        &self,
        user_id: UserId,
        page: Pagination,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let mut rows = self.active_where(|r| r.user_id == user_id)?;
        sort_records(&mut rows, Ordering::default());
        Ok(page.apply(rows))
    }

    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        page: Pagination,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let mut rows = self.active_where(|r| r.work_date >= start && r.work_date <= end)?;
        sort_records(
            &mut rows,
            Ordering {
                field: AttendanceOrderField::WorkDate,
                ascending: true,
            },
        );
        Ok(page.apply(rows))
    }

    async fn find_by_user_and_date_range(
        &self,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
        page: Pagination,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let mut rows = self.active_where(|r| {
            r.user_id == user_id && r.work_date >= start && r.work_date <= end
        })?;
        sort_records(
            &mut rows,
            Ordering {
                field: AttendanceOrderField::WorkDate,
                ascending: true,
            },
        );
        Ok(page.apply(rows))
    }

    async fn find_all(
        &self,
        page: Pagination,
        ordering: Ordering,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let mut rows = self.active_where(|_| true)?;
        sort_records(&mut rows, ordering);
        Ok(page.apply(rows))
    }

    async fn save(&self, record: AttendanceRecord) -> anyhow::Result<AttendanceRecord> {
        let mut rows = write(&self.rows)?;
        let clash = rows.values().any(|r| {
            r.id != record.id
                && r.is_active()
                && record.is_active()
                && r.user_id == record.user_id
                && r.work_date == record.work_date
        });
        if clash {
            return Err(UniqueViolation::new(format!(
                "attendances(user_id, work_date) = ({}, {})",
                record.user_id, record.work_date
            ))
            .into());
        }
        rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete(&self, id: AttendanceId) -> anyhow::Result<()> {
        let mut rows = write(&self.rows)?;
        if let Some(current) = rows.get(&id) {
            let deleted = current.deactivate();
            rows.insert(id, deleted);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

pub struct MemoryRoleRepository {
    catalog: HashMap<Role, RoleId>,
    assignments: Arc<RwLock<HashMap<AssignmentId, RoleAssignment>>>,
    lookups: AtomicUsize,
}

impl MemoryRoleRepository {
    /// Catalog containing every role.
    pub fn seeded() -> Self {
        Self::with_catalog(&[Role::User, Role::Manager, Role::Admin, Role::Guest])
    }

    pub fn with_catalog(roles: &[Role]) -> Self {
        Self {
            catalog: roles.iter().map(|r| (*r, RoleId::generate())).collect(),
            assignments: Arc::new(RwLock::new(HashMap::new())),
            lookups: AtomicUsize::new(0),
        }
    }

    /// How many times `role_id_by_name` was called.
    pub fn catalog_lookups(&self) -> usize {
        self.lookups.load(AtomicOrdering::Relaxed)
    }

    /// Assigns `role` directly, bypassing the state machine.
    pub fn grant(
        &self,
        user_id: UserId,
        role: Role,
        actor: &str,
    ) -> anyhow::Result<RoleAssignment> {
        let role_id = *self
            .catalog
            .get(&role)
            .ok_or_else(|| anyhow!("role {role} not in catalog"))?;
        let assignment = RoleAssignment::new(user_id, role_id, role, actor);
        write(&self.assignments)?.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    /// Full history for a user, retired rows included, oldest first.
    pub fn history(&self, user_id: UserId) -> Vec<RoleAssignment> {
        let mut rows: Vec<RoleAssignment> = self
            .assignments
            .read()
            .map(|a| a.values().filter(|a| a.user_id == user_id).cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(|a| a.created_at);
        rows
    }

    fn active_for(&self, user_id: UserId) -> anyhow::Result<Vec<RoleAssignment>> {
        let mut rows: Vec<RoleAssignment> = read(&self.assignments)?
            .values()
            .filter(|a| a.user_id == user_id && a.is_active())
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.created_at);
        Ok(rows)
    }
}

#[async_trait]
impl RoleAssignmentRepository for MemoryRoleRepository {
    async fn current_hierarchical_role(
        &self,
        user_id: UserId,
    ) -> anyhow::Result<Option<RoleAssignment>> {
        Ok(self
            .active_for(user_id)?
            .into_iter()
            .filter(|a| a.role.is_hierarchical())
            .max_by_key(|a| a.role.rank()))
    }

    async fn active_roles(&self, user_id: UserId) -> anyhow::Result<Vec<RoleAssignment>> {
        self.active_for(user_id)
    }

    async fn role_id_by_name(&self, role: Role) -> anyhow::Result<Option<RoleId>> {
        self.lookups.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(self.catalog.get(&role).copied())
    }

    async fn begin(&self) -> anyhow::Result<Box<dyn RoleUnitOfWork>> {
        Ok(Box::new(MemoryRoleUnitOfWork {
            target: Arc::clone(&self.assignments),
            retire: Vec::new(),
            assign: Vec::new(),
        }))
    }
}

struct MemoryRoleUnitOfWork {
    target: Arc<RwLock<HashMap<AssignmentId, RoleAssignment>>>,
    retire: Vec<(AssignmentId, String)>,
    assign: Vec<RoleAssignment>,
}

#[async_trait]
impl RoleUnitOfWork for MemoryRoleUnitOfWork {
    async fn retire(&mut self, assignment_id: AssignmentId, actor: &str) -> anyhow::Result<()> {
        self.retire.push((assignment_id, actor.to_string()));
        Ok(())
    }

    async fn assign(&mut self, assignment: RoleAssignment) -> anyhow::Result<()> {
        self.assign.push(assignment);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let Self {
            target,
            retire,
            assign,
        } = *self;
        let mut rows = write(&target)?;
        // validate everything before touching anything
        for (id, _) in &retire {
            match rows.get(id) {
                Some(a) if a.is_active() => {}
                _ => return Err(anyhow!("assignment {id} is not active")),
            }
        }
        for (id, actor) in &retire {
            if let Some(current) = rows.get(id) {
                let retired = current.retire(actor);
                rows.insert(*id, retired);
            }
        }
        for assignment in assign {
            rows.insert(assignment.id, assignment);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub struct MemoryUserRepository {
    rows: RwLock<HashMap<UserId, User>>,
    roles: Arc<MemoryRoleRepository>,
}

impl MemoryUserRepository {
    pub fn new(roles: Arc<MemoryRoleRepository>) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            roles,
        }
    }

    fn with_roles(&self, mut user: User) -> anyhow::Result<User> {
        user.roles = self
            .roles
            .active_for(user.id)?
            .into_iter()
            .map(|a| a.role)
            .collect();
        Ok(user)
    }

    fn find_active<F>(&self, pred: F) -> anyhow::Result<Option<User>>
    where
        F: Fn(&User) -> bool,
    {
        let found = read(&self.rows)?
            .values()
            .find(|u| !u.delete_flag && pred(u))
            .cloned();
        found.map(|u| self.with_roles(u)).transpose()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: User, initial_role_id: RoleId) -> anyhow::Result<User> {
        let role = self
            .roles
            .catalog
            .iter()
            .find(|(_, id)| **id == initial_role_id)
            .map(|(role, _)| *role)
            .ok_or_else(|| anyhow!("unknown role id {initial_role_id}"))?;
        {
            let mut rows = write(&self.rows)?;
            if rows.values().any(|u| same_key(&u.username, &user.username)) {
                let key = format!("users.username = {}", user.username);
                return Err(UniqueViolation::new(key).into());
            }
            if rows.values().any(|u| same_key(&u.email, &user.email)) {
                return Err(UniqueViolation::new(format!("users.email = {}", user.email)).into());
            }
            rows.insert(user.id, user.clone());
        }
        self.roles.grant(user.id, role, &user.created_by)?;
        self.with_roles(user)
    }

    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        self.find_active(|u| u.id == id)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_active(|u| same_key(&u.username, username))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_active(|u| same_key(&u.email, email))
    }

    async fn list(&self, page: Pagination, ascending: bool) -> anyhow::Result<Vec<User>> {
        let mut users: Vec<User> = read(&self.rows)?
            .values()
            .filter(|u| !u.delete_flag)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        if !ascending {
            users.reverse();
        }
        page.apply(users)
            .into_iter()
            .map(|u| self.with_roles(u))
            .collect()
    }

    async fn update(&self, user: User) -> anyhow::Result<User> {
        {
            let mut rows = write(&self.rows)?;
            match rows.get(&user.id) {
                Some(existing) if !existing.delete_flag => {
                    rows.insert(user.id, user.clone());
                }
                _ => return Err(anyhow!("user {} not found", user.id)),
            }
        }
        self.with_roles(user)
    }

    async fn remove(&self, id: UserId, updated_by: &str) -> anyhow::Result<bool> {
        let mut rows = write(&self.rows)?;
        match rows.get_mut(&id) {
            Some(user) if !user.delete_flag => {
                user.delete_flag = true;
                user.updated_by = updated_by.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_usernames(&self) -> anyhow::Result<Vec<String>> {
        Ok(read(&self.rows)?.values().map(|u| u.username.clone()).collect())
    }
}
