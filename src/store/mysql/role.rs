use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySql, MySqlPool, Transaction};
use tracing::warn;

use super::parse_id;
use crate::model::ids::{AssignmentId, RoleId, UserId};
use crate::model::role::{Role, RoleAssignment};
use crate::repository::{RoleAssignmentRepository, RoleUnitOfWork};

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: String,
    user_id: String,
    role_id: String,
    role: String,
    delete_flag: bool,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl TryFrom<AssignmentRow> for RoleAssignment {
    type Error = anyhow::Error;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|_| anyhow!("unknown role name in catalog: {}", row.role))?;
        Ok(RoleAssignment {
            id: parse_id("user_roles.id", &row.id)?,
            user_id: parse_id("user_roles.user_id", &row.user_id)?,
            role_id: parse_id("user_roles.role_id", &row.role_id)?,
            role,
            delete_flag: row.delete_flag,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        })
    }
}

#[derive(Clone)]
pub struct MySqlRoleRepository {
    pool: MySqlPool,
}

impl MySqlRoleRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleAssignmentRepository for MySqlRoleRepository {
    async fn current_hierarchical_role(
        &self,
        user_id: UserId,
    ) -> anyhow::Result<Option<RoleAssignment>> {
        let active = self.active_roles(user_id).await?;
        let hierarchical: Vec<RoleAssignment> = active
            .into_iter()
            .filter(|a| a.role.is_hierarchical())
            .collect();
        if hierarchical.len() > 1 {
            warn!(
                user_id = %user_id,
                count = hierarchical.len(),
                "User holds more than one hierarchical role, using the highest"
            );
        }
        Ok(hierarchical.into_iter().max_by_key(|a| a.role.rank()))
    }

    async fn active_roles(&self, user_id: UserId) -> anyhow::Result<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT ur.id, ur.user_id, ur.role_id, r.name AS role, ur.delete_flag,
                   ur.created_at, ur.created_by, ur.updated_at, ur.updated_by
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ? AND ur.delete_flag = 0
            ORDER BY ur.created_at ASC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(RoleAssignment::try_from).collect()
    }

    async fn role_id_by_name(&self, role: Role) -> anyhow::Result<Option<RoleId>> {
        let raw = sqlx::query_scalar::<_, String>("SELECT id FROM roles WHERE name = ?")
            .bind(role.as_ref())
            .fetch_optional(&self.pool)
            .await?;
        raw.map(|id| parse_id("roles.id", &id)).transpose()
    }

    async fn begin(&self) -> anyhow::Result<Box<dyn RoleUnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(MySqlRoleUnitOfWork { tx }))
    }
}

/// Wraps a MySQL transaction. Dropping it without `commit` rolls back.
struct MySqlRoleUnitOfWork {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl RoleUnitOfWork for MySqlRoleUnitOfWork {
    async fn retire(&mut self, assignment_id: AssignmentId, actor: &str) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_roles
            SET delete_flag = 1, updated_at = ?, updated_by = ?
            WHERE id = ? AND delete_flag = 0
            "#,
        )
        .bind(Utc::now())
        .bind(actor)
        .bind(assignment_id.to_string())
        .execute(&mut *self.tx)
        .await?;

        // another transition got there first
        if result.rows_affected() != 1 {
            return Err(anyhow!("assignment {assignment_id} is not active"));
        }
        Ok(())
    }

    async fn assign(&mut self, assignment: RoleAssignment) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles
            (id, user_id, role_id, delete_flag, created_at, created_by, updated_at, updated_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assignment.id.to_string())
        .bind(assignment.user_id.to_string())
        .bind(assignment.role_id.to_string())
        .bind(assignment.delete_flag)
        .bind(assignment.created_at)
        .bind(&assignment.created_by)
        .bind(assignment.updated_at)
        .bind(&assignment.updated_by)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
