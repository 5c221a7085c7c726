use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::StreamExt;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, warn};

use super::{classify, parse_id};
use crate::model::ids::{AssignmentId, RoleId, UserId};
use crate::model::role::Role;
use crate::model::user::{Gender, User};
use crate::repository::{Pagination, UserRepository};

const COLUMNS: &str = "id, username, email, password, first_name, first_name_ruby, \
     last_name, last_name_ruby, gender, birth_day, phone_number, zip_code, address, \
     delete_flag, created_at, created_by, updated_at, updated_by";

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    password: String,
    first_name: Option<String>,
    first_name_ruby: Option<String>,
    last_name: Option<String>,
    last_name_ruby: Option<String>,
    gender: Option<String>,
    birth_day: Option<NaiveDate>,
    phone_number: Option<String>,
    zip_code: Option<String>,
    address: Option<String>,
    delete_flag: bool,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl UserRow {
    fn into_user(self, roles: Vec<Role>) -> anyhow::Result<User> {
        let gender = match self.gender.as_deref() {
            None => None,
            Some(raw) => Some(
                Gender::from_db(raw).ok_or_else(|| anyhow!("invalid gender in users row: {raw}"))?,
            ),
        };
        Ok(User {
            id: parse_id("users.id", &self.id)?,
            username: self.username,
            email: self.email,
            hashed_password: self.password,
            first_name: self.first_name,
            first_name_ruby: self.first_name_ruby,
            last_name: self.last_name,
            last_name_ruby: self.last_name_ruby,
            gender,
            birth_day: self.birth_day,
            phone_number: self.phone_number,
            zip_code: self.zip_code,
            address: self.address,
            roles,
            delete_flag: self.delete_flag,
            created_at: self.created_at,
            created_by: self.created_by,
            updated_at: self.updated_at,
            updated_by: self.updated_by,
        })
    }
}

#[derive(Clone)]
pub struct MySqlUserRepository {
    pool: MySqlPool,
}

impl MySqlUserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Active role names for each user id, in one round trip.
    async fn roles_for(&self, ids: &[String]) -> anyhow::Result<HashMap<String, Vec<Role>>> {
        let mut by_user: HashMap<String, Vec<Role>> = HashMap::new();
        if ids.is_empty() {
            return Ok(by_user);
        }

        let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
            "SELECT ur.user_id, r.name FROM user_roles ur \
             JOIN roles r ON r.id = ur.role_id \
             WHERE ur.delete_flag = 0 AND ur.user_id IN (",
        );
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(id.clone());
        }
        list.push_unseparated(") ORDER BY ur.created_at ASC");

        let rows: Vec<(String, String)> = qb.build_query_as().fetch_all(&self.pool).await?;
        for (user_id, name) in rows {
            match name.parse::<Role>() {
                Ok(role) => by_user.entry(user_id).or_default().push(role),
                Err(_) => warn!(user_id, role = %name, "Skipping unknown role name"),
            }
        }
        Ok(by_user)
    }

    async fn hydrate(&self, rows: Vec<UserRow>) -> anyhow::Result<Vec<User>> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut roles = self.roles_for(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let user_roles = roles.remove(&row.id).unwrap_or_default();
                row.into_user(user_roles)
            })
            .collect()
    }

    async fn find_one(&self, column: &str, value: String) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE {column} = ? AND delete_flag = 0");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserRepository for MySqlUserRepository {
    async fn create(&self, user: User, initial_role_id: RoleId) -> anyhow::Result<User> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users
            (id, username, email, password, first_name, first_name_ruby, last_name,
             last_name_ruby, gender, birth_day, phone_number, zip_code, address,
             delete_flag, created_at, created_by, updated_at, updated_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.first_name)
        .bind(&user.first_name_ruby)
        .bind(&user.last_name)
        .bind(&user.last_name_ruby)
        .bind(user.gender.map(|g| g.as_str()))
        .bind(user.birth_day)
        .bind(&user.phone_number)
        .bind(&user.zip_code)
        .bind(&user.address)
        .bind(user.delete_flag)
        .bind(user.created_at)
        .bind(&user.created_by)
        .bind(user.updated_at)
        .bind(&user.updated_by)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        sqlx::query(
            r#"
            INSERT INTO user_roles
            (id, user_id, role_id, delete_flag, created_at, created_by, updated_at, updated_by)
            VALUES (?, ?, ?, 0, ?, ?, ?, ?)
            "#,
        )
        .bind(AssignmentId::generate().to_string())
        .bind(user.id.to_string())
        .bind(initial_role_id.to_string())
        .bind(user.created_at)
        .bind(&user.created_by)
        .bind(user.updated_at)
        .bind(&user.updated_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(user_id = %user.id, "User row and initial role inserted");

        self.find_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow!("user {} vanished after insert", user.id))
    }

    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        self.find_one("id", id.to_string()).await
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_one("username", username.to_string()).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one("email", email.to_string()).await
    }

    async fn list(&self, page: Pagination, ascending: bool) -> anyhow::Result<Vec<User>> {
        let direction = if ascending { "ASC" } else { "DESC" };
        let sql = format!(
            "SELECT {COLUMNS} FROM users WHERE delete_flag = 0 \
             ORDER BY created_at {direction} LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(page.limit.unwrap_or(u64::MAX))
            .bind(page.offset.unwrap_or(0))
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }

    async fn update(&self, user: User) -> anyhow::Result<User> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = ?, first_name_ruby = ?, last_name = ?, last_name_ruby = ?,
                gender = ?, birth_day = ?, phone_number = ?, zip_code = ?, address = ?,
                updated_at = ?, updated_by = ?
            WHERE id = ? AND delete_flag = 0
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.first_name_ruby)
        .bind(&user.last_name)
        .bind(&user.last_name_ruby)
        .bind(user.gender.map(|g| g.as_str()))
        .bind(user.birth_day)
        .bind(&user.phone_number)
        .bind(&user.zip_code)
        .bind(&user.address)
        .bind(user.updated_at)
        .bind(&user.updated_by)
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("user {} not found", user.id));
        }
        Ok(user)
    }

    async fn remove(&self, id: UserId, updated_by: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET delete_flag = 1, updated_at = ?, updated_by = ? \
             WHERE id = ? AND delete_flag = 0",
        )
        .bind(Utc::now())
        .bind(updated_by)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_usernames(&self) -> anyhow::Result<Vec<String>> {
        let mut stream =
            sqlx::query_as::<_, (String,)>("SELECT username FROM users").fetch(&self.pool);

        let mut names = Vec::new();
        while let Some(row) = stream.next().await {
            let (username,) = row.map_err(|e| anyhow!("DB row fetch failed: {e}"))?;
            names.push(username);
        }
        Ok(names)
    }
}
