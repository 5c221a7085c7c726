use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, MySqlPool};
use tracing::debug;

use super::{classify, parse_id};
use crate::model::attendance::AttendanceRecord;
use crate::model::ids::{AttendanceId, UserId};
use crate::repository::{AttendanceRepository, Ordering, Pagination};

const COLUMNS: &str = "id, user_id, work_date, clock_in, clock_out, rest_in, rest_out, \
     work_place, transportation_expenses, remarks, delete_flag, \
     created_at, created_by, updated_at, updated_by";

// MySQL needs a LIMIT before OFFSET; this is its documented "no limit" value.
const NO_LIMIT: u64 = u64::MAX;

#[derive(Debug, FromRow)]
struct AttendanceRow {
    id: String,
    user_id: String,
    work_date: NaiveDate,
    clock_in: NaiveTime,
    clock_out: NaiveTime,
    rest_in: NaiveTime,
    rest_out: NaiveTime,
    work_place: Option<String>,
    transportation_expenses: Option<i64>,
    remarks: Option<String>,
    delete_flag: bool,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = anyhow::Error;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(AttendanceRecord {
            id: parse_id("attendances.id", &row.id)?,
            user_id: parse_id("attendances.user_id", &row.user_id)?,
            work_date: row.work_date,
            clock_in: row.clock_in,
            clock_out: row.clock_out,
            rest_in: row.rest_in,
            rest_out: row.rest_out,
            work_place: row.work_place,
            transportation_expenses: row.transportation_expenses,
            remarks: row.remarks,
            delete_flag: row.delete_flag,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        })
    }
}

fn into_records(rows: Vec<AttendanceRow>) -> anyhow::Result<Vec<AttendanceRecord>> {
    rows.into_iter().map(AttendanceRecord::try_from).collect()
}

fn window(page: Pagination) -> (u64, u64) {
    (page.limit.unwrap_or(NO_LIMIT), page.offset.unwrap_or(0))
}

#[derive(Clone)]
pub struct MySqlAttendanceRepository {
    pool: MySqlPool,
}

impl MySqlAttendanceRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceRepository for MySqlAttendanceRepository {
    async fn find_by_id(&self, id: AttendanceId) -> anyhow::Result<Option<AttendanceRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM attendances WHERE id = ? AND delete_flag = 0");
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn find_by_user_and_date(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
    ) -> anyhow::Result<Option<AttendanceRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM attendances \
             WHERE user_id = ? AND work_date = ? AND delete_flag = 0"
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id.to_string())
            .bind(work_date)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn find_by_user(
        &self,
        user_id: UserId,
        page: Pagination,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let (limit, offset) = window(page);
        let sql = format!(
            "SELECT {COLUMNS} FROM attendances \
             WHERE user_id = ? AND delete_flag = 0 \
             ORDER BY work_date DESC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        page: Pagination,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let (limit, offset) = window(page);
        let sql = format!(
            "SELECT {COLUMNS} FROM attendances \
             WHERE work_date BETWEEN ? AND ? AND delete_flag = 0 \
             ORDER BY work_date ASC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(start)
            .bind(end)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn find_by_user_and_date_range(
        &self,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
        page: Pagination,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let (limit, offset) = window(page);
        let sql = format!(
            "SELECT {COLUMNS} FROM attendances \
             WHERE user_id = ? AND work_date BETWEEN ? AND ? AND delete_flag = 0 \
             ORDER BY work_date ASC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id.to_string())
            .bind(start)
            .bind(end)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn find_all(
        &self,
        page: Pagination,
        ordering: Ordering,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let (limit, offset) = window(page);
        // column names come from a closed enum, never from input
        let direction = if ordering.ascending { "ASC" } else { "DESC" };
        let sql = format!(
            "SELECT {COLUMNS} FROM attendances WHERE delete_flag = 0 \
             ORDER BY {} {direction} LIMIT ? OFFSET ?",
            ordering.field.column()
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn save(&self, record: AttendanceRecord) -> anyhow::Result<AttendanceRecord> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM attendances WHERE id = ? LIMIT 1)",
        )
        .bind(record.id.to_string())
        .fetch_one(&self.pool)
        .await?;

        if exists {
            debug!(attendance_id = %record.id, "Updating attendance row");
            sqlx::query(
                r#"
                UPDATE attendances
                SET work_date = ?, clock_in = ?, clock_out = ?, rest_in = ?, rest_out = ?,
                    work_place = ?, transportation_expenses = ?, remarks = ?,
                    delete_flag = ?, updated_at = ?, updated_by = ?
                WHERE id = ?
                "#,
            )
            .bind(record.work_date)
            .bind(record.clock_in)
            .bind(record.clock_out)
            .bind(record.rest_in)
            .bind(record.rest_out)
            .bind(&record.work_place)
            .bind(record.transportation_expenses)
            .bind(&record.remarks)
            .bind(record.delete_flag)
            .bind(record.updated_at)
            .bind(&record.updated_by)
            .bind(record.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        } else {
            debug!(attendance_id = %record.id, "Inserting attendance row");
            sqlx::query(
                r#"
                INSERT INTO attendances
                (id, user_id, work_date, clock_in, clock_out, rest_in, rest_out,
                 work_place, transportation_expenses, remarks, delete_flag,
                 created_at, created_by, updated_at, updated_by)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.id.to_string())
            .bind(record.user_id.to_string())
            .bind(record.work_date)
            .bind(record.clock_in)
            .bind(record.clock_out)
            .bind(record.rest_in)
            .bind(record.rest_out)
            .bind(&record.work_place)
            .bind(record.transportation_expenses)
            .bind(&record.remarks)
            .bind(record.delete_flag)
            .bind(record.created_at)
            .bind(&record.created_by)
            .bind(record.updated_at)
            .bind(&record.updated_by)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        }

        Ok(record)
    }

    async fn delete(&self, id: AttendanceId) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE attendances SET delete_flag = 1, updated_at = ? WHERE id = ? AND delete_flag = 0",
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
