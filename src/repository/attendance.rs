use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use strum_macros::{AsRefStr, EnumString};

use crate::model::attendance::AttendanceRecord;
use crate::model::ids::{AttendanceId, UserId};
use crate::repository::Pagination;

/// Columns a listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceOrderField {
    WorkDate,
    ClockIn,
    ClockOut,
    CreatedAt,
    UpdatedAt,
}

impl Default for AttendanceOrderField {
    fn default() -> Self {
        AttendanceOrderField::WorkDate
    }
}

impl AttendanceOrderField {
    pub fn column(&self) -> &'static str {
        match self {
            AttendanceOrderField::WorkDate => "work_date",
            AttendanceOrderField::ClockIn => "clock_in",
            AttendanceOrderField::ClockOut => "clock_out",
            AttendanceOrderField::CreatedAt => "created_at",
            AttendanceOrderField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub field: AttendanceOrderField,
    pub ascending: bool,
}

impl Default for Ordering {
    /// Newest work date first.
    fn default() -> Self {
        Self {
            field: AttendanceOrderField::WorkDate,
            ascending: false,
        }
    }
}

/// Storage for attendance records. Lookups only return active records.
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    async fn find_by_id(&self, id: AttendanceId) -> anyhow::Result<Option<AttendanceRecord>>;

    async fn find_by_user_and_date(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
    ) -> anyhow::Result<Option<AttendanceRecord>>;

    /// Newest work date first.
    async fn find_by_user(
        &self,
        user_id: UserId,
        page: Pagination,
    ) -> anyhow::Result<Vec<AttendanceRecord>>;

    /// Inclusive range, oldest first.
    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        page: Pagination,
    ) -> anyhow::Result<Vec<AttendanceRecord>>;

    /// Inclusive range for one user, oldest first.
    async fn find_by_user_and_date_range(
        &self,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
        page: Pagination,
    ) -> anyhow::Result<Vec<AttendanceRecord>>;

    async fn find_all(
        &self,
        page: Pagination,
        ordering: Ordering,
    ) -> anyhow::Result<Vec<AttendanceRecord>>;

    /// Inserts or replaces by id and returns the stored value.
    async fn save(&self, record: AttendanceRecord) -> anyhow::Result<AttendanceRecord>;

    /// Sets the delete flag; the row is kept.
    async fn delete(&self, id: AttendanceId) -> anyhow::Result<()>;
}
