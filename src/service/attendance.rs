use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use super::storage_error;
use crate::model::attendance::{AttendancePatch, AttendanceRecord, NewAttendance};
use crate::model::error::DomainError;
use crate::model::ids::{AttendanceId, UserId};
use crate::repository::{AttendanceRepository, Ordering, Pagination, UniqueViolation};

/// Filters for listing attendance records.
///
/// A date range only applies when both ends are given.
#[derive(Debug, Clone, Default)]
pub struct AttendanceQuery {
    pub user_id: Option<UserId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Pagination,
    pub ordering: Ordering,
}

#[derive(Clone)]
pub struct AttendanceService {
    repo: Arc<dyn AttendanceRepository>,
}

impl AttendanceService {
    pub fn new(repo: Arc<dyn AttendanceRepository>) -> Self {
        Self { repo }
    }

    #[instrument(name = "attendance.get", skip(self), fields(attendance_id = %id))]
    pub async fn get_attendance(&self, id: AttendanceId) -> Result<AttendanceRecord, DomainError> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| DomainError::attendance_not_found(id))
    }

    #[instrument(name = "attendance.list", skip(self))]
    pub async fn list_attendances(
        &self,
        query: AttendanceQuery,
    ) -> Result<Vec<AttendanceRecord>, DomainError> {
        let range = match (query.start_date, query.end_date) {
            (Some(start), Some(end)) if start > end => {
                return Err(DomainError::validation(
                    "start_date",
                    "start_date must not be after end_date",
                ));
            }
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        };

        let records = match (query.user_id, range) {
            (Some(user_id), Some((start, end))) => {
                self.repo
                    .find_by_user_and_date_range(user_id, start, end, query.page)
                    .await
            }
            (Some(user_id), None) => self.repo.find_by_user(user_id, query.page).await,
            (None, Some((start, end))) => {
                self.repo.find_by_date_range(start, end, query.page).await
            }
            (None, None) => self.repo.find_all(query.page, query.ordering).await,
        }
        .map_err(storage_error)?;

        debug!(count = records.len(), "Listed attendance records");
        Ok(records)
    }

    #[instrument(
        name = "attendance.create",
        skip(self, new),
        fields(user_id = %new.user_id, work_date = %new.work_date)
    )]
    pub async fn create_attendance(
        &self,
        new: NewAttendance,
    ) -> Result<AttendanceRecord, DomainError> {
        let (user_id, work_date) = (new.user_id, new.work_date);
        self.ensure_free_day(user_id, work_date, None).await?;

        let record = AttendanceRecord::create(new)?;
        let saved = self.save(record).await?;
        info!(attendance_id = %saved.id, "Attendance record created");
        Ok(saved)
    }

    #[instrument(name = "attendance.update", skip(self, patch), fields(attendance_id = %id))]
    pub async fn update_attendance(
        &self,
        id: AttendanceId,
        patch: AttendancePatch,
    ) -> Result<AttendanceRecord, DomainError> {
        let current = self.get_attendance(id).await?;
        let updated = current.update(patch)?;

        if updated.work_date != current.work_date {
            self.ensure_free_day(updated.user_id, updated.work_date, Some(id))
                .await?;
        }

        let saved = self.save(updated).await?;
        info!("Attendance record updated");
        Ok(saved)
    }

    /// Logical delete attributed to `updated_by`.
    #[instrument(name = "attendance.delete", skip(self), fields(attendance_id = %id))]
    pub async fn delete_attendance(
        &self,
        id: AttendanceId,
        updated_by: &str,
    ) -> Result<(), DomainError> {
        let current = self.get_attendance(id).await?;
        let mut deleted = current.deactivate();
        deleted.updated_by = updated_by.to_string();
        self.save(deleted).await?;
        info!("Attendance record deleted");
        Ok(())
    }

    async fn ensure_free_day(
        &self,
        user_id: UserId,
        work_date: NaiveDate,
        except: Option<AttendanceId>,
    ) -> Result<(), DomainError> {
        let existing = self
            .repo
            .find_by_user_and_date(user_id, work_date)
            .await
            .map_err(storage_error)?;
        match existing {
            Some(other) if Some(other.id) != except => {
                warn!(existing_id = %other.id, "Attendance already recorded for this day");
                Err(DomainError::DuplicateAttendance { user_id, work_date })
            }
            _ => Ok(()),
        }
    }

    /// Saves, translating a lost uniqueness race into `DuplicateAttendance`.
    async fn save(&self, record: AttendanceRecord) -> Result<AttendanceRecord, DomainError> {
        let (user_id, work_date) = (record.user_id, record.work_date);
        self.repo.save(record).await.map_err(|e| {
            if UniqueViolation::find(&e).is_some() {
                DomainError::DuplicateAttendance { user_id, work_date }
            } else {
                storage_error(e)
            }
        })
    }
}
