use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::model::error::DomainError;
use crate::model::ids::{AttendanceId, UserId};

/// Which adjacent pair of `clock_in < rest_in < rest_out < clock_out` failed.
#[derive(Debug, Display, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBoundary {
    #[display(fmt = "Clock-in time must be before rest-in time")]
    ClockInRestIn,
    #[display(fmt = "Rest-in time must be before rest-out time")]
    RestInRestOut,
    #[display(fmt = "Rest-out time must be before clock-out time")]
    RestOutClockOut,
}

/// Checks the strict ordering of one day's punches.
///
/// The three comparisons run in a fixed order and the first failure wins, so
/// the reported boundary is stable when several orderings are broken at once.
pub fn validate_time_order(
    clock_in: NaiveTime,
    rest_in: NaiveTime,
    rest_out: NaiveTime,
    clock_out: NaiveTime,
) -> Result<(), DomainError> {
    if clock_in >= rest_in {
        return Err(DomainError::InvalidTimeOrder(TimeBoundary::ClockInRestIn));
    }
    if rest_in >= rest_out {
        return Err(DomainError::InvalidTimeOrder(TimeBoundary::RestInRestOut));
    }
    if rest_out >= clock_out {
        return Err(DomainError::InvalidTimeOrder(TimeBoundary::RestOutClockOut));
    }
    Ok(())
}

fn validate_amount(amount: Option<i64>) -> Result<(), DomainError> {
    match amount {
        Some(amount) if amount < 0 => Err(DomainError::InvalidAmount { amount }),
        _ => Ok(()),
    }
}

/// Seconds since midnight, ignoring sub-second precision.
pub fn seconds_of(t: NaiveTime) -> i64 {
    i64::from(t.hour()) * 3600 + i64::from(t.minute()) * 60 + i64::from(t.second())
}

/// Converts seconds to hours rounded to two decimals, half away from zero.
///
/// Works on integer hundredths so that exact halves (e.g. 18 s = 0.005 h)
/// are not at the mercy of binary floating point.
pub fn seconds_to_hours(seconds: i64) -> f64 {
    let scaled = seconds.abs() * 100;
    let mut hundredths = scaled / 3600;
    if (scaled % 3600) * 2 >= 3600 {
        hundredths += 1;
    }
    let hundredths = if seconds < 0 { -hundredths } else { hundredths };
    hundredths as f64 / 100.0
}

/// Input for [`AttendanceRecord::create`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAttendance {
    pub user_id: UserId,
    pub work_date: NaiveDate,
    pub clock_in: NaiveTime,
    pub clock_out: NaiveTime,
    pub rest_in: NaiveTime,
    pub rest_out: NaiveTime,
    pub work_place: Option<String>,
    pub transportation_expenses: Option<i64>,
    pub remarks: Option<String>,
    pub created_by: String,
    pub updated_by: String,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AttendancePatch {
    pub work_date: Option<NaiveDate>,
    pub clock_in: Option<NaiveTime>,
    pub clock_out: Option<NaiveTime>,
    pub rest_in: Option<NaiveTime>,
    pub rest_out: Option<NaiveTime>,
    pub work_place: Option<String>,
    pub transportation_expenses: Option<i64>,
    pub remarks: Option<String>,
    pub updated_by: Option<String>,
}

impl AttendancePatch {
    pub fn touches_times(&self) -> bool {
        self.clock_in.is_some()
            || self.clock_out.is_some()
            || self.rest_in.is_some()
            || self.rest_out.is_some()
    }
}

/// One user's punches for one work date.
///
/// Values are never mutated in place: every transition returns a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub user_id: UserId,
    pub work_date: NaiveDate,
    pub clock_in: NaiveTime,
    pub clock_out: NaiveTime,
    pub rest_in: NaiveTime,
    pub rest_out: NaiveTime,
    pub work_place: Option<String>,
    pub transportation_expenses: Option<i64>,
    pub remarks: Option<String>,
    pub delete_flag: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl AttendanceRecord {
    /// Builds a fresh, active record with a new id.
    ///
    /// Uniqueness per (user, date) is not checked here; the caller owns that.
    pub fn create(new: NewAttendance) -> Result<Self, DomainError> {
        validate_amount(new.transportation_expenses)?;
        validate_time_order(new.clock_in, new.rest_in, new.rest_out, new.clock_out)?;

        let now = Utc::now();
        Ok(Self {
            id: AttendanceId::generate(),
            user_id: new.user_id,
            work_date: new.work_date,
            clock_in: new.clock_in,
            clock_out: new.clock_out,
            rest_in: new.rest_in,
            rest_out: new.rest_out,
            work_place: new.work_place,
            transportation_expenses: new.transportation_expenses,
            remarks: new.remarks,
            delete_flag: false,
            created_at: now,
            created_by: new.created_by,
            updated_at: now,
            updated_by: new.updated_by,
        })
    }

    pub fn calculate_working_hours(&self) -> f64 {
        let work = seconds_of(self.clock_out) - seconds_of(self.clock_in);
        let rest = seconds_of(self.rest_out) - seconds_of(self.rest_in);
        seconds_to_hours(work - rest)
    }

    pub fn calculate_rest_hours(&self) -> f64 {
        seconds_to_hours(seconds_of(self.rest_out) - seconds_of(self.rest_in))
    }

    /// Applies `patch` and returns the new value. `self` is left untouched on error.
    pub fn update(&self, patch: AttendancePatch) -> Result<Self, DomainError> {
        validate_amount(patch.transportation_expenses)?;

        let clock_in = patch.clock_in.unwrap_or(self.clock_in);
        let clock_out = patch.clock_out.unwrap_or(self.clock_out);
        let rest_in = patch.rest_in.unwrap_or(self.rest_in);
        let rest_out = patch.rest_out.unwrap_or(self.rest_out);

        if patch.touches_times() {
            validate_time_order(clock_in, rest_in, rest_out, clock_out)?;
        }

        Ok(Self {
            work_date: patch.work_date.unwrap_or(self.work_date),
            clock_in,
            clock_out,
            rest_in,
            rest_out,
            work_place: patch.work_place.or_else(|| self.work_place.clone()),
            transportation_expenses: patch
                .transportation_expenses
                .or(self.transportation_expenses),
            remarks: patch.remarks.or_else(|| self.remarks.clone()),
            updated_at: Utc::now(),
            updated_by: patch
                .updated_by
                .filter(|who| !who.is_empty())
                .unwrap_or_else(|| self.updated_by.clone()),
            ..self.clone()
        })
    }

    /// Logical delete. Already-deleted records come back unchanged.
    pub fn deactivate(&self) -> Self {
        if self.delete_flag {
            return self.clone();
        }
        Self {
            delete_flag: true,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Reverses [`deactivate`](Self::deactivate). Active records come back unchanged.
    pub fn activate(&self) -> Self {
        if !self.delete_flag {
            return self.clone();
        }
        Self {
            delete_flag: false,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn is_active(&self) -> bool {
        !self.delete_flag
    }
}
