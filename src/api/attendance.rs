use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::api::error::ApiError;
use crate::api::parse_id;
use crate::auth::auth::AuthUser;
use crate::model::attendance::{AttendancePatch, AttendanceRecord, NewAttendance};
use crate::model::ids::{AttendanceId, UserId};
use crate::model::role::has_manager_rank;
use crate::repository::{AttendanceOrderField, Ordering, Pagination};
use crate::service::{AttendanceQuery, AttendanceService};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAttendance {
    /// Defaults to the caller. Only managers may record for someone else.
    #[schema(example = "6f1c2c1e-5d6a-4b0e-9d44-0d7c3c1b2a10", value_type = Option<String>)]
    pub user_id: Option<String>,
    #[schema(example = "2025-04-01", format = "date", value_type = String)]
    pub work_date: NaiveDate,
    #[schema(example = "09:00:00", value_type = String)]
    pub clock_in: NaiveTime,
    #[schema(example = "18:00:00", value_type = String)]
    pub clock_out: NaiveTime,
    #[schema(example = "12:00:00", value_type = String)]
    pub rest_in: NaiveTime,
    #[schema(example = "13:00:00", value_type = String)]
    pub rest_out: NaiveTime,
    #[schema(example = "Head office")]
    pub work_place: Option<String>,
    #[schema(example = 480)]
    pub transportation_expenses: Option<i64>,
    pub remarks: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAttendance {
    #[schema(example = "2025-04-01", format = "date", value_type = Option<String>)]
    pub work_date: Option<NaiveDate>,
    #[schema(example = "09:00:00", value_type = Option<String>)]
    pub clock_in: Option<NaiveTime>,
    #[schema(example = "18:00:00", value_type = Option<String>)]
    pub clock_out: Option<NaiveTime>,
    #[schema(example = "12:00:00", value_type = Option<String>)]
    pub rest_in: Option<NaiveTime>,
    #[schema(example = "13:00:00", value_type = Option<String>)]
    pub rest_out: Option<NaiveTime>,
    pub work_place: Option<String>,
    pub transportation_expenses: Option<i64>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceListParams {
    #[param(value_type = Option<String>)]
    pub user_id: Option<String>,
    #[param(value_type = Option<String>, format = Date)]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = Date)]
    pub end_date: Option<NaiveDate>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// One of `work_date`, `clock_in`, `clock_out`, `created_at`, `updated_at`.
    #[param(value_type = Option<String>)]
    pub order_by: Option<AttendanceOrderField>,
    pub ascending: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub id: String,
    pub user_id: String,
    #[schema(example = "2025-04-01", format = "date", value_type = String)]
    pub work_date: NaiveDate,
    #[schema(example = "09:00:00", value_type = String)]
    pub clock_in: NaiveTime,
    #[schema(example = "18:00:00", value_type = String)]
    pub clock_out: NaiveTime,
    #[schema(example = "12:00:00", value_type = String)]
    pub rest_in: NaiveTime,
    #[schema(example = "13:00:00", value_type = String)]
    pub rest_out: NaiveTime,
    pub work_place: Option<String>,
    pub transportation_expenses: Option<i64>,
    pub remarks: Option<String>,
    #[schema(example = 8.0)]
    pub working_hours: f64,
    #[schema(example = 1.0)]
    pub rest_hours: f64,
    pub delete_flag: bool,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl From<AttendanceRecord> for AttendanceResponse {
    fn from(r: AttendanceRecord) -> Self {
        let working_hours = r.calculate_working_hours();
        let rest_hours = r.calculate_rest_hours();
        Self {
            id: r.id.to_string(),
            user_id: r.user_id.to_string(),
            work_date: r.work_date,
            clock_in: r.clock_in,
            clock_out: r.clock_out,
            rest_in: r.rest_in,
            rest_out: r.rest_out,
            work_place: r.work_place,
            transportation_expenses: r.transportation_expenses,
            remarks: r.remarks,
            working_hours,
            rest_hours,
            delete_flag: r.delete_flag,
            created_at: r.created_at,
            created_by: r.created_by,
            updated_at: r.updated_at,
            updated_by: r.updated_by,
        }
    }
}

/// List attendance records
#[utoipa::path(
    get,
    path = "/api/v1/attendances",
    params(AttendanceListParams),
    responses(
        (status = 200, description = "Attendance records", body = [AttendanceResponse]),
        (status = 400, description = "Invalid filter", body = Object, example = json!({
            "message": "Validation error on field 'start_date': start_date must not be after end_date"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendances(
    auth: AuthUser,
    svc: web::Data<AttendanceService>,
    params: web::Query<AttendanceListParams>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();
    let requested = params
        .user_id
        .as_deref()
        .map(|raw| parse_id::<UserId>("user_id", raw))
        .transpose()?;

    // plain users only ever see their own records
    let user_id = if has_manager_rank(auth.role) {
        requested
    } else {
        if let Some(other) = requested {
            auth.require_self_or_manager(other)?;
        }
        Some(auth.user_id)
    };

    let query = AttendanceQuery {
        user_id,
        start_date: params.start_date,
        end_date: params.end_date,
        page: Pagination::new(params.limit, params.offset),
        ordering: Ordering {
            field: params.order_by.unwrap_or_default(),
            ascending: params.ascending.unwrap_or(false),
        },
    };

    let records = svc.list_attendances(query).await?;
    let body: Vec<AttendanceResponse> = records.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// Get one attendance record
#[utoipa::path(
    get,
    path = "/api/v1/attendances/{id}",
    params(("id" = String, Path, description = "Attendance id")),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found", body = Object, example = json!({
            "message": "Attendance with ID 6f1c2c1e-5d6a-4b0e-9d44-0d7c3c1b2a10 not found"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    svc: web::Data<AttendanceService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id::<AttendanceId>("id", &path.into_inner())?;
    let record = svc.get_attendance(id).await?;
    auth.require_self_or_manager(record.user_id)?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(record)))
}

/// Record a working day
#[utoipa::path(
    post,
    path = "/api/v1/attendances",
    request_body = CreateAttendance,
    responses(
        (status = 201, description = "Created", body = AttendanceResponse),
        (status = 400, description = "Invalid times, negative expenses or duplicate day", body = Object, example = json!({
            "message": "Clock-in time must be before rest-in time"
        })),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn create_attendance(
    auth: AuthUser,
    svc: web::Data<AttendanceService>,
    payload: web::Json<CreateAttendance>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let user_id = match payload.user_id.as_deref() {
        Some(raw) => parse_id::<UserId>("user_id", raw)?,
        None => auth.user_id,
    };
    auth.require_self_or_manager(user_id)?;

    let record = svc
        .create_attendance(NewAttendance {
            user_id,
            work_date: payload.work_date,
            clock_in: payload.clock_in,
            clock_out: payload.clock_out,
            rest_in: payload.rest_in,
            rest_out: payload.rest_out,
            work_place: payload.work_place,
            transportation_expenses: payload.transportation_expenses,
            remarks: payload.remarks,
            created_by: auth.username.clone(),
            updated_by: auth.username.clone(),
        })
        .await?;

    Ok(HttpResponse::Created().json(AttendanceResponse::from(record)))
}

/// Change an attendance record
#[utoipa::path(
    put,
    path = "/api/v1/attendances/{id}",
    params(("id" = String, Path, description = "Attendance id")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Updated", body = AttendanceResponse),
        (status = 400, description = "Invalid times or negative expenses"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    svc: web::Data<AttendanceService>,
    path: web::Path<String>,
    payload: web::Json<UpdateAttendance>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id::<AttendanceId>("id", &path.into_inner())?;
    let current = svc.get_attendance(id).await?;
    auth.require_self_or_manager(current.user_id)?;

    let p = payload.into_inner();
    debug!(attendance_id = %id, "Applying attendance patch");
    let record = svc
        .update_attendance(
            id,
            AttendancePatch {
                work_date: p.work_date,
                clock_in: p.clock_in,
                clock_out: p.clock_out,
                rest_in: p.rest_in,
                rest_out: p.rest_out,
                work_place: p.work_place,
                transportation_expenses: p.transportation_expenses,
                remarks: p.remarks,
                updated_by: Some(auth.username.clone()),
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(AttendanceResponse::from(record)))
}

/// Delete an attendance record (logical)
#[utoipa::path(
    delete,
    path = "/api/v1/attendances/{id}",
    params(("id" = String, Path, description = "Attendance id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    svc: web::Data<AttendanceService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id::<AttendanceId>("id", &path.into_inner())?;
    let current = svc.get_attendance(id).await?;
    auth.require_self_or_manager(current.user_id)?;

    svc.delete_attendance(id, &auth.username).await?;
    Ok(HttpResponse::NoContent().finish())
}
