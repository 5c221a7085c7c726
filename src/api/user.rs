use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::ApiError;
use crate::api::parse_id;
use crate::auth::auth::AuthUser;
use crate::model::ids::UserId;
use crate::model::role::{Role, RoleTransition};
use crate::model::user::{Gender, NewUser, User, UserPatch};
use crate::service::{RoleService, UserListQuery, UserService};

/// Actor recorded for self-service registrations.
const REGISTRATION_ACTOR: &str = "system";

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    #[schema(example = "taro")]
    pub username: String,
    #[schema(example = "taro@example.com")]
    pub email: String,
    pub first_name: Option<String>,
    pub first_name_ruby: Option<String>,
    pub last_name: Option<String>,
    pub last_name_ruby: Option<String>,
    pub gender: Option<Gender>,
    #[schema(example = "1990-04-01", format = "date", value_type = Option<String>)]
    pub birth_day: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub zip_code: Option<String>,
    pub address: Option<String>,
    pub roles: Vec<Role>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id.to_string(),
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            first_name_ruby: u.first_name_ruby,
            last_name: u.last_name,
            last_name_ruby: u.last_name_ruby,
            gender: u.gender,
            birth_day: u.birth_day,
            phone_number: u.phone_number,
            zip_code: u.zip_code,
            address: u.address,
            roles: u.roles,
            created_at: u.created_at,
            created_by: u.created_by,
            updated_at: u.updated_at,
            updated_by: u.updated_by,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleChangeResponse {
    pub user_id: String,
    #[schema(example = "manager")]
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ManagerCheckResponse {
    pub has_manager_role: bool,
}

/// Register a user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = NewUser,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid field", body = Object, example = json!({
            "message": "Validation error on field 'email': Invalid email format: taro"
        })),
        (status = 409, description = "Username or email taken", body = Object, example = json!({
            "message": "Username taro already exists"
        }))
    ),
    tag = "Users"
)]
pub async fn register_user(
    svc: web::Data<UserService>,
    payload: web::Json<NewUser>,
) -> Result<HttpResponse, ApiError> {
    let user = svc
        .create_user(payload.into_inner(), REGISTRATION_ACTOR)
        .await?;
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// List users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users", body = [UserResponse]),
        (status = 403, description = "Manager or admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    svc: web::Data<UserService>,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_manager()?;
    let users = svc.list_users(query.into_inner()).await?;
    let body: Vec<UserResponse> = users.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// Get a user
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    svc: web::Data<UserService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id::<UserId>("id", &path.into_inner())?;
    auth.require_self_or_manager(id)?;
    let user = svc.get_user(id).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Update profile and contact fields
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "Updated", body = UserResponse),
        (status = 400, description = "Invalid field"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    svc: web::Data<UserService>,
    path: web::Path<String>,
    payload: web::Json<UserPatch>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id::<UserId>("id", &path.into_inner())?;
    auth.require_self_or_manager(id)?;
    let user = svc
        .update_user(id, payload.into_inner(), &auth.username)
        .await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Delete a user (logical)
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    auth: AuthUser,
    svc: web::Data<UserService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = parse_id::<UserId>("id", &path.into_inner())?;
    svc.remove_user(id, &auth.username).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn change_role(
    auth: AuthUser,
    users: web::Data<UserService>,
    roles: web::Data<RoleService>,
    raw_id: String,
    transition: RoleTransition,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let id = parse_id::<UserId>("id", &raw_id)?;
    // 404 for unknown users before any eligibility check
    users.get_user(id).await?;

    let assignment = roles.transition(id, transition, &auth.username).await?;
    info!(user_id = %id, %transition, actor = %auth.username, "Role transition applied");
    Ok(HttpResponse::Ok().json(RoleChangeResponse {
        user_id: id.to_string(),
        role: assignment.role,
    }))
}

/// Promote a user to manager
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/promote/manager",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Promoted", body = RoleChangeResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User is not currently a plain user", body = Object, example = json!({
            "message": "User 6f1c2c1e-5d6a-4b0e-9d44-0d7c3c1b2a10 is not eligible: requires role 'user', has 'manager'"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn promote_to_manager(
    auth: AuthUser,
    users: web::Data<UserService>,
    roles: web::Data<RoleService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    change_role(auth, users, roles, path.into_inner(), RoleTransition::PromoteToManager).await
}

/// Promote a manager to admin
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/promote/admin",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Promoted", body = RoleChangeResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User is not currently a manager")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn promote_to_admin(
    auth: AuthUser,
    users: web::Data<UserService>,
    roles: web::Data<RoleService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    change_role(auth, users, roles, path.into_inner(), RoleTransition::PromoteToAdmin).await
}

/// Demote an admin to manager
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/demote/manager",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Demoted", body = RoleChangeResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User is not currently an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn demote_to_manager(
    auth: AuthUser,
    users: web::Data<UserService>,
    roles: web::Data<RoleService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    change_role(
        auth,
        users,
        roles,
        path.into_inner(),
        RoleTransition::DemoteFromAdminToManager,
    )
    .await
}

/// Demote a manager to user
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/demote/user",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Demoted", body = RoleChangeResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User is not currently a manager")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn demote_to_user(
    auth: AuthUser,
    users: web::Data<UserService>,
    roles: web::Data<RoleService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    change_role(
        auth,
        users,
        roles,
        path.into_inner(),
        RoleTransition::DemoteFromManagerToUser,
    )
    .await
}

/// Whether the user currently ranks as manager or above
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/manager",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Check result", body = ManagerCheckResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn has_manager_role(
    _auth: AuthUser,
    users: web::Data<UserService>,
    roles: web::Data<RoleService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id::<UserId>("id", &path.into_inner())?;
    users.get_user(id).await?;
    let has_manager_role = roles.has_manager_role(id).await?;
    Ok(HttpResponse::Ok().json(ManagerCheckResponse { has_manager_role }))
}
