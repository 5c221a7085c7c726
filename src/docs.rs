use crate::api::attendance::{AttendanceResponse, CreateAttendance, UpdateAttendance};
use crate::api::user::{ManagerCheckResponse, RoleChangeResponse, UserResponse};
use crate::auth::handlers::{LoginRequest, MeResponse, TokenResponse};
use crate::model::role::Role;
use crate::model::user::{Gender, NewUser, UserPatch};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

/// Registers the `bearer_auth` scheme referenced by protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timecard API",
        version = "1.0.0",
        description = r#"
## Users & Attendance

Backend for registering users, managing their role on the
`user → manager → admin` ladder, and recording daily attendance.

### Key Features
- **Users**
  - Self-registration, profile updates, logical deletion
  - Single-step promotion and demotion (admin only)
- **Attendance**
  - One record per user per work date
  - Clock-in, rest-in, rest-out and clock-out must be strictly ordered
  - Working and rest hours derived on every response

### Security
Everything under the API prefix requires a **JWT Bearer** token from `POST /auth/token`.

### Response Format
- JSON bodies; errors are `{"message": "..."}`
"#,
    ),
    paths(
        crate::api::health::health,
        crate::auth::handlers::login,
        crate::auth::handlers::me,

        crate::api::user::register_user,
        crate::api::user::list_users,
        crate::api::user::get_user,
        crate::api::user::update_user,
        crate::api::user::delete_user,
        crate::api::user::promote_to_manager,
        crate::api::user::promote_to_admin,
        crate::api::user::demote_to_manager,
        crate::api::user::demote_to_user,
        crate::api::user::has_manager_role,

        crate::api::attendance::list_attendances,
        crate::api::attendance::get_attendance,
        crate::api::attendance::create_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance
    ),
    components(
        schemas(
            LoginRequest,
            TokenResponse,
            MeResponse,
            NewUser,
            UserPatch,
            Gender,
            Role,
            UserResponse,
            RoleChangeResponse,
            ManagerCheckResponse,
            CreateAttendance,
            UpdateAttendance,
            AttendanceResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Auth", description = "Token issuance"),
        (name = "Users", description = "User and role management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/token",
            "/api/v1/users",
            "/api/v1/users/{id}/promote/manager",
            "/api/v1/users/{id}/manager",
            "/api/v1/attendances/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
