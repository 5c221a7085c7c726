use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::middleware::NormalizePath;
use actix_web::{App, test};
use serde_json::{Value, json};

use timecard::app::AppState;
use timecard::config::Config;
use timecard::model::ids::UserId;
use timecard::routes;
use timecard::store::memory::{
    MemoryAttendanceRepository, MemoryRoleRepository, MemoryUserRepository,
};

const SECRET: &str = "integration-secret";

fn memory_state() -> (AppState, Config) {
    let config = Config::for_tests(SECRET);
    let roles = Arc::new(MemoryRoleRepository::seeded());
    let users = Arc::new(MemoryUserRepository::new(roles.clone()));
    let attendances = Arc::new(MemoryAttendanceRepository::new());
    (AppState::new(users, roles, attendances, &config), config)
}

macro_rules! app {
    ($state:expr, $config:expr) => {{
        let state = $state.clone();
        let config = $config.clone();
        test::init_service(
            App::new()
                .wrap(NormalizePath::trim())
                .configure(|cfg| state.register(cfg, &config))
                .configure(|cfg| routes::configure(cfg, config.clone())),
        )
        .await
    }};
}

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

fn post(uri: &str) -> test::TestRequest {
    test::TestRequest::post().uri(uri).peer_addr(peer())
}

fn get(uri: &str) -> test::TestRequest {
    test::TestRequest::get().uri(uri).peer_addr(peer())
}

fn put(uri: &str) -> test::TestRequest {
    test::TestRequest::put().uri(uri).peer_addr(peer())
}

fn delete(uri: &str) -> test::TestRequest {
    test::TestRequest::delete().uri(uri).peer_addr(peer())
}

fn registration(username: &str) -> Value {
    json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "correct-horse",
        "first_name": "Taro",
        "last_name": "Yamada",
        "gender": "male",
        "birth_day": "1990-04-01",
        "phone_number": "090-1234-5678",
        "zip_code": "100-0001"
    })
}

async fn body(resp: ServiceResponse) -> Value {
    test::read_body_json(resp).await
}

macro_rules! register {
    ($app:expr, $username:expr) => {{
        let resp = test::call_service(
            &$app,
            post("/api/v1/users").set_json(registration($username)).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        body(resp).await["id"].as_str().unwrap().to_string()
    }};
}

macro_rules! login {
    ($app:expr, $username:expr) => {{
        let resp = test::call_service(
            &$app,
            post("/auth/token")
                .set_json(json!({ "username": $username, "password": "correct-horse" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let token = body(resp).await["access_token"].as_str().unwrap().to_string();
        format!("Bearer {token}")
    }};
}

async fn make_admin(state: &AppState, id: &str) {
    let id: UserId = id.parse().unwrap();
    state.roles.promote_to_manager(id, "seed").await.unwrap();
    state.roles.promote_to_admin(id, "seed").await.unwrap();
}

#[actix_web::test]
async fn health_is_public() {
    let (state, config) = memory_state();
    let app = app!(state, config);
    let resp = test::call_service(&app, get("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn protected_routes_need_a_token() {
    let (state, config) = memory_state();
    let app = app!(state, config);

    let resp = test::call_service(&app, get("/api/v1/attendances").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        get("/api/v1/attendances")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn registration_login_and_me() {
    let (state, config) = memory_state();
    let app = app!(state, config);

    let id = register!(app, "taro");

    let resp = test::call_service(
        &app,
        post("/api/v1/users").set_json(registration("taro")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let mut bad = registration("jiro");
    bad["zip_code"] = json!("1000001");
    let resp = test::call_service(&app, post("/api/v1/users").set_json(bad).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        post("/auth/token")
            .set_json(json!({ "username": "taro", "password": "wrong-horse" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let token = login!(app, "taro");
    let resp = test::call_service(
        &app,
        get("/api/v1/auth/me").insert_header(("Authorization", token)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = body(resp).await;
    assert_eq!(me["user_id"], json!(id));
    assert_eq!(me["role"], json!("user"));
}

#[actix_web::test]
async fn attendance_lifecycle_over_http() {
    let (state, config) = memory_state();
    let app = app!(state, config);
    register!(app, "hanako");
    let token = login!(app, "hanako");

    let day = json!({
        "work_date": "2025-04-01",
        "clock_in": "09:00:00",
        "rest_in": "12:00:00",
        "rest_out": "13:00:00",
        "clock_out": "18:00:00",
        "transportation_expenses": 480
    });

    let resp = test::call_service(
        &app,
        post("/api/v1/attendances")
            .insert_header(("Authorization", token.clone()))
            .set_json(&day)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body(resp).await;
    assert_eq!(created["working_hours"], json!(8.0));
    assert_eq!(created["rest_hours"], json!(1.0));
    assert_eq!(created["created_by"], json!("hanako"));
    assert_eq!(created["delete_flag"], json!(false));
    let id = created["id"].as_str().unwrap().to_string();

    // same day again
    let resp = test::call_service(
        &app,
        post("/api/v1/attendances")
            .insert_header(("Authorization", token.clone()))
            .set_json(&day)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // broken ordering names the boundary
    let mut broken = day.clone();
    broken["work_date"] = json!("2025-04-02");
    broken["rest_in"] = json!("08:00:00");
    let resp = test::call_service(
        &app,
        post("/api/v1/attendances")
            .insert_header(("Authorization", token.clone()))
            .set_json(&broken)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(resp).await["message"],
        json!("Clock-in time must be before rest-in time")
    );

    let resp = test::call_service(
        &app,
        put(&format!("/api/v1/attendances/{id}"))
            .insert_header(("Authorization", token.clone()))
            .set_json(json!({ "clock_out": "17:00:00" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["working_hours"], json!(7.0));

    let resp = test::call_service(
        &app,
        get("/api/v1/attendances").insert_header(("Authorization", token.clone())).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await.as_array().unwrap().len(), 1);

    let resp = test::call_service(
        &app,
        delete(&format!("/api/v1/attendances/{id}"))
            .insert_header(("Authorization", token.clone()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = test::call_service(
        &app,
        get(&format!("/api/v1/attendances/{id}"))
            .insert_header(("Authorization", token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn users_cannot_touch_each_others_attendance() {
    let (state, config) = memory_state();
    let app = app!(state, config);
    register!(app, "alice");
    let bob_id = register!(app, "bob");
    let alice = login!(app, "alice");

    let resp = test::call_service(
        &app,
        post("/api/v1/attendances")
            .insert_header(("Authorization", alice))
            .set_json(json!({
                "user_id": bob_id,
                "work_date": "2025-04-01",
                "clock_in": "09:00:00",
                "rest_in": "12:00:00",
                "rest_out": "13:00:00",
                "clock_out": "18:00:00"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn role_transitions_over_http() {
    let (state, config) = memory_state();
    let app = app!(state, config);
    let admin_id = register!(app, "root");
    make_admin(&state, &admin_id).await;
    let admin = login!(app, "root");
    let target = register!(app, "taro");

    let promote = |path: &str| {
        put(&format!("/api/v1/users/{target}/{path}"))
            .insert_header(("Authorization", admin.clone()))
            .to_request()
    };

    let resp = test::call_service(&app, promote("promote/manager")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["role"], json!("manager"));

    let resp = test::call_service(&app, promote("promote/manager")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(
        &app,
        get(&format!("/api/v1/users/{target}/manager"))
            .insert_header(("Authorization", admin.clone()))
            .to_request(),
    )
    .await;
    assert_eq!(body(resp).await["has_manager_role"], json!(true));

    let resp = test::call_service(&app, promote("promote/admin")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = test::call_service(&app, promote("demote/manager")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = test::call_service(&app, promote("demote/user")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["role"], json!("user"));

    // unknown user is 404, not 409
    let ghost = UserId::generate();
    let resp = test::call_service(
        &app,
        put(&format!("/api/v1/users/{ghost}/promote/manager"))
            .insert_header(("Authorization", admin.clone()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // non-admins are refused
    let taro = login!(app, "taro");
    let resp = test::call_service(
        &app,
        put(&format!("/api/v1/users/{admin_id}/demote/manager"))
            .insert_header(("Authorization", taro))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn deleted_users_cannot_log_in() {
    let (state, config) = memory_state();
    let app = app!(state, config);
    let admin_id = register!(app, "root");
    make_admin(&state, &admin_id).await;
    let admin = login!(app, "root");
    let target = register!(app, "leaver");

    let resp = test::call_service(
        &app,
        delete(&format!("/api/v1/users/{target}"))
            .insert_header(("Authorization", admin.clone()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = test::call_service(
        &app,
        post("/auth/token")
            .set_json(json!({ "username": "leaver", "password": "correct-horse" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        get(&format!("/api/v1/users/{target}"))
            .insert_header(("Authorization", admin))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn old_tokens_follow_role_changes_and_removal() {
    let (state, config) = memory_state();
    let app = app!(state, config);
    let admin_id = register!(app, "root");
    make_admin(&state, &admin_id).await;
    let admin = login!(app, "root");
    let target = register!(app, "taro");

    let admin_uuid: UserId = admin_id.parse().unwrap();
    state.roles.demote_from_admin_to_manager(admin_uuid, "seed").await.unwrap();
    state.roles.demote_from_manager_to_user(admin_uuid, "seed").await.unwrap();

    let resp = test::call_service(
        &app,
        put(&format!("/api/v1/users/{target}/promote/manager"))
            .insert_header(("Authorization", admin.clone()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(
        &app,
        get("/api/v1/auth/me").insert_header(("Authorization", admin.clone())).to_request(),
    )
    .await;
    assert_eq!(body(resp).await["role"], json!("user"));

    state.users.remove_user(admin_uuid, "seed").await.unwrap();

    let resp = test::call_service(
        &app,
        get("/api/v1/attendances").insert_header(("Authorization", admin.clone())).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        post("/api/v1/attendances")
            .insert_header(("Authorization", admin))
            .set_json(json!({
                "work_date": "2025-04-01",
                "clock_in": "09:00:00",
                "rest_in": "12:00:00",
                "rest_out": "13:00:00",
                "clock_out": "18:00:00"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
