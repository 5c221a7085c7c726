use crate::{
    api::{attendance, health, user},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{guard, middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    // finish() only fails on a zero period or burst, both clamped above
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(health::health);
    cfg.service(
        web::scope("/auth").service(
            web::resource("/token")
                .wrap(login_limiter.clone())
                .route(web::post().to(handlers::login)),
        ),
    );
    // self-registration; other methods on this path fall through to the protected scope
    cfg.service(
        web::resource(format!("{}/users", config.api_prefix))
            .guard(guard::Post())
            .wrap(register_limiter.clone())
            .route(web::post().to(user::register_user)),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(handlers::me)
            .service(
                web::scope("/users")
                    // /users
                    .service(web::resource("").route(web::get().to(user::list_users)))
                    // /users/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::put().to(user::update_user))
                            .route(web::delete().to(user::delete_user)),
                    )
                    .service(
                        web::resource("/{id}/promote/manager")
                            .route(web::put().to(user::promote_to_manager)),
                    )
                    .service(
                        web::resource("/{id}/promote/admin")
                            .route(web::put().to(user::promote_to_admin)),
                    )
                    .service(
                        web::resource("/{id}/demote/manager")
                            .route(web::put().to(user::demote_to_manager)),
                    )
                    .service(
                        web::resource("/{id}/demote/user")
                            .route(web::put().to(user::demote_to_user)),
                    )
                    // /users/{id}/manager
                    .service(
                        web::resource("/{id}/manager")
                            .route(web::get().to(user::has_manager_role)),
                    ),
            )
            .service(
                web::scope("/attendances")
                    // /attendances
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendances))
                            .route(web::post().to(attendance::create_attendance)),
                    )
                    // /attendances/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_attendance))
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            ),
    );
}
