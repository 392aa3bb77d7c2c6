use crate::{
    api::{attendance, users},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = build_limiter(config.rate_login_per_min);
    let register_limiter = build_limiter(config.rate_register_per_min);
    let api_limiter = build_limiter(config.rate_api_per_min);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/register")
                    .wrap(register_limiter)
                    .route(web::post().to(users::register)),
            )
            .service(
                web::resource("/login")
                    .wrap(login_limiter)
                    .route(web::post().to(users::login)),
            ),
    );

    // API routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(api_limiter)
            .service(
                web::scope("/users")
                    // /users
                    .service(web::resource("").route(web::get().to(users::list_users)))
                    // /users/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(users::get_user))
                            .route(web::delete().to(users::delete_user)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // mark today's attendance (create-or-correct)
                    .service(web::resource("/mark").route(web::post().to(attendance::mark_today)))
                    // check out
                    .service(
                        web::resource("/checkout").route(web::post().to(attendance::check_out)),
                    )
                    // today's status
                    .service(
                        web::resource("/today/{user_id}")
                            .route(web::get().to(attendance::get_today)),
                    )
                    // monthly summary
                    .service(
                        web::resource("/monthly/{user_id}/{month}")
                            .route(web::get().to(attendance::monthly_summary)),
                    )
                    // CSV download
                    .service(
                        web::resource("/download/{user_id}/{month}")
                            .route(web::get().to(attendance::download_csv)),
                    )
                    // range statistics
                    .service(web::resource("/stats").route(web::get().to(attendance::range_stats))),
            ),
    );
}
