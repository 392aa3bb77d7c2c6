use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod csv_export;
mod db;
mod docs;
mod error;
mod model;
mod routes;
mod store;
mod summary;

use config::Config;
use db::init_db;
use store::attendance::AttendanceStore;
use store::users::UserStore;

use crate::docs::ApiDoc;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Attendance tracker is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    let user_store = UserStore::new(pool.clone());
    let attendance_store = AttendanceStore::new(pool);

    // Warm the taken-username cache in the background; startup never blocks on it
    let warmup_store = user_store.clone();
    let warmup_days = config.cache_warmup_days;
    let warmup_batch = config.cache_warmup_batch;
    actix_web::rt::spawn(async move {
        if let Err(e) = warmup_store
            .warmup_username_cache(warmup_days, warmup_batch)
            .await
        {
            warn!(error = %e, "Failed to warm username cache");
        }
    });

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(user_store.clone()))
            .app_data(Data::new(attendance_store.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
