use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

/// Opened once at process start and passed down via `web::Data`.
pub async fn init_db(database_url: &str) -> MySqlPool {
    MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .expect("Failed to connect to database")
}
