use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub database_url: String,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_api_per_min: u32,

    pub api_prefix: String,

    // Username-cache warmup
    pub cache_warmup_days: u32,
    pub cache_warmup_batch: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            rate_login_per_min: env::var("RATE_LOGIN_PER_MIN")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),
            rate_register_per_min: env::var("RATE_REGISTER_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            rate_api_per_min: env::var("RATE_API_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            cache_warmup_days: env::var("CACHE_WARMUP_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            cache_warmup_batch: env::var("CACHE_WARMUP_BATCH")
                .unwrap_or_else(|_| "250".to_string())
                .parse()
                .unwrap(),
        }
    }
}
