/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // HTTP API
    pub api_port: u16,

    // Backfill
    pub backfill_page_size: i64,
    /// `None` disables the periodic backfill task.
    pub backfill_interval_secs: Option<u64>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            database_url: required_env("DATABASE_URL"),
            api_port: optional_env("API_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            backfill_page_size: optional_env("BACKFILL_PAGE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            backfill_interval_secs: optional_env("BACKFILL_INTERVAL_SECS").map(|v| {
                v.parse().unwrap_or_else(|_| {
                    panic!("BACKFILL_INTERVAL_SECS must be a number of seconds, got: '{v}'")
                })
            }),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
