//! Environment configuration.

use std::time::Duration;

/// Process configuration, gathered once at startup from the
/// environment (with `.env` support).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub statement_timeout: Duration,
    pub openai_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let max_connections = std::env::var("FINSIGHT_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        let statement_timeout = std::env::var("FINSIGHT_STATEMENT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            max_connections,
            statement_timeout,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
        }
    }
}
