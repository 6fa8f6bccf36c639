//! Read-only pool construction.
//!
//! The pool is the only shared mutable resource in the system: opened
//! once at process start, bounded, and forced read-only at the session
//! level so no statement — validated or not — can write. A server-side
//! statement timeout backs up the engine's client-side timeout.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

/// Knobs for [`connect_pool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub statement_timeout: Duration,
}

impl PoolConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            statement_timeout: Duration::from_secs(5),
        }
    }
}

/// Open the bounded, read-only pool.
pub async fn connect_pool(config: &PoolConfig) -> anyhow::Result<PgPool> {
    let timeout_ms = config.statement_timeout.as_millis();
    let session_setup = format!(
        "SET default_transaction_read_only = on; SET statement_timeout = {timeout_ms}"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .after_connect(move |conn, _meta| {
            let setup = session_setup.clone();
            Box::pin(async move {
                conn.execute(setup.as_str()).await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        timeout_ms = %timeout_ms,
        "connected read-only pool"
    );
    Ok(pool)
}
