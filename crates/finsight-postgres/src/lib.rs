//! finsight-postgres — Postgres implementations of the core port
//! traits.
//!
//! Each adapter is a newtype wrapping `PgPool`. All SQL is
//! runtime-checked (`sqlx::query`, not the compile-time macros) so
//! builds never require a live database.

pub mod alias_store;
pub mod citations;
pub mod executor;
pub mod pool;

pub use alias_store::PgAliasStore;
pub use citations::PgCitationStore;
pub use executor::PgStatementExecutor;
pub use pool::{connect_pool, PoolConfig};
