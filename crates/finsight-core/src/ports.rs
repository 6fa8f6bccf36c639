//! Port traits implemented by the datastore adapters.
//!
//! The core crate declares the interfaces; `finsight-postgres` wraps a
//! `PgPool` behind each one, and tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::alias_cache::ReferenceData;
use crate::error::Result;
use crate::types::{BoundStatement, Citation, Row};

/// Loads the alias/schema reference data the cache is built from.
/// Idempotent; called once on first use and again on explicit
/// invalidation.
#[async_trait]
pub trait AliasStore: Send + Sync {
    async fn load_reference(&self) -> Result<ReferenceData>;
}

/// Executes one concrete, already-validated statement and returns its
/// rows. Implementations bind parameters positionally at the driver
/// boundary — never by string interpolation.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn fetch(&self, statement: &BoundStatement) -> Result<Vec<Row>>;
}

/// Provenance lookup for one (entity, period). A missing citation is
/// an empty `Citation`, not an error: macro-only and peer-ranking
/// result sets have no single entity/period to cite.
#[async_trait]
pub trait CitationSource: Send + Sync {
    async fn lookup(
        &self,
        entity_id: &str,
        fiscal_year: Option<i32>,
        fiscal_quarter: Option<u8>,
    ) -> Result<Citation>;
}
