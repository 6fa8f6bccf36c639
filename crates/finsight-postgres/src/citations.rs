//! Postgres-backed citation source.
//!
//! Pure lookup against the provenance table; a missing record is an
//! empty citation, never an error.

use async_trait::async_trait;
use sqlx::{PgPool, Row as SqlxRow};

use finsight_core::error::{FinsightError, Result};
use finsight_core::ports::CitationSource;
use finsight_core::types::Citation;

pub struct PgCitationStore {
    pool: PgPool,
}

impl PgCitationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CitationSource for PgCitationStore {
    async fn lookup(
        &self,
        entity_id: &str,
        fiscal_year: Option<i32>,
        fiscal_quarter: Option<u8>,
    ) -> Result<Citation> {
        // Macro-only and peer-ranking result sets have no single
        // entity/period; nothing to cite.
        let Some(year) = fiscal_year else {
            return Ok(Citation::empty());
        };
        if entity_id.is_empty() {
            return Ok(Citation::empty());
        }

        let row = sqlx::query(
            r#"
            SELECT source_name, source_version, as_of
            FROM filing_citations
            WHERE entity_id = $1
              AND fiscal_year = $2
              AND fiscal_quarter IS NOT DISTINCT FROM $3
            ORDER BY as_of DESC
            LIMIT 1
            "#,
        )
        .bind(entity_id)
        .bind(year)
        .bind(fiscal_quarter.map(i16::from))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FinsightError::Datastore(e.to_string()))?;

        Ok(match row {
            Some(row) => Citation {
                source: row.get("source_name"),
                version: row.get("source_version"),
                as_of: row.get("as_of"),
            },
            None => Citation::empty(),
        })
    }
}
