//! Postgres-backed alias/schema reference store.

use async_trait::async_trait;
use sqlx::{PgPool, Row as SqlxRow};

use finsight_core::alias_cache::{AliasRecord, ReferenceData, SurfaceColumns};
use finsight_core::error::{FinsightError, Result};
use finsight_core::ports::AliasStore;

pub struct PgAliasStore {
    pool: PgPool,
}

impl PgAliasStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AliasStore for PgAliasStore {
    async fn load_reference(&self) -> Result<ReferenceData> {
        let alias_rows = sqlx::query(
            r#"
            SELECT alias, canonical_id, company_name
            FROM entity_aliases
            ORDER BY canonical_id, alias
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FinsightError::Datastore(e.to_string()))?;

        let aliases = alias_rows
            .iter()
            .map(|row| AliasRecord {
                alias: row.get("alias"),
                canonical_id: row.get("canonical_id"),
                company_name: row.get("company_name"),
            })
            .collect();

        let surface_rows = sqlx::query(
            r#"
            SELECT surface, column_name
            FROM surface_catalog
            ORDER BY surface, ordinal
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FinsightError::Datastore(e.to_string()))?;

        let mut surfaces: Vec<SurfaceColumns> = Vec::new();
        for row in &surface_rows {
            let surface: String = row.get("surface");
            let column: String = row.get("column_name");
            match surfaces.last_mut() {
                Some(last) if last.surface == surface => last.columns.push(column),
                _ => surfaces.push(SurfaceColumns {
                    surface,
                    columns: vec![column],
                }),
            }
        }

        let latest: Option<i32> =
            sqlx::query_scalar("SELECT MAX(fiscal_year) FROM annual_financials")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| FinsightError::Datastore(e.to_string()))?;

        Ok(ReferenceData {
            aliases,
            surfaces,
            latest_fiscal_year: latest.unwrap_or_else(|| {
                tracing::warn!("annual_financials is empty; defaulting latest fiscal year");
                finsight_core::seeds::LATEST_FISCAL_YEAR
            }),
        })
    }
}
