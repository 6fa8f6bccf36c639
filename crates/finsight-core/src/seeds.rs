//! Built-in reference seeds.
//!
//! The covered universe is a fixed, closed set of issuers; these seeds
//! mirror what the datastore's reference tables hold and back the
//! in-memory store implementations used by tests and by the CLI when
//! no datastore is configured.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::alias_cache::{AliasRecord, ReferenceData, SurfaceColumns};
use crate::error::Result;
use crate::ports::{AliasStore, CitationSource};
use crate::types::Citation;

/// Most recent fiscal year the seed data covers.
pub const LATEST_FISCAL_YEAR: i32 = 2024;

fn alias(alias: &str, canonical: &str, name: &str) -> AliasRecord {
    AliasRecord {
        alias: alias.to_string(),
        canonical_id: canonical.to_string(),
        company_name: name.to_string(),
    }
}

/// The alias universe. Note the Alphabet synonym group: both share
/// classes and both common names map to the primary listing `GOOGL`.
pub fn reference_data() -> ReferenceData {
    let aliases = vec![
        alias("AAPL", "AAPL", "Apple Inc."),
        alias("Apple", "AAPL", "Apple Inc."),
        alias("MSFT", "MSFT", "Microsoft Corporation"),
        alias("Microsoft", "MSFT", "Microsoft Corporation"),
        alias("GOOGL", "GOOGL", "Alphabet Inc."),
        alias("GOOG", "GOOGL", "Alphabet Inc."),
        alias("Google", "GOOGL", "Alphabet Inc."),
        alias("Alphabet", "GOOGL", "Alphabet Inc."),
        alias("AMZN", "AMZN", "Amazon.com, Inc."),
        alias("Amazon", "AMZN", "Amazon.com, Inc."),
        alias("META", "META", "Meta Platforms, Inc."),
        alias("Meta", "META", "Meta Platforms, Inc."),
        alias("Facebook", "META", "Meta Platforms, Inc."),
        alias("NVDA", "NVDA", "NVIDIA Corporation"),
        alias("Nvidia", "NVDA", "NVIDIA Corporation"),
        alias("TSLA", "TSLA", "Tesla, Inc."),
        alias("Tesla", "TSLA", "Tesla, Inc."),
    ];

    let surface = |name: &str, columns: &[&str]| SurfaceColumns {
        surface: name.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
    };

    let surfaces = vec![
        surface(
            "quarterly_financials",
            &[
                "entity_id",
                "fiscal_year",
                "fiscal_quarter",
                "revenue",
                "net_income",
                "gross_margin",
                "operating_margin",
                "eps",
                "rd_to_revenue",
                "free_cash_flow",
            ],
        ),
        surface(
            "annual_financials",
            &[
                "entity_id",
                "fiscal_year",
                "annual_revenue",
                "annual_net_income",
                "annual_gross_margin",
                "annual_operating_margin",
                "annual_eps",
                "annual_rd_to_revenue",
                "annual_free_cash_flow",
                "revenue_yoy",
                "net_income_yoy",
                "revenue_cagr_3y",
            ],
        ),
        surface(
            "ttm_financials",
            &["entity_id", "ttm_revenue", "ttm_net_income", "ttm_free_cash_flow"],
        ),
        surface(
            "stock_prices",
            &["entity_id", "trade_date", "close_price", "volume"],
        ),
        surface(
            "macro_indicators",
            &[
                "fiscal_year",
                "fiscal_quarter",
                "gdp_growth",
                "cpi_yoy",
                "unemployment_rate",
                "fed_funds_rate",
            ],
        ),
        surface(
            "peer_rankings",
            &[
                "entity_id",
                "fiscal_year",
                "sector",
                "revenue_rank",
                "margin_rank",
                "annual_revenue",
                "annual_operating_margin",
            ],
        ),
        surface(
            "company_profiles",
            &[
                "entity_id",
                "company_name",
                "sector",
                "market_cap",
                "beta",
                "rate_sensitivity",
            ],
        ),
    ];

    ReferenceData {
        aliases,
        surfaces,
        latest_fiscal_year: LATEST_FISCAL_YEAR,
    }
}

/// In-memory alias store serving the seed universe.
pub struct SeedAliasStore;

#[async_trait]
impl AliasStore for SeedAliasStore {
    async fn load_reference(&self) -> Result<ReferenceData> {
        Ok(reference_data())
    }
}

/// In-memory citation source: quarterly slices cite the 10-Q, annual
/// slices the 10-K. Anything without an entity and year has no
/// citation.
pub struct SeedCitationSource;

#[async_trait]
impl CitationSource for SeedCitationSource {
    async fn lookup(
        &self,
        entity_id: &str,
        fiscal_year: Option<i32>,
        fiscal_quarter: Option<u8>,
    ) -> Result<Citation> {
        let Some(year) = fiscal_year else {
            return Ok(Citation::empty());
        };
        if entity_id.is_empty() {
            return Ok(Citation::empty());
        }
        let citation = match fiscal_quarter {
            Some(q) => Citation {
                source: format!("{entity_id} Form 10-Q"),
                version: format!("FY{year} Q{q}"),
                as_of: Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single(),
            },
            None => Citation {
                source: format!("{entity_id} Form 10-K"),
                version: format!("FY{year}"),
                as_of: Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single(),
            },
        };
        Ok(citation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::ALLOWED_SURFACES;

    #[test]
    fn seed_surfaces_match_the_allow_list() {
        let data = reference_data();
        let mut seeded: Vec<&str> = data.surfaces.iter().map(|s| s.surface.as_str()).collect();
        seeded.sort_unstable();
        assert_eq!(seeded, ALLOWED_SURFACES);
    }

    #[tokio::test]
    async fn quarterly_citation_cites_the_10q() {
        let c = SeedCitationSource
            .lookup("AAPL", Some(2023), Some(2))
            .await
            .unwrap();
        assert_eq!(c.source, "AAPL Form 10-Q");
        assert_eq!(c.version, "FY2023 Q2");
    }

    #[tokio::test]
    async fn missing_period_yields_empty_citation() {
        let c = SeedCitationSource.lookup("AAPL", None, None).await.unwrap();
        assert!(c.is_empty());
        let c = SeedCitationSource.lookup("", Some(2023), None).await.unwrap();
        assert!(c.is_empty());
    }
}
