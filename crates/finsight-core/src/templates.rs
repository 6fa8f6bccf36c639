//! The closed enumeration of SQL templates.
//!
//! Every statement this system ever executes starts life as one of
//! these shapes. Templates carry named placeholders (`:entity_id`);
//! the executor rewrites them to positional `$n` bindings at the
//! driver boundary. Projections are always explicit — the validator
//! rejects `SELECT *` — and every template ends in `LIMIT :limit`.

use serde::{Deserialize, Serialize};

use crate::types::{Intent, Period};

/// Relational surfaces eligible to appear in a FROM/JOIN clause.
/// This is the validator's allow-list; anything else rejects.
pub const ALLOWED_SURFACES: &[&str] = &[
    "annual_financials",
    "company_profiles",
    "macro_indicators",
    "peer_rankings",
    "quarterly_financials",
    "stock_prices",
    "ttm_financials",
];

/// The complete vocabulary of bindable parameter names. The planner
/// never produces any other name, and the validator rejects any other
/// name.
pub const ALLOWED_PARAMS: &[&str] = &[
    "entity_id",
    "entity_id_a",
    "entity_id_b",
    "fiscal_quarter",
    "fiscal_year",
    "limit",
];

/// Hard ceiling on any LIMIT value, literal or bound.
pub const LIMIT_CEILING: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    QuarterSnapshot,
    AnnualMetrics,
    CompareQuarter,
    CompareAnnual,
    CompareMacroOverlay,
    MacroSnapshot,
    StockPriceSeries,
    PeerRanking,
    GrowthSummary,
    CompleteSnapshot,
    CompleteWithMacro,
    CompleteWithSensitivity,
}

impl Template {
    /// Select the template for an intent. Comparison intents split on
    /// period detail: a quarter-specific question uses the quarterly
    /// surface, otherwise the annual one.
    pub fn for_intent(intent: Intent, period: Period) -> Template {
        match intent {
            Intent::QuarterMetrics => Self::QuarterSnapshot,
            Intent::AnnualMetrics => Self::AnnualMetrics,
            Intent::CompareEntities => {
                if period.fiscal_quarter.is_some() {
                    Self::CompareQuarter
                } else {
                    Self::CompareAnnual
                }
            }
            Intent::CompareWithMacro => Self::CompareMacroOverlay,
            Intent::MacroOnly => Self::MacroSnapshot,
            Intent::StockPrice => Self::StockPriceSeries,
            Intent::PeerRanking => Self::PeerRanking,
            Intent::Growth => Self::GrowthSummary,
            Intent::CompleteSnapshot => Self::CompleteSnapshot,
            Intent::CompleteWithMacro => Self::CompleteWithMacro,
            Intent::CompleteWithSensitivity => Self::CompleteWithSensitivity,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::QuarterSnapshot => "quarter_snapshot",
            Self::AnnualMetrics => "annual_metrics",
            Self::CompareQuarter => "compare_quarter",
            Self::CompareAnnual => "compare_annual",
            Self::CompareMacroOverlay => "compare_macro_overlay",
            Self::MacroSnapshot => "macro_snapshot",
            Self::StockPriceSeries => "stock_price_series",
            Self::PeerRanking => "peer_ranking",
            Self::GrowthSummary => "growth_summary",
            Self::CompleteSnapshot => "complete_snapshot",
            Self::CompleteWithMacro => "complete_with_macro",
            Self::CompleteWithSensitivity => "complete_with_sensitivity",
        }
    }

    /// Parameter names this template binds. Always a subset of
    /// [`ALLOWED_PARAMS`].
    pub fn params(&self) -> &'static [&'static str] {
        match self {
            Self::QuarterSnapshot => &["entity_id", "fiscal_year", "fiscal_quarter", "limit"],
            Self::AnnualMetrics => &["entity_id", "fiscal_year", "limit"],
            Self::CompareQuarter => &[
                "entity_id_a",
                "entity_id_b",
                "fiscal_year",
                "fiscal_quarter",
                "limit",
            ],
            Self::CompareAnnual => &["entity_id_a", "entity_id_b", "fiscal_year", "limit"],
            Self::CompareMacroOverlay => &["entity_id_a", "entity_id_b", "fiscal_year", "limit"],
            Self::MacroSnapshot => &["fiscal_year", "limit"],
            Self::StockPriceSeries => &["entity_id", "limit"],
            Self::PeerRanking => &["fiscal_year", "limit"],
            Self::GrowthSummary => &["entity_id", "limit"],
            Self::CompleteSnapshot => &["entity_id", "fiscal_year", "limit"],
            Self::CompleteWithMacro => &["entity_id", "fiscal_year", "limit"],
            Self::CompleteWithSensitivity => &["entity_id", "fiscal_year", "limit"],
        }
    }

    /// Surfaces the template touches. Always a subset of
    /// [`ALLOWED_SURFACES`].
    pub fn surfaces(&self) -> &'static [&'static str] {
        match self {
            Self::QuarterSnapshot | Self::CompareQuarter => &["quarterly_financials"],
            Self::AnnualMetrics | Self::CompareAnnual | Self::GrowthSummary => {
                &["annual_financials"]
            }
            Self::CompareMacroOverlay => &["quarterly_financials", "macro_indicators"],
            Self::MacroSnapshot => &["macro_indicators"],
            Self::StockPriceSeries => &["stock_prices"],
            Self::PeerRanking => &["peer_rankings"],
            Self::CompleteSnapshot => {
                &["quarterly_financials", "annual_financials", "company_profiles"]
            }
            Self::CompleteWithMacro => &[
                "quarterly_financials",
                "annual_financials",
                "company_profiles",
                "macro_indicators",
            ],
            Self::CompleteWithSensitivity => &[
                "quarterly_financials",
                "annual_financials",
                "company_profiles",
                "macro_indicators",
                "ttm_financials",
            ],
        }
    }

    /// Default row cap bound to `:limit`. Series templates carry a
    /// larger window than point lookups; everything stays well under
    /// [`LIMIT_CEILING`].
    pub fn default_limit(&self) -> i64 {
        match self {
            Self::StockPriceSeries => 30,
            Self::PeerRanking => 20,
            Self::GrowthSummary => 10,
            Self::MacroSnapshot => 8,
            _ => 8,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::QuarterSnapshot => {
                "SELECT entity_id, fiscal_year, fiscal_quarter,\n       \
                        revenue, net_income, gross_margin, operating_margin,\n       \
                        eps, rd_to_revenue, free_cash_flow\n\
                 FROM quarterly_financials\n\
                 WHERE entity_id = :entity_id\n  \
                   AND fiscal_year = :fiscal_year\n  \
                   AND fiscal_quarter = :fiscal_quarter\n\
                 ORDER BY fiscal_year DESC, fiscal_quarter DESC\n\
                 LIMIT :limit"
            }
            Self::AnnualMetrics => {
                "SELECT entity_id, fiscal_year,\n       \
                        annual_revenue, annual_net_income, annual_gross_margin,\n       \
                        annual_operating_margin, annual_eps, annual_rd_to_revenue,\n       \
                        annual_free_cash_flow\n\
                 FROM annual_financials\n\
                 WHERE entity_id = :entity_id\n  \
                   AND fiscal_year = :fiscal_year\n\
                 ORDER BY fiscal_year DESC\n\
                 LIMIT :limit"
            }
            Self::CompareQuarter => {
                "SELECT entity_id, fiscal_year, fiscal_quarter,\n       \
                        revenue, net_income, gross_margin, operating_margin,\n       \
                        eps, rd_to_revenue, free_cash_flow\n\
                 FROM quarterly_financials\n\
                 WHERE entity_id IN (:entity_id_a, :entity_id_b)\n  \
                   AND fiscal_year = :fiscal_year\n  \
                   AND fiscal_quarter = :fiscal_quarter\n\
                 ORDER BY entity_id\n\
                 LIMIT :limit"
            }
            Self::CompareAnnual => {
                "SELECT entity_id, fiscal_year,\n       \
                        annual_revenue, annual_net_income, annual_gross_margin,\n       \
                        annual_operating_margin, annual_eps, annual_rd_to_revenue,\n       \
                        annual_free_cash_flow\n\
                 FROM annual_financials\n\
                 WHERE entity_id IN (:entity_id_a, :entity_id_b)\n  \
                   AND fiscal_year = :fiscal_year\n\
                 ORDER BY entity_id\n\
                 LIMIT :limit"
            }
            Self::CompareMacroOverlay => {
                "SELECT q.entity_id, q.fiscal_year, q.fiscal_quarter,\n       \
                        q.revenue, q.net_income, q.operating_margin, q.eps,\n       \
                        m.gdp_growth, m.cpi_yoy, m.fed_funds_rate\n\
                 FROM quarterly_financials q\n\
                 JOIN macro_indicators m\n  \
                   ON m.fiscal_year = q.fiscal_year\n \
                  AND m.fiscal_quarter = q.fiscal_quarter\n\
                 WHERE q.entity_id IN (:entity_id_a, :entity_id_b)\n  \
                   AND q.fiscal_year = :fiscal_year\n\
                 ORDER BY q.entity_id, q.fiscal_quarter\n\
                 LIMIT :limit"
            }
            Self::MacroSnapshot => {
                "SELECT fiscal_year, fiscal_quarter,\n       \
                        gdp_growth, cpi_yoy, unemployment_rate, fed_funds_rate\n\
                 FROM macro_indicators\n\
                 WHERE fiscal_year = :fiscal_year\n\
                 ORDER BY fiscal_quarter\n\
                 LIMIT :limit"
            }
            Self::StockPriceSeries => {
                "SELECT entity_id, trade_date, close_price, volume\n\
                 FROM stock_prices\n\
                 WHERE entity_id = :entity_id\n\
                 ORDER BY trade_date DESC\n\
                 LIMIT :limit"
            }
            Self::PeerRanking => {
                "SELECT entity_id, sector, revenue_rank, margin_rank,\n       \
                        annual_revenue, annual_operating_margin\n\
                 FROM peer_rankings\n\
                 WHERE fiscal_year = :fiscal_year\n\
                 ORDER BY revenue_rank\n\
                 LIMIT :limit"
            }
            Self::GrowthSummary => {
                "SELECT entity_id, fiscal_year, annual_revenue,\n       \
                        revenue_yoy, net_income_yoy, revenue_cagr_3y\n\
                 FROM annual_financials\n\
                 WHERE entity_id = :entity_id\n\
                 ORDER BY fiscal_year DESC\n\
                 LIMIT :limit"
            }
            Self::CompleteSnapshot => {
                "SELECT q.entity_id, q.fiscal_year, q.fiscal_quarter,\n       \
                        q.revenue, q.net_income, q.gross_margin, q.operating_margin,\n       \
                        q.eps, q.rd_to_revenue, q.free_cash_flow,\n       \
                        a.annual_revenue, a.annual_net_income, a.annual_eps,\n       \
                        p.company_name, p.sector, p.market_cap\n\
                 FROM quarterly_financials q\n\
                 JOIN annual_financials a\n  \
                   ON a.entity_id = q.entity_id\n \
                  AND a.fiscal_year = q.fiscal_year\n\
                 JOIN company_profiles p\n  \
                   ON p.entity_id = q.entity_id\n\
                 WHERE q.entity_id = :entity_id\n  \
                   AND q.fiscal_year = :fiscal_year\n\
                 ORDER BY q.fiscal_quarter DESC\n\
                 LIMIT :limit"
            }
            Self::CompleteWithMacro => {
                "SELECT q.entity_id, q.fiscal_year, q.fiscal_quarter,\n       \
                        q.revenue, q.net_income, q.gross_margin, q.operating_margin,\n       \
                        q.eps, q.rd_to_revenue, q.free_cash_flow,\n       \
                        a.annual_revenue, a.annual_net_income, a.annual_eps,\n       \
                        p.company_name, p.sector, p.market_cap,\n       \
                        m.gdp_growth, m.cpi_yoy, m.fed_funds_rate\n\
                 FROM quarterly_financials q\n\
                 JOIN annual_financials a\n  \
                   ON a.entity_id = q.entity_id\n \
                  AND a.fiscal_year = q.fiscal_year\n\
                 JOIN company_profiles p\n  \
                   ON p.entity_id = q.entity_id\n\
                 JOIN macro_indicators m\n  \
                   ON m.fiscal_year = q.fiscal_year\n \
                  AND m.fiscal_quarter = q.fiscal_quarter\n\
                 WHERE q.entity_id = :entity_id\n  \
                   AND q.fiscal_year = :fiscal_year\n\
                 ORDER BY q.fiscal_quarter DESC\n\
                 LIMIT :limit"
            }
            Self::CompleteWithSensitivity => {
                "SELECT q.entity_id, q.fiscal_year, q.fiscal_quarter,\n       \
                        q.revenue, q.net_income, q.gross_margin, q.operating_margin,\n       \
                        q.eps, q.rd_to_revenue, q.free_cash_flow,\n       \
                        a.annual_revenue, a.annual_net_income, a.annual_eps,\n       \
                        t.ttm_revenue, t.ttm_net_income, t.ttm_free_cash_flow,\n       \
                        p.company_name, p.sector, p.market_cap, p.beta, p.rate_sensitivity,\n       \
                        m.gdp_growth, m.cpi_yoy, m.fed_funds_rate\n\
                 FROM quarterly_financials q\n\
                 JOIN annual_financials a\n  \
                   ON a.entity_id = q.entity_id\n \
                  AND a.fiscal_year = q.fiscal_year\n\
                 JOIN ttm_financials t\n  \
                   ON t.entity_id = q.entity_id\n\
                 JOIN company_profiles p\n  \
                   ON p.entity_id = q.entity_id\n\
                 JOIN macro_indicators m\n  \
                   ON m.fiscal_year = q.fiscal_year\n \
                  AND m.fiscal_quarter = q.fiscal_quarter\n\
                 WHERE q.entity_id = :entity_id\n  \
                   AND q.fiscal_year = :fiscal_year\n\
                 ORDER BY q.fiscal_quarter DESC\n\
                 LIMIT :limit"
            }
        }
    }

    pub fn all() -> &'static [Template] {
        &[
            Self::QuarterSnapshot,
            Self::AnnualMetrics,
            Self::CompareQuarter,
            Self::CompareAnnual,
            Self::CompareMacroOverlay,
            Self::MacroSnapshot,
            Self::StockPriceSeries,
            Self::PeerRanking,
            Self::GrowthSummary,
            Self::CompleteSnapshot,
            Self::CompleteWithMacro,
            Self::CompleteWithSensitivity,
        ]
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_declares_only_allowed_params() {
        for t in Template::all() {
            for p in t.params() {
                assert!(ALLOWED_PARAMS.contains(p), "{t}: param {p} not allowed");
            }
        }
    }

    #[test]
    fn every_template_declares_only_allowed_surfaces() {
        for t in Template::all() {
            for s in t.surfaces() {
                assert!(ALLOWED_SURFACES.contains(s), "{t}: surface {s} not allowed");
            }
        }
    }

    #[test]
    fn every_template_sql_carries_a_bound_limit() {
        for t in Template::all() {
            assert!(
                t.sql().contains("LIMIT :limit"),
                "{t}: missing LIMIT :limit"
            );
        }
    }

    #[test]
    fn no_template_projects_a_wildcard() {
        for t in Template::all() {
            assert!(!t.sql().contains('*'), "{t}: wildcard projection");
        }
    }

    #[test]
    fn default_limits_stay_under_the_ceiling() {
        for t in Template::all() {
            assert!(t.default_limit() <= LIMIT_CEILING, "{t}");
            assert!(t.default_limit() >= 1, "{t}");
        }
    }

    #[test]
    fn comparison_intent_splits_on_period_detail() {
        assert_eq!(
            Template::for_intent(Intent::CompareEntities, Period::quarter(2023, 2)),
            Template::CompareQuarter
        );
        assert_eq!(
            Template::for_intent(Intent::CompareEntities, Period::year(2023)),
            Template::CompareAnnual
        );
    }

    #[test]
    fn stock_price_template_is_single_entity() {
        let t = Template::for_intent(Intent::StockPrice, Period::default());
        assert_eq!(t, Template::StockPriceSeries);
        assert!(t.params().contains(&"entity_id"));
        assert!(!t.params().contains(&"entity_id_a"));
    }
}
