//! Metric catalog.
//!
//! One table drives both sides of the pipeline: the decomposer reads
//! requested measures out of a question, and the formatter decides
//! which computed columns to surface. Keeping the phrase precedence in
//! a single ordered list means a rule like "`R&D to revenue` must not
//! also match `revenue`" is stated exactly once.
//!
//! Matching is word-boundary aware and first-listed-wins: more specific
//! multi-word phrases sit earlier in the catalog, and each entry can
//! name blocker phrases whose occurrences are masked out of the text
//! before the entry's own phrases are searched.

use serde::{Deserialize, Serialize};

/// How a metric value renders in a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    /// Money in billions: `$94.8B`.
    MoneyBillions,
    /// Percentage: `44.1%`.
    Percent,
    /// Plain dollars: `$1.26`.
    Dollars,
    /// Unitless ratio: `1.28`.
    Ratio,
}

#[derive(Debug)]
pub struct MetricDef {
    /// Stable metric code carried in `Task::measures`.
    pub code: &'static str,
    /// Phrase used when the metric is rendered.
    pub label: &'static str,
    /// Question phrases that request this metric, word-boundary matched.
    pub phrases: &'static [&'static str],
    /// Longer phrases masked out before this entry's phrases are
    /// searched, so a generic word never matches inside a more specific
    /// request handled elsewhere.
    pub blockers: &'static [&'static str],
    /// Column fallback chain: quarterly name, then annual, then
    /// trailing-twelve-months. The first non-null column wins.
    pub columns: &'static [&'static str],
    pub unit: Unit,
}

/// Ordered catalog. Order matters twice: specific-before-generic for
/// matching, and emission order in formatted sentences.
pub const CATALOG: &[MetricDef] = &[
    MetricDef {
        code: "rd_to_revenue",
        label: "R&D to revenue",
        phrases: &[
            "r&d to revenue",
            "rd to revenue",
            "research and development to revenue",
            "r&d intensity",
        ],
        blockers: &[],
        columns: &["rd_to_revenue", "annual_rd_to_revenue"],
        unit: Unit::Percent,
    },
    MetricDef {
        code: "revenue_cagr",
        label: "3-year revenue CAGR",
        phrases: &["cagr", "compound annual growth"],
        blockers: &[],
        columns: &["revenue_cagr_3y"],
        unit: Unit::Percent,
    },
    MetricDef {
        code: "revenue_growth",
        label: "revenue growth",
        phrases: &["revenue growth", "growth", "grew", "growing"],
        blockers: &["gdp growth", "compound annual growth"],
        columns: &["revenue_yoy"],
        unit: Unit::Percent,
    },
    MetricDef {
        code: "free_cash_flow",
        label: "free cash flow",
        phrases: &["free cash flow", "fcf"],
        blockers: &[],
        columns: &[
            "free_cash_flow",
            "annual_free_cash_flow",
            "ttm_free_cash_flow",
        ],
        unit: Unit::MoneyBillions,
    },
    MetricDef {
        code: "gross_margin",
        label: "gross margin",
        phrases: &["gross margin"],
        blockers: &[],
        columns: &["gross_margin", "annual_gross_margin"],
        unit: Unit::Percent,
    },
    MetricDef {
        code: "operating_margin",
        label: "operating margin",
        phrases: &["operating margin", "margin"],
        blockers: &["gross margin", "margin rank"],
        columns: &["operating_margin", "annual_operating_margin"],
        unit: Unit::Percent,
    },
    MetricDef {
        code: "eps",
        label: "EPS",
        phrases: &["earnings per share", "eps", "diluted earnings"],
        blockers: &[],
        columns: &["eps", "annual_eps"],
        unit: Unit::Dollars,
    },
    MetricDef {
        code: "net_income",
        label: "net income",
        phrases: &["net income", "profit", "earnings", "bottom line"],
        blockers: &["earnings per share", "diluted earnings"],
        columns: &["net_income", "annual_net_income", "ttm_net_income"],
        unit: Unit::MoneyBillions,
    },
    MetricDef {
        code: "revenue",
        label: "revenue",
        phrases: &["revenue", "sales", "top line", "turnover"],
        blockers: &[
            "r&d to revenue",
            "rd to revenue",
            "research and development to revenue",
            "revenue growth",
            "revenue rank",
        ],
        columns: &["revenue", "annual_revenue", "ttm_revenue"],
        unit: Unit::MoneyBillions,
    },
    MetricDef {
        code: "close_price",
        label: "closing price",
        phrases: &["stock price", "share price", "closing price", "price"],
        blockers: &[],
        columns: &["close_price"],
        unit: Unit::Dollars,
    },
    MetricDef {
        code: "market_cap",
        label: "market cap",
        phrases: &["market cap", "market capitalization", "valuation"],
        blockers: &[],
        columns: &["market_cap"],
        unit: Unit::MoneyBillions,
    },
    MetricDef {
        code: "beta",
        label: "beta",
        phrases: &["beta", "volatility"],
        blockers: &[],
        columns: &["beta"],
        unit: Unit::Ratio,
    },
    MetricDef {
        code: "rate_sensitivity",
        label: "rate sensitivity",
        phrases: &["rate sensitivity", "sensitivity", "interest rate exposure"],
        blockers: &[],
        columns: &["rate_sensitivity"],
        unit: Unit::Ratio,
    },
    MetricDef {
        code: "gdp_growth",
        label: "GDP growth",
        phrases: &["gdp"],
        blockers: &[],
        columns: &["gdp_growth"],
        unit: Unit::Percent,
    },
    MetricDef {
        code: "cpi",
        label: "CPI inflation",
        phrases: &["inflation", "cpi"],
        blockers: &[],
        columns: &["cpi_yoy"],
        unit: Unit::Percent,
    },
    MetricDef {
        code: "unemployment",
        label: "unemployment",
        phrases: &["unemployment"],
        blockers: &[],
        columns: &["unemployment_rate"],
        unit: Unit::Percent,
    },
    MetricDef {
        code: "fed_funds",
        label: "fed funds rate",
        phrases: &["fed funds", "federal funds", "interest rate"],
        blockers: &["interest rate exposure"],
        columns: &["fed_funds_rate"],
        unit: Unit::Percent,
    },
];

/// Phrases that flip the formatter into show-all mode.
pub const SHOW_ALL_PHRASES: &[&str] = &[
    "everything",
    "all metrics",
    "all the metrics",
    "all the numbers",
    "complete",
    "full picture",
    "overview",
    "comprehensive",
];

/// Word-boundary substring check over lowercased text.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    find_phrase(text, phrase).is_some()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Byte offset of the first word-boundary occurrence of `phrase`.
fn find_phrase(text: &str, phrase: &str) -> Option<usize> {
    let mut start = 0;
    while let Some(rel) = text[start..].find(phrase) {
        let idx = start + rel;
        let before_ok = idx == 0 || !is_word_char(text[..idx].chars().next_back().unwrap_or(' '));
        let end = idx + phrase.len();
        let after_ok =
            end >= text.len() || !is_word_char(text[end..].chars().next().unwrap_or(' '));
        if before_ok && after_ok {
            return Some(idx);
        }
        start = idx + phrase.len().max(1);
    }
    None
}

/// Blank out every word-boundary occurrence of `phrase` in place.
fn mask_phrase(text: &mut String, phrase: &str) {
    loop {
        let Some(idx) = find_phrase(text, phrase) else {
            break;
        };
        text.replace_range(idx..idx + phrase.len(), &" ".repeat(phrase.len()));
    }
}

/// Which metrics a question requests, in catalog order. Empty when the
/// question names none — callers treat that as show-all.
pub fn requested_metrics(question: &str) -> Vec<&'static MetricDef> {
    let lowered = question.to_lowercase();
    let mut selected = Vec::new();
    for def in CATALOG {
        let mut masked = lowered.clone();
        for blocker in def.blockers {
            mask_phrase(&mut masked, blocker);
        }
        if def.phrases.iter().any(|p| contains_phrase(&masked, p)) {
            selected.push(def);
        }
    }
    selected
}

/// Whether the question uses generic "show me everything" language.
pub fn wants_all_metrics(question: &str) -> bool {
    let lowered = question.to_lowercase();
    SHOW_ALL_PHRASES
        .iter()
        .any(|p| contains_phrase(&lowered, p))
}

pub fn lookup(code: &str) -> Option<&'static MetricDef> {
    CATALOG.iter().find(|def| def.code == code)
}

/// Render a metric value as a sentence fragment: "revenue of $94.8B".
pub fn render(def: &MetricDef, value: f64) -> String {
    match def.unit {
        Unit::MoneyBillions => format!("{} of ${:.1}B", def.label, value),
        Unit::Percent => format!("{} of {:.1}%", def.label, value),
        Unit::Dollars => format!("{} of ${:.2}", def.label, value),
        Unit::Ratio => format!("{} of {:.2}", def.label, value),
    }
}
