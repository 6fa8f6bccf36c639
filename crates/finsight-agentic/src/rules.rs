//! Deterministic decomposition rules.
//!
//! The intent cascade is data: an ordered list of (predicate, intent)
//! rules evaluated first-match-wins, so precedence is visible in one
//! table and testable rule by rule. Quarter phrasing is resolved
//! most-specific-pattern-first so ordinals and spelled-out quarters
//! never collide with year digits.

use once_cell::sync::Lazy;
use regex::Regex;

use finsight_core::alias_cache::AliasSnapshot;
use finsight_core::metrics::contains_phrase;
use finsight_core::types::{Intent, Period};

// ── Cue keywords ──────────────────────────────────────────────

const MACRO_WORDS: &[&str] = &[
    "macro",
    "gdp",
    "inflation",
    "cpi",
    "unemployment",
    "fed funds",
    "federal funds",
    "interest rate",
    "economy",
    "economic",
];

const COMPLETE_WORDS: &[&str] = &[
    "complete",
    "everything",
    "full picture",
    "overview",
    "comprehensive",
    "deep dive",
];

const SENSITIVITY_WORDS: &[&str] = &["sensitivity", "beta", "volatility", "exposure"];

const STOCK_WORDS: &[&str] = &[
    "stock price",
    "share price",
    "stock",
    "shares",
    "trading",
    "traded",
    "closing price",
];

const RANK_WORDS: &[&str] = &[
    "rank",
    "ranking",
    "ranked",
    "peer",
    "peers",
    "leaderboard",
    "top companies",
];

const GROWTH_WORDS: &[&str] = &[
    "growth",
    "cagr",
    "grew",
    "growing",
    "year over year",
    "yoy",
    "compound",
];

/// Features extracted from one question, fed to the intent table.
#[derive(Debug, Clone, Default)]
pub struct Cues {
    /// Raw entity mentions in first-appearance order.
    pub entities: Vec<String>,
    /// Count of distinct canonical ids behind those mentions.
    pub entity_count: usize,
    pub period: Period,
    pub macro_kw: bool,
    pub complete_kw: bool,
    pub sensitivity_kw: bool,
    pub stock_kw: bool,
    pub rank_kw: bool,
    pub growth_kw: bool,
}

fn any_phrase(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(text, p))
}

/// Extract all cue features from a question.
pub fn extract_cues(text: &str, snapshot: &AliasSnapshot) -> Cues {
    let lowered = text.to_lowercase();
    let entities = find_entities(text, snapshot);
    let mut canonical: Vec<String> = entities
        .iter()
        .filter_map(|raw| snapshot.resolve(raw))
        .collect();
    canonical.sort_unstable();
    canonical.dedup();

    Cues {
        entity_count: canonical.len(),
        entities,
        period: extract_period(text),
        macro_kw: any_phrase(&lowered, MACRO_WORDS),
        complete_kw: any_phrase(&lowered, COMPLETE_WORDS),
        sensitivity_kw: any_phrase(&lowered, SENSITIVITY_WORDS),
        stock_kw: any_phrase(&lowered, STOCK_WORDS),
        rank_kw: any_phrase(&lowered, RANK_WORDS),
        growth_kw: any_phrase(&lowered, GROWTH_WORDS),
    }
}

// ── Intent table ──────────────────────────────────────────────

pub struct IntentRule {
    pub name: &'static str,
    pub matches: fn(&Cues) -> bool,
    pub intent: fn(&Cues) -> Intent,
}

/// The precedence table, first-match-wins. The final rule always
/// matches, so every question classifies; the growth rule sits just
/// above it (a catch-all shadows anything below it).
pub static INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        name: "multi_entity_macro",
        matches: |c| c.entity_count >= 2 && c.macro_kw && !c.stock_kw,
        intent: |_| Intent::CompareWithMacro,
    },
    IntentRule {
        name: "multi_entity_compare",
        matches: |c| c.entity_count >= 2 && !c.stock_kw,
        intent: |_| Intent::CompareEntities,
    },
    IntentRule {
        name: "composite",
        matches: |c| {
            c.complete_kw || (c.entity_count >= 1 && (c.sensitivity_kw || c.macro_kw))
        },
        intent: |c| {
            if c.sensitivity_kw {
                Intent::CompleteWithSensitivity
            } else if c.macro_kw {
                Intent::CompleteWithMacro
            } else {
                Intent::CompleteSnapshot
            }
        },
    },
    IntentRule {
        name: "macro_only",
        matches: |c| c.macro_kw && c.entity_count == 0,
        intent: |_| Intent::MacroOnly,
    },
    IntentRule {
        name: "stock_price",
        matches: |c| c.stock_kw,
        intent: |_| Intent::StockPrice,
    },
    IntentRule {
        name: "peer_ranking",
        matches: |c| c.rank_kw,
        intent: |_| Intent::PeerRanking,
    },
    IntentRule {
        name: "growth",
        matches: |c| c.growth_kw,
        intent: |_| Intent::Growth,
    },
    IntentRule {
        name: "period_default",
        matches: |_| true,
        intent: |c| {
            if c.period.fiscal_quarter.is_some() {
                Intent::QuarterMetrics
            } else {
                Intent::AnnualMetrics
            }
        },
    },
];

/// Classify cues through the table. Always returns an intent.
pub fn classify(cues: &Cues) -> Intent {
    for rule in INTENT_RULES {
        if (rule.matches)(cues) {
            return (rule.intent)(cues);
        }
    }
    // The table ends in a catch-all; this is unreachable by
    // construction but the signature stays total.
    Intent::AnnualMetrics
}

/// Name of the first matching rule, for diagnostics.
pub fn matched_rule(cues: &Cues) -> &'static str {
    INTENT_RULES
        .iter()
        .find(|r| (r.matches)(cues))
        .map(|r| r.name)
        .unwrap_or("period_default")
}

// ── Period extraction ─────────────────────────────────────────

static FY_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfy\s*((?:19|20)\d{2})\b").expect("fy year pattern"));
static BARE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("bare year pattern"));

/// Quarter patterns, most specific first: spelled-out ordinals, digit
/// ordinals ("1st Q"), compact ("Q1"), then trailing-digit
/// ("quarter 1"). Trying the specific forms first keeps quarter digits
/// from being confused with year digits.
static QUARTER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(first|second|third|fourth)\s+quarter\b",
        r"(?i)\b([1-4])\s*(?:st|nd|rd|th)\s*(?:q\b|quarter\b)",
        r"(?i)\bq\s*([1-4])\b",
        r"(?i)\bquarter\s*([1-4])\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("quarter pattern"))
    .collect()
});

fn quarter_from_capture(text: &str) -> Option<u8> {
    match text.to_lowercase().as_str() {
        "first" | "1" => Some(1),
        "second" | "2" => Some(2),
        "third" | "3" => Some(3),
        "fourth" | "4" => Some(4),
        _ => None,
    }
}

/// Extract the fiscal period from a question.
pub fn extract_period(text: &str) -> Period {
    let fiscal_year = FY_YEAR
        .captures(text)
        .or_else(|| BARE_YEAR.captures(text))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok());

    let fiscal_quarter = QUARTER_PATTERNS
        .iter()
        .find_map(|p| p.captures(text))
        .and_then(|c| c.get(1))
        .and_then(|m| quarter_from_capture(m.as_str()));

    Period {
        fiscal_year,
        fiscal_quarter,
    }
}

// ── Entity scanning ───────────────────────────────────────────

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Word-boundary occurrences of `needle` in `haystack` (both already
/// lowercased), as byte offsets.
fn boundary_matches(haystack: &str, needle: &str) -> Vec<usize> {
    let mut out = Vec::new();
    let mut start = 0;
    while let Some(rel) = haystack[start..].find(needle) {
        let idx = start + rel;
        let end = idx + needle.len();
        let before_ok =
            idx == 0 || !is_word_char(haystack[..idx].chars().next_back().unwrap_or(' '));
        let after_ok =
            end >= haystack.len() || !is_word_char(haystack[end..].chars().next().unwrap_or(' '));
        if before_ok && after_ok {
            out.push(idx);
        }
        start = idx + needle.len().max(1);
    }
    out
}

/// Scan a question for known entity aliases. Aliases are tried
/// longest-first and matched spans are masked, so "Meta Platforms"
/// never also yields "Meta". Mentions come back in first-appearance
/// order, deduplicated by surface form.
pub fn find_entities(text: &str, snapshot: &AliasSnapshot) -> Vec<String> {
    let mut masked = text.to_lowercase();
    let mut hits: Vec<(usize, String)> = Vec::new();

    for (alias, _canonical) in snapshot.aliases() {
        let needle = alias.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        // Mask matched spans so shorter aliases never re-match inside
        // a longer one's span.
        for idx in boundary_matches(&masked, &needle) {
            hits.push((idx, alias.clone()));
            masked.replace_range(idx..idx + needle.len(), &"\u{0}".repeat(needle.len()));
        }
    }

    hits.sort_by_key(|(idx, _)| *idx);
    let mut seen = std::collections::HashSet::new();
    hits.into_iter()
        .filter(|(_, alias)| seen.insert(alias.clone()))
        .map(|(_, alias)| alias)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::alias_cache::AliasCache;
    use finsight_core::seeds;
    use std::sync::Arc;

    fn snapshot() -> Arc<AliasSnapshot> {
        AliasCache::new().install(seeds::reference_data())
    }

    fn intent_of(text: &str) -> Intent {
        let snap = snapshot();
        classify(&extract_cues(text, &snap))
    }

    // ── Period extraction ─────────────────────────────────────────

    #[test]
    fn quarter_phrasings_resolve_identically() {
        for text in [
            "Apple revenue first quarter 2023",
            "Apple revenue 1st Q 2023",
            "Apple revenue Q1 2023",
            "Apple revenue quarter 1 2023",
        ] {
            assert_eq!(
                extract_period(text),
                Period::quarter(2023, 1),
                "failed for {text:?}"
            );
        }
    }

    #[test]
    fn year_digits_are_not_a_quarter() {
        let p = extract_period("show Apple revenue for 2023");
        assert_eq!(p, Period::year(2023));
    }

    #[test]
    fn fy_prefix_year() {
        assert_eq!(extract_period("Apple FY2022 revenue"), Period::year(2022));
    }

    #[test]
    fn no_period_at_all() {
        assert!(extract_period("how is Apple doing").is_empty());
    }

    #[test]
    fn q2_2023_parses_both_fields() {
        assert_eq!(
            extract_period("Apple and Google revenue Q2 2023"),
            Period::quarter(2023, 2)
        );
    }

    // ── Entity scanning ───────────────────────────────────────────

    #[test]
    fn finds_entities_in_order() {
        let snap = snapshot();
        let found = find_entities("compare Microsoft with Apple", &snap);
        assert_eq!(found, vec!["Microsoft".to_string(), "Apple".to_string()]);
    }

    #[test]
    fn ticker_and_name_both_found() {
        let snap = snapshot();
        let found = find_entities("is AAPL cheaper than Google?", &snap);
        assert_eq!(found, vec!["AAPL".to_string(), "Google".to_string()]);
    }

    #[test]
    fn repeat_mentions_dedupe() {
        let snap = snapshot();
        let found = find_entities("Apple Apple Apple", &snap);
        assert_eq!(found, vec!["Apple".to_string()]);
    }

    #[test]
    fn unknown_companies_are_ignored() {
        let snap = snapshot();
        assert!(find_entities("how is Enron doing", &snap).is_empty());
    }

    // ── Intent table ──────────────────────────────────────────────

    #[test]
    fn annual_default_for_year_question() {
        assert_eq!(
            intent_of("show Apple revenue and net income for 2023"),
            Intent::AnnualMetrics
        );
    }

    #[test]
    fn quarter_default_for_quarter_question() {
        assert_eq!(
            intent_of("show Apple revenue for Q2 2023"),
            Intent::QuarterMetrics
        );
    }

    #[test]
    fn two_entities_compare() {
        assert_eq!(
            intent_of("show Apple and Google revenue Q2 2023"),
            Intent::CompareEntities
        );
    }

    #[test]
    fn synonym_tickers_do_not_count_as_two_entities() {
        // GOOG and GOOGL are one issuer; this is a single-entity question.
        assert_eq!(
            intent_of("show GOOG and GOOGL revenue for 2023"),
            Intent::AnnualMetrics
        );
    }

    #[test]
    fn two_entities_with_macro_overlay() {
        assert_eq!(
            intent_of("compare Apple and Microsoft against inflation"),
            Intent::CompareWithMacro
        );
    }

    #[test]
    fn macro_only_without_entities() {
        assert_eq!(intent_of("what is GDP growth this year"), Intent::MacroOnly);
    }

    #[test]
    fn stock_price_single() {
        assert_eq!(intent_of("what is Tesla's stock price"), Intent::StockPrice);
    }

    #[test]
    fn stock_price_survives_two_entities() {
        // Stock price stays single-entity and fans out at execution;
        // the comparison rewrite must not swallow it.
        assert_eq!(
            intent_of("show Apple and Google stock price"),
            Intent::StockPrice
        );
    }

    #[test]
    fn peer_ranking() {
        assert_eq!(
            intent_of("rank the peers by revenue for 2023"),
            Intent::PeerRanking
        );
    }

    #[test]
    fn growth_beats_the_default() {
        assert_eq!(intent_of("how fast is Nvidia growing"), Intent::Growth);
        assert_eq!(intent_of("Nvidia revenue CAGR"), Intent::Growth);
    }

    #[test]
    fn composite_depths() {
        assert_eq!(
            intent_of("give me a complete overview of Apple for 2023"),
            Intent::CompleteSnapshot
        );
        assert_eq!(
            intent_of("complete view of Apple with macro context"),
            Intent::CompleteWithMacro
        );
        assert_eq!(
            intent_of("complete view of Apple including beta sensitivity"),
            Intent::CompleteWithSensitivity
        );
    }

    #[test]
    fn entity_plus_macro_word_is_composite() {
        assert_eq!(
            intent_of("Apple revenue versus inflation"),
            Intent::CompleteWithMacro
        );
    }

    #[test]
    fn rule_names_surface_for_diagnostics() {
        let snap = snapshot();
        let cues = extract_cues("show Apple and Google revenue Q2 2023", &snap);
        assert_eq!(matched_rule(&cues), "multi_entity_compare");
    }
}
