//! Domain types shared across the pipeline.
//!
//! Everything here is plain data: built once per turn, passed stage to
//! stage, and never mutated in place after construction (the router's
//! intent rewrite produces a new `Plan`, it does not edit the `Task`).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::templates::Template;

// ── Period ────────────────────────────────────────────────────

/// Fiscal period extracted from a question. Both fields optional; a
/// fully-empty period means "whatever the planner defaults to".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Period {
    pub fiscal_year: Option<i32>,
    pub fiscal_quarter: Option<u8>,
}

impl Period {
    pub fn year(fiscal_year: i32) -> Self {
        Self {
            fiscal_year: Some(fiscal_year),
            fiscal_quarter: None,
        }
    }

    pub fn quarter(fiscal_year: i32, fiscal_quarter: u8) -> Self {
        Self {
            fiscal_year: Some(fiscal_year),
            fiscal_quarter: Some(fiscal_quarter),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fiscal_year.is_none() && self.fiscal_quarter.is_none()
    }

    /// Human label: "FY2023 Q2", "FY2023", or "latest".
    pub fn label(&self) -> String {
        match (self.fiscal_year, self.fiscal_quarter) {
            (Some(y), Some(q)) => format!("FY{y} Q{q}"),
            (Some(y), None) => format!("FY{y}"),
            (None, Some(q)) => format!("Q{q}"),
            (None, None) => "latest".to_string(),
        }
    }
}

// ── Intent ────────────────────────────────────────────────────

/// Closed vocabulary of question intents. Each maps to exactly one SQL
/// template (given the period detail); the vocabulary never grows at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Single-entity quarterly snapshot.
    QuarterMetrics,
    /// Single-entity annual metrics.
    AnnualMetrics,
    /// Two-entity side-by-side comparison.
    CompareEntities,
    /// Two-entity comparison joined with macro indicators.
    CompareWithMacro,
    /// Macro indicators only, no company.
    MacroOnly,
    /// Stock price series; single-entity template, fans out per entity.
    StockPrice,
    /// Sector peer ranking.
    PeerRanking,
    /// Growth / CAGR summary.
    Growth,
    /// Composite view, depth 1: fundamentals + profile.
    CompleteSnapshot,
    /// Composite view, depth 2: adds macro overlay.
    CompleteWithMacro,
    /// Composite view, depth 3: adds TTM and rate-sensitivity columns.
    CompleteWithSensitivity,
}

impl Intent {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::QuarterMetrics => "quarter_metrics",
            Self::AnnualMetrics => "annual_metrics",
            Self::CompareEntities => "compare_entities",
            Self::CompareWithMacro => "compare_with_macro",
            Self::MacroOnly => "macro_only",
            Self::StockPrice => "stock_price",
            Self::PeerRanking => "peer_ranking",
            Self::Growth => "growth",
            Self::CompleteSnapshot => "complete_snapshot",
            Self::CompleteWithMacro => "complete_with_macro",
            Self::CompleteWithSensitivity => "complete_with_sensitivity",
        }
    }

    /// Parse a tag produced by `tag()` (also the LLM contract's intent
    /// vocabulary). Unknown tags are `None`, never a panic.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "quarter_metrics" => Self::QuarterMetrics,
            "annual_metrics" => Self::AnnualMetrics,
            "compare_entities" => Self::CompareEntities,
            "compare_with_macro" => Self::CompareWithMacro,
            "macro_only" => Self::MacroOnly,
            "stock_price" => Self::StockPrice,
            "peer_ranking" => Self::PeerRanking,
            "growth" => Self::Growth,
            "complete_snapshot" => Self::CompleteSnapshot,
            "complete_with_macro" => Self::CompleteWithMacro,
            "complete_with_sensitivity" => Self::CompleteWithSensitivity,
            _ => return None,
        })
    }

    pub fn is_stock_price(&self) -> bool {
        matches!(self, Self::StockPrice)
    }

    pub fn is_multi_entity(&self) -> bool {
        matches!(self, Self::CompareEntities | Self::CompareWithMacro)
    }

    /// The multi-entity variant this intent is rewritten to when more
    /// than one distinct canonical entity survives resolution. `None`
    /// means no rewrite: either the intent is already multi-entity, is
    /// entity-free, or is a stock-price intent (which fans out at
    /// execution instead, because its template is single-entity only).
    pub fn multi_entity_variant(&self) -> Option<Intent> {
        match self {
            Self::QuarterMetrics
            | Self::AnnualMetrics
            | Self::Growth
            | Self::CompleteSnapshot => Some(Self::CompareEntities),
            Self::CompleteWithMacro | Self::CompleteWithSensitivity => {
                Some(Self::CompareWithMacro)
            }
            Self::CompareEntities
            | Self::CompareWithMacro
            | Self::MacroOnly
            | Self::StockPrice
            | Self::PeerRanking => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

// ── Task ──────────────────────────────────────────────────────

/// One decomposed unit of work from a user turn. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub intent: Intent,
    /// Raw entity strings in the order they appeared in the question.
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub period: Period,
    /// Requested metric codes, in catalog order.
    #[serde(default)]
    pub measures: Vec<String>,
}

impl Task {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            entities: Vec::new(),
            period: Period::default(),
            measures: Vec::new(),
        }
    }
}

// ── Plan and expansion ────────────────────────────────────────

/// A parameter value bound into a statement. The vocabulary of bindable
/// names is closed (see [`crate::templates::ALLOWED_PARAMS`]); values
/// are only ever text or integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Int(i64),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

pub type ParamMap = BTreeMap<String, ParamValue>;

/// The router's output for one task: a template choice plus strictly
/// bound parameters. Consumed once, via [`Plan::expand`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub intent: Intent,
    pub template: Template,
    pub params: ParamMap,
    /// Distinct canonical entity ids in resolution order. Drives
    /// stock-price fan-out and citation enrichment.
    pub entities: Vec<String>,
    pub period: Period,
}

/// One concrete, fully-bound statement produced by plan expansion.
/// Validation and execution only ever see these, never a raw `Plan`.
#[derive(Debug, Clone, Serialize)]
pub struct BoundStatement {
    pub sql: String,
    pub params: ParamMap,
    /// The single entity this statement is scoped to, when there is one.
    pub entity_id: Option<String>,
    pub period: Period,
    pub surfaces: Vec<&'static str>,
}

impl Plan {
    /// Expand into the ordered sequence of concrete statements.
    ///
    /// Stock-price plans produce one statement per resolved entity, the
    /// entity binding rewritten per clone; the underlying template is
    /// written for exactly one entity, so multi-entity comparison is
    /// repetition, not a query-level UNION. Every other plan expands to
    /// exactly one statement. A stock-price plan with no resolved
    /// entities expands to nothing and is reported as "no data".
    pub fn expand(&self) -> Vec<BoundStatement> {
        let surfaces = self.template.surfaces().to_vec();
        if self.intent.is_stock_price() {
            return self
                .entities
                .iter()
                .map(|entity| {
                    let mut params = self.params.clone();
                    params.insert("entity_id".to_string(), ParamValue::Text(entity.clone()));
                    BoundStatement {
                        sql: self.template.sql().to_string(),
                        params,
                        entity_id: Some(entity.clone()),
                        period: self.period,
                        surfaces: surfaces.clone(),
                    }
                })
                .collect();
        }

        vec![BoundStatement {
            sql: self.template.sql().to_string(),
            params: self.params.clone(),
            entity_id: if self.entities.len() == 1 {
                self.entities.first().cloned()
            } else {
                None
            },
            period: self.period,
            surfaces,
        }]
    }
}

// ── Validation verdict ────────────────────────────────────────

/// Outcome of the allow-list validator. Pure data; the reason string is
/// human-readable and safe to surface in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub ok: bool,
    pub reason: String,
}

impl ValidationVerdict {
    pub fn pass() -> Self {
        Self {
            ok: true,
            reason: String::new(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
        }
    }
}

// ── Result rows ───────────────────────────────────────────────

/// One uniform-shaped result row: ordered column → scalar pairs.
/// Columns keep their SELECT-projection order so formatting is
/// deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, serde_json::Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.columns.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Numeric view of a column; JSON null and non-numeric values read
    /// as absent.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_f64())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_i64())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, serde_json::Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, serde_json::Value)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

// ── Citations ─────────────────────────────────────────────────

/// Provenance metadata for one (entity, period) slice of a result set.
/// Empty is a valid state, not an error: macro-only and peer-ranking
/// result sets have no single entity/period to cite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub version: String,
    pub as_of: Option<DateTime<Utc>>,
}

impl Citation {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.version.is_empty()
    }
}

/// Citation map key. Ordered so the map iterates deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CitationKey {
    pub entity_id: String,
    pub period: Period,
}

/// Ordered rows plus their citation map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub rows: Vec<Row>,
    pub citations: BTreeMap<CitationKey, Citation>,
}

impl ResultSet {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            citations: BTreeMap::new(),
        }
    }
}

// ── Execution trace ───────────────────────────────────────────

/// Echo of one executed statement, kept for diagnostics: the exact SQL
/// text and the parameters it was bound with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementTrace {
    pub sql: String,
    pub params: ParamMap,
}

// ── Session context ───────────────────────────────────────────

/// Per-session carry-over state. Last-write-wins per field; lives for
/// the process lifetime unless explicitly deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub last_entities: Vec<String>,
    pub last_period: Period,
    pub visited_surfaces: BTreeSet<String>,
    pub query_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            last_entities: Vec::new(),
            last_period: Period::default(),
            visited_surfaces: BTreeSet::new(),
            query_count: 0,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_labels() {
        assert_eq!(Period::quarter(2023, 2).label(), "FY2023 Q2");
        assert_eq!(Period::year(2023).label(), "FY2023");
        assert_eq!(Period::default().label(), "latest");
    }

    #[test]
    fn intent_tag_round_trip() {
        for intent in [
            Intent::QuarterMetrics,
            Intent::AnnualMetrics,
            Intent::CompareEntities,
            Intent::CompareWithMacro,
            Intent::MacroOnly,
            Intent::StockPrice,
            Intent::PeerRanking,
            Intent::Growth,
            Intent::CompleteSnapshot,
            Intent::CompleteWithMacro,
            Intent::CompleteWithSensitivity,
        ] {
            assert_eq!(Intent::parse_tag(intent.tag()), Some(intent));
        }
        assert_eq!(Intent::parse_tag("select_star"), None);
    }

    #[test]
    fn multi_entity_rewrite_targets() {
        assert_eq!(
            Intent::AnnualMetrics.multi_entity_variant(),
            Some(Intent::CompareEntities)
        );
        assert_eq!(
            Intent::CompleteWithMacro.multi_entity_variant(),
            Some(Intent::CompareWithMacro)
        );
        // Stock price is the explicit exception: fan-out, not rewrite.
        assert_eq!(Intent::StockPrice.multi_entity_variant(), None);
        assert_eq!(Intent::CompareEntities.multi_entity_variant(), None);
        assert_eq!(Intent::MacroOnly.multi_entity_variant(), None);
    }

    #[test]
    fn stock_price_plan_expands_per_entity_in_order() {
        let mut params = ParamMap::new();
        params.insert("limit".into(), ParamValue::Int(30));
        let plan = Plan {
            intent: Intent::StockPrice,
            template: Template::StockPriceSeries,
            params,
            entities: vec!["AAPL".into(), "GOOGL".into()],
            period: Period::default(),
        };
        let statements = plan.expand();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].entity_id.as_deref(), Some("AAPL"));
        assert_eq!(statements[1].entity_id.as_deref(), Some("GOOGL"));
        assert_eq!(
            statements[0].params.get("entity_id"),
            Some(&ParamValue::Text("AAPL".into()))
        );
        assert_eq!(
            statements[1].params.get("entity_id"),
            Some(&ParamValue::Text("GOOGL".into()))
        );
        // Everything else carries over unchanged.
        assert_eq!(statements[0].sql, statements[1].sql);
    }

    #[test]
    fn stock_price_plan_with_no_entities_expands_to_nothing() {
        let plan = Plan {
            intent: Intent::StockPrice,
            template: Template::StockPriceSeries,
            params: ParamMap::new(),
            entities: vec![],
            period: Period::default(),
        };
        assert!(plan.expand().is_empty());
    }

    #[test]
    fn single_entity_plan_expands_once() {
        let mut params = ParamMap::new();
        params.insert("entity_id".into(), ParamValue::Text("AAPL".into()));
        params.insert("fiscal_year".into(), ParamValue::Int(2023));
        params.insert("limit".into(), ParamValue::Int(8));
        let plan = Plan {
            intent: Intent::AnnualMetrics,
            template: Template::AnnualMetrics,
            params,
            entities: vec!["AAPL".into()],
            period: Period::year(2023),
        };
        let statements = plan.expand();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].entity_id.as_deref(), Some("AAPL"));
        assert_eq!(statements[0].period, Period::year(2023));
    }

    #[test]
    fn row_lookup_and_null_handling() {
        let mut row = Row::new();
        row.push("revenue", serde_json::json!(94.8));
        row.push("net_income", serde_json::Value::Null);
        assert_eq!(row.number("revenue"), Some(94.8));
        assert_eq!(row.number("net_income"), None);
        assert!(row.has_column("net_income"));
        assert!(!row.has_column("eps"));
    }

    #[test]
    fn citation_empty_is_not_an_error() {
        assert!(Citation::empty().is_empty());
        let c = Citation {
            source: "10-Q".into(),
            version: "2023-Q2".into(),
            as_of: None,
        };
        assert!(!c.is_empty());
    }
}
