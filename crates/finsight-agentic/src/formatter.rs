//! Deterministic response formatter.
//!
//! Pure function of (result rows, original question, intent): no
//! randomness, no I/O, never raises. Shape classification looks only
//! at which columns are present and how many distinct entities appear;
//! metric selection reuses the shared catalog so the question-phrase
//! precedence matches what the decomposer extracted.

use finsight_core::metrics::{self, MetricDef};
use finsight_core::types::{Intent, ResultSet, Row};

/// Context the formatter needs beyond the rows themselves.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    pub question: &'a str,
    pub intent: Intent,
    /// Canonical entity ids in resolution order; drives the line order
    /// of multi-entity output.
    pub entities: &'a [String],
}

/// Result shape, derived purely from the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    SingleEntity,
    MultiEntity,
    MacroOnly,
    Sensitivity,
}

const MACRO_COLUMNS: &[&str] = &[
    "gdp_growth",
    "cpi_yoy",
    "unemployment_rate",
    "fed_funds_rate",
];

fn classify_shape(rows: &[Row]) -> Shape {
    let mut entities: Vec<&str> = rows
        .iter()
        .filter_map(|r| r.text("entity_id"))
        .collect();
    entities.sort_unstable();
    entities.dedup();

    match entities.len() {
        0 => Shape::MacroOnly,
        1 => {
            let has_sensitivity = rows
                .iter()
                .any(|r| r.has_column("beta") || r.has_column("rate_sensitivity"));
            if has_sensitivity {
                Shape::Sensitivity
            } else {
                Shape::SingleEntity
            }
        }
        _ => Shape::MultiEntity,
    }
}

/// The metrics to surface: the question's requested set, or — when the
/// question requests nothing specific or uses show-everything language
/// — every catalog metric with a column in the rows.
fn select_metrics(question: &str, rows: &[Row]) -> Vec<&'static MetricDef> {
    let requested = metrics::requested_metrics(question);
    if !requested.is_empty() && !metrics::wants_all_metrics(question) {
        return requested;
    }
    metrics::CATALOG
        .iter()
        .filter(|def| {
            rows.iter()
                .any(|row| def.columns.iter().any(|c| row.has_column(c)))
        })
        .collect()
}

/// Render one row's view of the selected metrics. Each metric tries
/// its column fallback chain — quarterly, then annual, then trailing-
/// twelve-months — and the first non-null value wins.
fn metric_phrases(row: &Row, selected: &[&'static MetricDef]) -> Vec<String> {
    let mut phrases = Vec::new();
    for def in selected.iter().copied() {
        let hit = def.columns.iter().find_map(|col| row.number(col));
        if let Some(value) = hit {
            phrases.push(metrics::render(def, value));
        }
    }
    phrases
}

/// Label for one row's period: fiscal year/quarter when present, the
/// trade date for price rows, a blank otherwise.
fn row_label(row: &Row) -> String {
    match (row.integer("fiscal_year"), row.integer("fiscal_quarter")) {
        (Some(y), Some(q)) => format!("FY{y} Q{q}"),
        (Some(y), None) => format!("FY{y}"),
        _ => row.text("trade_date").unwrap_or_default().to_string(),
    }
}

fn sources_trailer(result: &ResultSet) -> Option<String> {
    let mut seen = std::collections::BTreeSet::new();
    for citation in result.citations.values() {
        if !citation.is_empty() {
            seen.insert(format!("{} ({})", citation.source, citation.version));
        }
    }
    if seen.is_empty() {
        None
    } else {
        Some(format!(
            "Sources: {}.",
            seen.into_iter().collect::<Vec<_>>().join(", ")
        ))
    }
}

fn no_data_sentence(ctx: &FormatContext) -> String {
    if ctx.entities.is_empty() {
        "No data found for your question.".to_string()
    } else {
        format!("No data found for {}.", ctx.entities.join(", "))
    }
}

/// Format a result set into the final answer text.
pub fn format(result: &ResultSet, ctx: &FormatContext) -> String {
    if result.rows.is_empty() {
        return no_data_sentence(ctx);
    }

    let selected = select_metrics(ctx.question, &result.rows);
    let shape = classify_shape(&result.rows);

    let body = match shape {
        Shape::SingleEntity | Shape::Sensitivity => {
            format_single_entity(&result.rows, &selected, shape)
        }
        Shape::MultiEntity => format_multi_entity(&result.rows, &selected, ctx),
        Shape::MacroOnly => format_macro_only(&result.rows, &selected),
    };

    let body = match body {
        Some(text) => text,
        // Rows exist but none of the requested metrics do: degrade to
        // a generic sentence instead of failing.
        None => "Data found for your question, but none of the requested metrics were present."
            .to_string(),
    };

    match sources_trailer(result) {
        Some(trailer) => format!("{body}\n{trailer}"),
        None => body,
    }
}

fn format_single_entity(
    rows: &[Row],
    selected: &[&'static MetricDef],
    shape: Shape,
) -> Option<String> {
    let entity = rows
        .iter()
        .find_map(|r| r.text("entity_id"))
        .unwrap_or_default()
        .to_string();
    let lead = if shape == Shape::Sensitivity {
        format!("Risk profile for {entity}")
    } else {
        entity.clone()
    };

    if rows.len() == 1 {
        let phrases = metric_phrases(&rows[0], selected);
        if phrases.is_empty() {
            return None;
        }
        let label = row_label(&rows[0]);
        return Some(if label.is_empty() {
            format!("{lead}: {}.", phrases.join(", "))
        } else {
            format!("{lead} {label}: {}.", phrases.join(", "))
        });
    }

    let mut parts = Vec::new();
    for row in rows {
        let phrases = metric_phrases(row, selected);
        if phrases.is_empty() {
            continue;
        }
        let label = row_label(row);
        if label.is_empty() {
            parts.push(phrases.join(", "));
        } else {
            parts.push(format!("{label} — {}", phrases.join(", ")));
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!(
        "Found {} periods for {}: {}.",
        parts.len(),
        lead,
        parts.join("; ")
    ))
}

fn format_multi_entity(
    rows: &[Row],
    selected: &[&'static MetricDef],
    ctx: &FormatContext,
) -> Option<String> {
    // One line per entity, in resolution order; entities present in
    // the rows but absent from the context (shouldn't happen) come
    // after, in row order.
    let mut order: Vec<String> = ctx.entities.to_vec();
    for row in rows {
        if let Some(id) = row.text("entity_id") {
            if !order.iter().any(|e| e == id) {
                order.push(id.to_string());
            }
        }
    }

    let mut lines = Vec::new();
    for entity in &order {
        let entity_rows: Vec<&Row> = rows
            .iter()
            .filter(|r| r.text("entity_id") == Some(entity.as_str()))
            .collect();
        if entity_rows.is_empty() {
            continue;
        }
        let mut parts = Vec::new();
        for row in &entity_rows {
            let phrases = metric_phrases(row, selected);
            if phrases.is_empty() {
                continue;
            }
            if entity_rows.len() == 1 {
                parts.push(phrases.join(", "));
            } else {
                let label = row_label(row);
                parts.push(format!("{label} — {}", phrases.join(", ")));
            }
        }
        if !parts.is_empty() {
            lines.push(format!("{entity}: {}.", parts.join("; ")));
        }
    }
    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}

fn format_macro_only(rows: &[Row], selected: &[&'static MetricDef]) -> Option<String> {
    // Keep only macro metrics for the lead sentence; a macro-only
    // shape with no macro columns degrades.
    let macro_selected: Vec<&'static MetricDef> = selected
        .iter()
        .filter(|def| def.columns.iter().any(|c| MACRO_COLUMNS.contains(c)))
        .copied()
        .collect();
    let selected = if macro_selected.is_empty() {
        selected.to_vec()
    } else {
        macro_selected
    };

    let year = rows.iter().find_map(|r| r.integer("fiscal_year"));
    let mut parts = Vec::new();
    for row in rows {
        let phrases = metric_phrases(row, &selected);
        if phrases.is_empty() {
            continue;
        }
        match row.integer("fiscal_quarter") {
            Some(q) => parts.push(format!("Q{q} — {}", phrases.join(", "))),
            None => parts.push(phrases.join(", ")),
        }
    }
    if parts.is_empty() {
        return None;
    }
    let lead = match year {
        Some(y) => format!("Macro indicators FY{y}"),
        None => "Macro indicators".to_string(),
    };
    Some(format!("{lead}: {}.", parts.join("; ")))
}
