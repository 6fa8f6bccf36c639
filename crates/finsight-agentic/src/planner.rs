//! Task planner / router.
//!
//! Maps an intent to its template and binds parameters strictly from
//! the closed parameter vocabulary. The one rewrite rule lives here:
//! more than one distinct canonical entity forces the matching
//! multi-entity variant — except stock-price intents, which keep their
//! single-entity template and fan out at execution.

use finsight_core::alias_cache::AliasSnapshot;
use finsight_core::templates::Template;
use finsight_core::types::{Intent, ParamMap, ParamValue, Plan, Task};

/// A plan plus the non-fatal notes produced while building it.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub notes: Vec<String>,
}

/// Build the plan for one task. Unresolved entities still produce a
/// plan (empty entity binding) so downstream stages report "no data"
/// rather than aborting the turn.
pub fn plan(
    task: &Task,
    canonical_entities: &[String],
    snapshot: &AliasSnapshot,
) -> PlanOutcome {
    let mut notes = Vec::new();
    let mut intent = task.intent;
    let mut period = task.period;

    // Multi-entity rewrite.
    if canonical_entities.len() > 1 {
        if let Some(variant) = intent.multi_entity_variant() {
            notes.push(format!(
                "intent {} rewritten to {} for {} entities",
                intent,
                variant,
                canonical_entities.len()
            ));
            intent = variant;
        }
    }

    // A quarter template without a quarter has nothing to bind; fall
    // back to the annual shape instead of inventing a quarter.
    if intent == Intent::QuarterMetrics && period.fiscal_quarter.is_none() {
        notes.push("no quarter named; using annual metrics".to_string());
        intent = Intent::AnnualMetrics;
    }

    if canonical_entities.len() > 2 && intent.is_multi_entity() {
        notes.push(format!(
            "comparison is pairwise; only {} and {} are compared",
            canonical_entities[0], canonical_entities[1]
        ));
    }

    let template = Template::for_intent(intent, period);

    // Stock-price plans keep the question's period untouched (the
    // series is date-keyed, not fiscal-period-keyed); everything else
    // defaults a missing year to the datastore's latest.
    if !intent.is_stock_price() && period.fiscal_year.is_none() {
        period.fiscal_year = Some(snapshot.latest_fiscal_year());
    }

    let entity = |idx: usize| -> ParamValue {
        ParamValue::Text(canonical_entities.get(idx).cloned().unwrap_or_default())
    };

    let mut params = ParamMap::new();
    for name in template.params() {
        let value = match *name {
            "entity_id" => entity(0),
            "entity_id_a" => entity(0),
            "entity_id_b" => entity(1),
            "fiscal_year" => ParamValue::Int(i64::from(
                period.fiscal_year.unwrap_or(snapshot.latest_fiscal_year()),
            )),
            // Guarded above: quarter templates are only selected when
            // the period carries a quarter.
            "fiscal_quarter" => {
                ParamValue::Int(i64::from(period.fiscal_quarter.unwrap_or(1)))
            }
            "limit" => ParamValue::Int(template.default_limit()),
            other => {
                // The template vocabulary is closed; an unknown name
                // here is a programming error worth surfacing loudly
                // in diagnostics, not a reason to abort the turn.
                notes.push(format!("template declared unknown parameter `{other}`"));
                continue;
            }
        };
        params.insert((*name).to_string(), value);
    }

    let plan_period = if intent.is_stock_price() {
        task.period
    } else {
        period
    };

    PlanOutcome {
        plan: Plan {
            intent,
            template,
            params,
            entities: canonical_entities.to_vec(),
            period: plan_period,
        },
        notes,
    }
}
