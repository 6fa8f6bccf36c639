//! Intent classification capability.
//!
//! The orchestrator only ever depends on [`IntentClassifier`]. The
//! rule-based implementation is guaranteed available and infallible;
//! an LLM-backed implementation is an optional accuracy upgrade whose
//! failures are silently absorbed by the decomposer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use finsight_core::alias_cache::AliasSnapshot;
use finsight_core::error::{FinsightError, Result};
use finsight_core::metrics;
use finsight_core::types::{Intent, Period, Task};

use crate::llm_client::{extract_json, LlmClient};
use crate::rules;

/// Structured decomposition of one user turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decomposition {
    #[serde(default)]
    pub greeting: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Non-fatal notes: fallback substitutions, dropped entities,
    /// anything a caller may want to surface as diagnostics.
    #[serde(default)]
    pub checks: Vec<String>,
}

/// Carry-over hints from session memory, for follow-up questions that
/// name no entity or period of their own.
#[derive(Debug, Clone, Default)]
pub struct SessionHints {
    pub last_entities: Vec<String>,
    pub last_period: Period,
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        snapshot: &AliasSnapshot,
        hints: &SessionHints,
    ) -> Result<Decomposition>;

    fn name(&self) -> &'static str;
}

// ── Rule-based classifier ─────────────────────────────────────

const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "good morning", "good afternoon"];

/// Deterministic decomposition via the rule table. Never fails; always
/// produces exactly one best-effort task.
pub fn rule_decomposition(
    text: &str,
    snapshot: &AliasSnapshot,
    hints: &SessionHints,
) -> Decomposition {
    let cues = rules::extract_cues(text, snapshot);

    // Session carry-over: a follow-up that names no entity inherits
    // the previous turn's, and a bare quarter inherits the year.
    let mut entities = cues.entities.clone();
    let mut inherited = Vec::new();
    if entities.is_empty() && !hints.last_entities.is_empty() {
        entities = hints.last_entities.clone();
        inherited.push("entities inherited from session".to_string());
    }
    let period = if cues.period.is_empty() && !hints.last_period.is_empty() {
        inherited.push("period inherited from session".to_string());
        hints.last_period
    } else if cues.period.fiscal_year.is_none() && cues.period.fiscal_quarter.is_some() {
        Period {
            fiscal_year: hints.last_period.fiscal_year,
            fiscal_quarter: cues.period.fiscal_quarter,
        }
    } else {
        cues.period
    };

    // Re-derive the entity count cue over the effective entity list so
    // carried-over entities participate in the multi-entity rules.
    let mut canonical: Vec<String> = entities
        .iter()
        .filter_map(|raw| snapshot.resolve(raw))
        .collect();
    canonical.sort_unstable();
    canonical.dedup();
    let effective = rules::Cues {
        entities: entities.clone(),
        entity_count: canonical.len(),
        period,
        ..cues
    };

    let intent = rules::classify(&effective);
    let measures = metrics::requested_metrics(text)
        .iter()
        .map(|d| d.code.to_string())
        .collect();

    let lowered = text.trim().to_lowercase();
    let greeting = GREETING_WORDS
        .iter()
        .find(|g| lowered.starts_with(*g))
        .map(|_| "Hello!".to_string());

    Decomposition {
        greeting,
        tasks: vec![Task {
            intent,
            entities,
            period,
            measures,
        }],
        checks: inherited,
    }
}

/// The guaranteed-available classifier: a thin trait wrapper over
/// [`rule_decomposition`].
pub struct RuleClassifier;

#[async_trait]
impl IntentClassifier for RuleClassifier {
    async fn classify(
        &self,
        text: &str,
        snapshot: &AliasSnapshot,
        hints: &SessionHints,
    ) -> Result<Decomposition> {
        Ok(rule_decomposition(text, snapshot, hints))
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

// ── LLM-backed classifier ─────────────────────────────────────

/// Classifier backed by an LLM in JSON output mode. Anything malformed
/// — bad JSON, unknown intent tag, out-of-range quarter — is an error
/// here and a silent fallback in the decomposer.
pub struct LlmClassifier {
    client: Arc<dyn LlmClient>,
}

impl LlmClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn system_prompt(snapshot: &AliasSnapshot) -> String {
        let intents = [
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
        ]
        .iter()
        .map(|i| format!("  - {}", i.tag()))
        .collect::<Vec<_>>()
        .join("\n");

        let measures = metrics::CATALOG
            .iter()
            .map(|d| format!("  - {}", d.code))
            .collect::<Vec<_>>()
            .join("\n");

        let mut aliases: Vec<&str> = snapshot
            .aliases()
            .iter()
            .map(|(a, _)| a.as_str())
            .collect();
        aliases.sort_unstable();

        format!(
            r#"You decompose analytical questions about a fixed set of listed companies.

Output a single JSON object, no markdown:
{{
  "greeting": null,
  "tasks": [
    {{
      "intent": "<one of the intent tags>",
      "entities": ["<entity strings exactly as the user wrote them>"],
      "period": {{"fiscal_year": 2023, "fiscal_quarter": 2}},
      "measures": ["<metric codes>"]
    }}
  ],
  "checks": []
}}

INTENT TAGS:
{intents}

METRIC CODES:
{measures}

KNOWN COMPANIES (aliases): {aliases}

RULES:
1. Only use intent tags and metric codes from the lists above.
2. fiscal_year and fiscal_quarter are null when the question does not name them; fiscal_quarter is 1-4.
3. One task per analytical request; multiple requests in one question become multiple tasks, in question order.
4. Output valid JSON only."#,
            intents = intents,
            measures = measures,
            aliases = aliases.join(", "),
        )
    }

    fn vet(d: &Decomposition) -> std::result::Result<(), String> {
        if d.tasks.is_empty() {
            return Err("no tasks".to_string());
        }
        for task in &d.tasks {
            if let Some(q) = task.period.fiscal_quarter {
                if !(1..=4).contains(&q) {
                    return Err(format!("fiscal_quarter {q} out of range"));
                }
            }
            if let Some(y) = task.period.fiscal_year {
                if !(1900..=2100).contains(&y) {
                    return Err(format!("fiscal_year {y} out of range"));
                }
            }
            for code in &task.measures {
                if metrics::lookup(code).is_none() {
                    return Err(format!("unknown measure `{code}`"));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(
        &self,
        text: &str,
        snapshot: &AliasSnapshot,
        hints: &SessionHints,
    ) -> Result<Decomposition> {
        let system = Self::system_prompt(snapshot);
        let user = if hints.last_entities.is_empty() {
            format!("Question: {text}")
        } else {
            format!(
                "Question: {text}\n(Previous turn discussed: {})",
                hints.last_entities.join(", ")
            )
        };

        let response = self
            .client
            .chat_json(&system, &user)
            .await
            .map_err(|e| FinsightError::Classifier(e.to_string()))?;

        let decomposition: Decomposition = serde_json::from_str(extract_json(&response))
            .map_err(|e| FinsightError::Classifier(format!("malformed response: {e}")))?;

        Self::vet(&decomposition).map_err(FinsightError::Classifier)?;
        Ok(decomposition)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::alias_cache::AliasCache;
    use finsight_core::seeds;

    fn snapshot() -> Arc<AliasSnapshot> {
        AliasCache::new().install(seeds::reference_data())
    }

    #[test]
    fn rule_decomposition_spec_example() {
        let snap = snapshot();
        let d = rule_decomposition(
            "show Apple revenue and net income for 2023",
            &snap,
            &SessionHints::default(),
        );
        assert_eq!(d.tasks.len(), 1);
        let task = &d.tasks[0];
        assert_eq!(task.intent, Intent::AnnualMetrics);
        assert_eq!(task.entities, vec!["Apple".to_string()]);
        assert_eq!(task.period, Period::year(2023));
        assert_eq!(task.measures, vec!["net_income", "revenue"]);
    }

    #[test]
    fn follow_up_inherits_entities_and_period() {
        let snap = snapshot();
        let hints = SessionHints {
            last_entities: vec!["Apple".to_string()],
            last_period: Period::quarter(2023, 2),
        };
        let d = rule_decomposition("and net income?", &snap, &hints);
        let task = &d.tasks[0];
        assert_eq!(task.entities, vec!["Apple".to_string()]);
        assert_eq!(task.period, Period::quarter(2023, 2));
        assert!(d.checks.iter().any(|c| c.contains("inherited")));
    }

    #[test]
    fn bare_quarter_inherits_only_the_year() {
        let snap = snapshot();
        let hints = SessionHints {
            last_entities: vec!["Apple".to_string()],
            last_period: Period::year(2023),
        };
        let d = rule_decomposition("what about Q3?", &snap, &hints);
        assert_eq!(d.tasks[0].period, Period::quarter(2023, 3));
    }

    #[test]
    fn carried_entities_participate_in_multi_entity_rules() {
        let snap = snapshot();
        let hints = SessionHints {
            last_entities: vec!["Apple".to_string(), "Microsoft".to_string()],
            last_period: Period::default(),
        };
        let d = rule_decomposition("compare their revenue for 2023", &snap, &hints);
        assert_eq!(d.tasks[0].intent, Intent::CompareEntities);
    }

    #[test]
    fn greeting_detected() {
        let snap = snapshot();
        let d = rule_decomposition(
            "hello, show Apple revenue for 2023",
            &snap,
            &SessionHints::default(),
        );
        assert!(d.greeting.is_some());
    }

    #[tokio::test]
    async fn rule_classifier_never_fails() {
        let snap = snapshot();
        let r = RuleClassifier
            .classify("", &snap, &SessionHints::default())
            .await;
        assert!(r.is_ok());
        assert_eq!(r.unwrap().tasks.len(), 1);
    }

    #[test]
    fn vet_rejects_out_of_range_quarter() {
        let d = Decomposition {
            greeting: None,
            tasks: vec![Task {
                intent: Intent::QuarterMetrics,
                entities: vec!["Apple".into()],
                period: Period {
                    fiscal_year: Some(2023),
                    fiscal_quarter: Some(7),
                },
                measures: vec![],
            }],
            checks: vec![],
        };
        assert!(LlmClassifier::vet(&d).is_err());
    }

    #[test]
    fn vet_rejects_unknown_measure() {
        let d = Decomposition {
            greeting: None,
            tasks: vec![Task {
                intent: Intent::AnnualMetrics,
                entities: vec!["Apple".into()],
                period: Period::year(2023),
                measures: vec!["ebitda_wizardry".into()],
            }],
            checks: vec![],
        };
        assert!(LlmClassifier::vet(&d).is_err());
    }

    #[test]
    fn llm_contract_round_trips_serde() {
        let json = r#"{
            "greeting": null,
            "tasks": [{
                "intent": "compare_entities",
                "entities": ["Apple", "Google"],
                "period": {"fiscal_year": 2023, "fiscal_quarter": 2},
                "measures": ["revenue"]
            }],
            "checks": []
        }"#;
        let d: Decomposition = serde_json::from_str(json).unwrap();
        assert_eq!(d.tasks[0].intent, Intent::CompareEntities);
        assert_eq!(d.tasks[0].period, Period::quarter(2023, 2));
        assert!(LlmClassifier::vet(&d).is_ok());
    }

    #[test]
    fn unknown_intent_tag_is_a_parse_error() {
        let json = r#"{"tasks": [{"intent": "drop_tables", "entities": [], "period": {}, "measures": []}]}"#;
        assert!(serde_json::from_str::<Decomposition>(json).is_err());
    }
}
