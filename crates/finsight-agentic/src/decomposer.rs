//! Query decomposer.
//!
//! Classifier-first with a guaranteed rule-based fallback: when an LLM
//! classifier is configured it is consulted first, and anything wrong
//! with its output — transport failure, malformed JSON, out-of-range
//! fields — silently substitutes the deterministic rule decomposition
//! and records a note in `checks`. Decomposition never raises to the
//! caller.

use std::sync::Arc;

use tracing::{debug, warn};

use finsight_core::alias_cache::AliasSnapshot;

use crate::classifier::{rule_decomposition, Decomposition, IntentClassifier, SessionHints};

pub struct Decomposer {
    primary: Option<Arc<dyn IntentClassifier>>,
}

impl Decomposer {
    /// Rule-based decomposition only.
    pub fn rule_only() -> Self {
        Self { primary: None }
    }

    /// Consult `classifier` first, falling back to rules.
    pub fn with_primary(classifier: Arc<dyn IntentClassifier>) -> Self {
        Self {
            primary: Some(classifier),
        }
    }

    pub async fn decompose(
        &self,
        text: &str,
        snapshot: &AliasSnapshot,
        hints: &SessionHints,
    ) -> Decomposition {
        let mut fallback_notes = Vec::new();

        if let Some(primary) = &self.primary {
            match primary.classify(text, snapshot, hints).await {
                Ok(decomposition) if !decomposition.tasks.is_empty() => {
                    debug!(classifier = primary.name(), tasks = decomposition.tasks.len(),
                        "primary classifier produced decomposition");
                    return decomposition;
                }
                Ok(_) => {
                    fallback_notes.push(format!(
                        "{} classifier returned no tasks; using rule fallback",
                        primary.name()
                    ));
                }
                Err(e) => {
                    warn!(classifier = primary.name(), error = %e, "classifier failed");
                    fallback_notes.push(format!(
                        "{} classifier unavailable ({e}); using rule fallback",
                        primary.name()
                    ));
                }
            }
        }

        let mut decomposition = rule_decomposition(text, snapshot, hints);
        decomposition.checks.extend(fallback_notes);
        decomposition
    }
}
