//! Orchestrator.
//!
//! One fixed linear pass per user turn: Decompose → Resolve/Plan →
//! Execute → Enrich → Format → Memory-update. No branching, no
//! retries. Each stage receives the accumulated state and a stage
//! failure is appended to the turn's error list rather than
//! short-circuiting, so partial answers are always produced for
//! whichever tasks succeeded.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use finsight_agentic::classifier::SessionHints;
use finsight_agentic::{formatter, planner, resolver, Decomposer, FormatContext};
use finsight_core::alias_cache::AliasCache;
use finsight_core::error::{FinsightError, Stage, TurnError};
use finsight_core::ports::{AliasStore, CitationSource, StatementExecutor};
use finsight_core::types::{CitationKey, Period, ResultSet, StatementTrace};

use crate::engine::ExecutionEngine;
use crate::session::SessionStore;

/// Everything one turn produced: the best-effort answer plus the
/// diagnostics the surrounding service may want to expose.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    pub answer: String,
    /// Non-fatal notes: fallbacks taken, suggestions, rewrites.
    pub checks: Vec<String>,
    /// Accumulated stage errors; never thrown past this struct.
    pub errors: Vec<TurnError>,
    /// Executed SQL texts with their bound parameters.
    pub traces: Vec<StatementTrace>,
}

pub struct Analyst {
    cache: Arc<AliasCache>,
    alias_store: Arc<dyn AliasStore>,
    decomposer: Decomposer,
    engine: ExecutionEngine,
    citations: Arc<dyn CitationSource>,
    sessions: SessionStore,
}

impl Analyst {
    pub fn new(
        alias_store: Arc<dyn AliasStore>,
        executor: Arc<dyn StatementExecutor>,
        citations: Arc<dyn CitationSource>,
        decomposer: Decomposer,
        statement_timeout: Duration,
    ) -> Self {
        Self {
            cache: Arc::new(AliasCache::new()),
            alias_store,
            decomposer,
            engine: ExecutionEngine::new(executor, statement_timeout),
            citations,
            sessions: SessionStore::new(),
        }
    }

    /// The session API consumed by the surrounding service.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Drop the alias cache; the next turn reloads reference data.
    pub fn invalidate_reference_cache(&self) {
        self.cache.invalidate();
    }

    /// Answer one user turn. Never returns an error: every failure
    /// inside the pipeline degrades to diagnostics on the outcome.
    pub async fn answer(&self, session_id: &str, question: &str) -> TurnOutcome {
        let mut outcome = TurnOutcome::default();

        // The alias cache is the one dependency nothing downstream can
        // do without.
        let snapshot = match self.cache.ensure_loaded(self.alias_store.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                outcome
                    .errors
                    .push(TurnError::new(Stage::Resolve, None, e.to_string()));
                outcome.answer =
                    "Reference data is unavailable right now; please try again.".to_string();
                return outcome;
            }
        };

        // ── Decompose ─────────────────────────────────────────────
        let hints = match self.sessions.get(session_id).await {
            Some(ctx) => SessionHints {
                last_entities: ctx.last_entities,
                last_period: ctx.last_period,
            },
            None => SessionHints::default(),
        };
        let decomposition = self.decomposer.decompose(question, &snapshot, &hints).await;
        outcome.checks.extend(decomposition.checks.clone());
        debug!(tasks = decomposition.tasks.len(), "decomposed turn");

        let mut sections: Vec<String> = Vec::new();
        let mut turn_entities: Vec<String> = Vec::new();
        let mut turn_period = Period::default();
        let mut turn_surfaces: Vec<String> = Vec::new();

        for (task_index, task) in decomposition.tasks.iter().enumerate() {
            // ── Resolve ───────────────────────────────────────────
            let resolved = resolver::resolve(&snapshot, &task.entities);
            for raw in resolved.unresolved() {
                outcome.errors.push(TurnError::new(
                    Stage::Resolve,
                    Some(task_index),
                    format!("unknown entity `{raw}`"),
                ));
                if let Some(suggestion) = resolver::suggest(&snapshot, raw) {
                    outcome
                        .checks
                        .push(format!("`{raw}` not recognized — did you mean {suggestion}?"));
                }
            }

            // ── Plan ──────────────────────────────────────────────
            let planned = planner::plan(task, &resolved.canonical, &snapshot);
            outcome.checks.extend(planned.notes);
            let plan = planned.plan;

            // ── Execute ───────────────────────────────────────────
            let execution = self.engine.execute(&plan).await;
            outcome.traces.extend(execution.traces);
            for error in execution.statement_errors {
                let stage = match &error {
                    FinsightError::Rejected(_) => Stage::Validate,
                    _ => Stage::Execute,
                };
                outcome
                    .errors
                    .push(TurnError::new(stage, Some(task_index), error.to_string()));
            }

            // ── Enrich ────────────────────────────────────────────
            let mut result = ResultSet::from_rows(execution.rows);
            for entity in &plan.entities {
                match self
                    .citations
                    .lookup(entity, plan.period.fiscal_year, plan.period.fiscal_quarter)
                    .await
                {
                    Ok(citation) if !citation.is_empty() => {
                        result.citations.insert(
                            CitationKey {
                                entity_id: entity.clone(),
                                period: plan.period,
                            },
                            citation,
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        outcome.errors.push(TurnError::new(
                            Stage::Enrich,
                            Some(task_index),
                            e.to_string(),
                        ));
                    }
                }
            }

            // ── Format ────────────────────────────────────────────
            let text = formatter::format(
                &result,
                &FormatContext {
                    question,
                    intent: plan.intent,
                    entities: &plan.entities,
                },
            );
            sections.push(text);

            for entity in &plan.entities {
                if !turn_entities.contains(entity) {
                    turn_entities.push(entity.clone());
                }
            }
            if !plan.period.is_empty() {
                turn_period = plan.period;
            }
            turn_surfaces.extend(plan.template.surfaces().iter().map(|s| s.to_string()));
        }

        // ── Assemble the best-effort answer ───────────────────────
        let mut answer = String::new();
        if let Some(greeting) = &decomposition.greeting {
            answer.push_str(greeting);
            answer.push(' ');
        }
        if sections.is_empty() {
            answer.push_str("I could not produce an answer for that question.");
        } else {
            answer.push_str(&sections.join("\n\n"));
        }
        if !outcome.errors.is_empty() {
            let notes: Vec<String> = outcome.errors.iter().map(|e| e.to_string()).collect();
            answer.push_str(&format!("\n(Notes: {})", notes.join("; ")));
        }
        outcome.answer = answer;

        // ── Memory update ─────────────────────────────────────────
        self.sessions
            .update(session_id, &turn_entities, turn_period, &turn_surfaces)
            .await;

        info!(
            session = session_id,
            tasks = decomposition.tasks.len(),
            errors = outcome.errors.len(),
            "turn complete"
        );
        outcome
    }
}
