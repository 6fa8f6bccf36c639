//! finsight-agentic — the natural-language side of the pipeline.
//!
//! Decomposition (rule table + optional LLM classifier), entity
//! resolution over the alias cache, template planning/routing, and the
//! deterministic response formatter.

pub mod classifier;
pub mod decomposer;
pub mod formatter;
pub mod llm_client;
pub mod openai_client;
pub mod planner;
pub mod resolver;
pub mod rules;

pub use classifier::{Decomposition, IntentClassifier, LlmClassifier, RuleClassifier, SessionHints};
pub use decomposer::Decomposer;
pub use formatter::FormatContext;
pub use llm_client::LlmClient;
pub use openai_client::OpenAiClient;
pub use planner::PlanOutcome;
pub use resolver::ResolvedEntities;
