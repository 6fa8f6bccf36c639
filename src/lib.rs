//! finsight — free-text financial Q&A over a read-only datastore.
//!
//! The pipeline in one line: text → decompose → resolve/plan →
//! validate → execute → enrich → format → remember. See the workspace
//! crates for the pieces: `finsight-core` (types, templates, the SQL
//! allow-list validator, metric catalog, ports), `finsight-agentic`
//! (decomposition, LLM fallback, resolution, planning, formatting),
//! `finsight-postgres` (sqlx adapters).

pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod session;

pub use config::Config;
pub use engine::{ExecutionEngine, TaskExecution};
pub use orchestrator::{Analyst, TurnOutcome};
pub use session::SessionStore;
