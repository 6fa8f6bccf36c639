use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinsightError {
    #[error("validation rejected: {0}")]
    Rejected(String),

    #[error("statement timed out after {0} ms")]
    Timeout(u64),

    #[error("datastore: {0}")]
    Datastore(String),

    #[error("unbound parameter :{0}")]
    UnboundParam(String),

    #[error("classifier: {0}")]
    Classifier(String),

    #[error("alias cache not loaded")]
    CacheNotLoaded,

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FinsightError>;

impl FinsightError {
    /// Whether the error should abort the whole turn. Everything this
    /// pipeline produces is best-effort; only a missing cache is fatal,
    /// because no stage downstream of resolution can run without it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CacheNotLoaded)
    }
}

/// Pipeline stage names, used to label accumulated per-turn errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decompose,
    Resolve,
    Plan,
    Validate,
    Execute,
    Enrich,
    Format,
    Memory,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Decompose => "decompose",
            Self::Resolve => "resolve",
            Self::Plan => "plan",
            Self::Validate => "validate",
            Self::Execute => "execute",
            Self::Enrich => "enrich",
            Self::Format => "format",
            Self::Memory => "memory",
        };
        write!(f, "{name}")
    }
}

/// A non-fatal error accumulated during one turn. Never thrown past the
/// orchestrator; rendered as a diagnostics trailer instead.
#[derive(Debug, Clone, Serialize)]
pub struct TurnError {
    pub stage: Stage,
    /// Index of the task the error belongs to, if stage-local to one task.
    pub task_index: Option<usize>,
    pub message: String,
}

impl TurnError {
    pub fn new(stage: Stage, task_index: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            stage,
            task_index,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TurnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.task_index {
            Some(i) => write!(f, "[{} task {}] {}", self.stage, i, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_rejected() {
        let e = FinsightError::Rejected("LIMIT exceeds ceiling".into());
        assert_eq!(e.to_string(), "validation rejected: LIMIT exceeds ceiling");
    }

    #[test]
    fn display_timeout() {
        assert_eq!(
            FinsightError::Timeout(5000).to_string(),
            "statement timed out after 5000 ms"
        );
    }

    #[test]
    fn display_unbound_param() {
        assert_eq!(
            FinsightError::UnboundParam("entity_id".into()).to_string(),
            "unbound parameter :entity_id"
        );
    }

    #[test]
    fn only_cache_miss_is_fatal() {
        assert!(FinsightError::CacheNotLoaded.is_fatal());
        assert!(!FinsightError::Timeout(5000).is_fatal());
        assert!(!FinsightError::Rejected("x".into()).is_fatal());
        assert!(!FinsightError::Datastore("down".into()).is_fatal());
    }

    #[test]
    fn turn_error_display_with_task() {
        let e = TurnError::new(Stage::Execute, Some(1), "timed out");
        assert_eq!(e.to_string(), "[execute task 1] timed out");
    }

    #[test]
    fn turn_error_display_without_task() {
        let e = TurnError::new(Stage::Decompose, None, "fell back to rules");
        assert_eq!(e.to_string(), "[decompose] fell back to rules");
    }
}
