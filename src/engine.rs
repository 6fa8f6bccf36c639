//! Execution engine.
//!
//! Drives one plan through expansion, validation, and execution over
//! the `StatementExecutor` port. Validation happens here, immediately
//! before execution, on every concrete statement — after fan-out, so a
//! rewritten entity binding is what gets checked. A rejected statement
//! is terminal: it is recorded and never retried with relaxed rules.
//!
//! Statements within one plan may run concurrently, but rows are
//! concatenated in expansion order (entity-resolution order for a
//! fan-out), so output is deterministic regardless of completion
//! order.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use finsight_core::error::FinsightError;
use finsight_core::ports::StatementExecutor;
use finsight_core::types::{Plan, Row, StatementTrace};
use finsight_core::validator;

/// Outcome of executing one plan. Statement-level failures are data,
/// not early returns: the orchestrator folds them into the turn's
/// error list while whatever succeeded still flows onward.
#[derive(Debug, Default)]
pub struct TaskExecution {
    pub rows: Vec<Row>,
    pub traces: Vec<StatementTrace>,
    pub statement_errors: Vec<FinsightError>,
}

pub struct ExecutionEngine {
    executor: Arc<dyn StatementExecutor>,
    statement_timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(executor: Arc<dyn StatementExecutor>, statement_timeout: Duration) -> Self {
        Self {
            executor,
            statement_timeout,
        }
    }

    pub async fn execute(&self, plan: &Plan) -> TaskExecution {
        let statements = plan.expand();
        if statements.is_empty() {
            debug!(intent = %plan.intent, "plan expanded to no statements");
            return TaskExecution::default();
        }

        let mut execution = TaskExecution::default();
        let mut runnable = Vec::new();
        for statement in statements {
            let verdict = validator::validate(&statement.sql, &statement.params);
            if verdict.ok {
                execution.traces.push(StatementTrace {
                    sql: statement.sql.clone(),
                    params: statement.params.clone(),
                });
                runnable.push(statement);
            } else {
                warn!(reason = %verdict.reason, "statement rejected");
                execution
                    .statement_errors
                    .push(FinsightError::Rejected(verdict.reason));
            }
        }

        let timeout = self.statement_timeout;
        let futures = runnable.iter().map(|statement| {
            let executor = self.executor.clone();
            async move {
                match tokio::time::timeout(timeout, executor.fetch(statement)).await {
                    Ok(result) => result,
                    Err(_) => Err(FinsightError::Timeout(timeout.as_millis() as u64)),
                }
            }
        });
        let results = futures::future::join_all(futures).await;

        // Concatenate in expansion order for determinism.
        for result in results {
            match result {
                Ok(rows) => execution.rows.extend(rows),
                Err(e) => execution.statement_errors.push(e),
            }
        }
        execution
    }
}
