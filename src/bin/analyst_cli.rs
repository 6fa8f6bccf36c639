//! Interactive analyst REPL.
//!
//! One orchestrator turn per line. Requires `DATABASE_URL`; an OpenAI
//! key upgrades decomposition from the rule cascade to the LLM
//! classifier with rule fallback.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use finsight::{Analyst, Config};
use finsight_agentic::{Decomposer, LlmClassifier, LlmClient, OpenAiClient};
use finsight_postgres::{connect_pool, PgAliasStore, PgCitationStore, PgStatementExecutor, PoolConfig};

#[derive(Parser)]
#[command(name = "analyst_cli", about = "Ask analytical questions about the covered companies")]
struct Args {
    /// Session id; turns in one session share carry-over context.
    /// Defaults to a fresh id per run.
    #[arg(long)]
    session: Option<String>,

    /// Print executed SQL and bound parameters after each answer.
    #[arg(long)]
    show_sql: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let session_id = args
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let config = Config::from_env();

    let Some(database_url) = config.database_url.clone() else {
        bail!("DATABASE_URL is not set; the analyst needs a datastore to answer from");
    };

    let mut pool_config = PoolConfig::new(database_url);
    pool_config.max_connections = config.max_connections;
    pool_config.statement_timeout = config.statement_timeout;
    let pool = connect_pool(&pool_config).await?;

    let decomposer = match &config.openai_api_key {
        Some(key) => {
            let client = Arc::new(OpenAiClient::new(key.clone()));
            println!("{}", format!("classifier: {} ({})", client.provider_name(), client.model_name()).dimmed());
            Decomposer::with_primary(Arc::new(LlmClassifier::new(client)))
        }
        None => {
            println!("{}", "classifier: rules only (set OPENAI_API_KEY to enable the LLM path)".dimmed());
            Decomposer::rule_only()
        }
    };

    let analyst = Analyst::new(
        Arc::new(PgAliasStore::new(pool.clone())),
        Arc::new(PgStatementExecutor::new(pool.clone())),
        Arc::new(PgCitationStore::new(pool)),
        decomposer,
        config.statement_timeout,
    );

    println!("Ask about the covered companies. Ctrl-D to quit.");
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("? ") {
            Ok(line) => {
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                editor.add_history_entry(question)?;
                let outcome = analyst.answer(&session_id, question).await;
                println!("{}", outcome.answer);
                for check in &outcome.checks {
                    println!("{}", format!("  note: {check}").yellow());
                }
                if args.show_sql {
                    for trace in &outcome.traces {
                        println!("{}", trace.sql.dimmed());
                        for (name, value) in &trace.params {
                            println!("{}", format!("  :{name} = {value}").dimmed());
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
