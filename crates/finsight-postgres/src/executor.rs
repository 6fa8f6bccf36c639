//! Statement executor adapter.
//!
//! Rewrites a bound statement's named placeholders to positional `$n`
//! markers and binds the values at the driver boundary — parameters
//! are never string-interpolated. Result rows decode into ordered
//! column → JSON-scalar pairs so the formatter sees one uniform shape
//! regardless of Postgres column types.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row as SqlxRow, TypeInfo};

use finsight_core::error::{FinsightError, Result};
use finsight_core::ports::StatementExecutor;
use finsight_core::types::{BoundStatement, ParamValue, Row};

pub struct PgStatementExecutor {
    pool: PgPool,
}

impl PgStatementExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatementExecutor for PgStatementExecutor {
    async fn fetch(&self, statement: &BoundStatement) -> Result<Vec<Row>> {
        let (sql, ordered) = to_positional(&statement.sql, statement)?;

        let mut query = sqlx::query(&sql);
        for value in &ordered {
            query = match value {
                ParamValue::Text(s) => query.bind(s.clone()),
                ParamValue::Int(i) => query.bind(*i),
            };
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FinsightError::Datastore(e.to_string()))?;

        Ok(rows.iter().map(decode_row).collect())
    }
}

/// Rewrite `:name` placeholders to `$n`, reusing one index per distinct
/// name, and return the bind values in index order. A placeholder with
/// no bound value is an error — the executor never guesses.
fn to_positional(sql: &str, statement: &BoundStatement) -> Result<(String, Vec<ParamValue>)> {
    let mut rewritten = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c != ':' {
            rewritten.push(c);
            continue;
        }
        // `::` cast — copy through untouched.
        if chars.peek() == Some(&':') {
            rewritten.push(':');
            rewritten.push(':');
            chars.next();
            continue;
        }
        let mut name = String::new();
        while let Some(&n) = chars.peek() {
            if n.is_ascii_alphanumeric() || n == '_' {
                name.push(n);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            rewritten.push(':');
            continue;
        }
        let index = match names.iter().position(|existing| existing == &name) {
            Some(i) => i,
            None => {
                names.push(name.clone());
                names.len() - 1
            }
        };
        rewritten.push('$');
        rewritten.push_str(&(index + 1).to_string());
    }

    let mut ordered = Vec::with_capacity(names.len());
    for name in &names {
        let value = statement
            .params
            .get(name)
            .ok_or_else(|| FinsightError::UnboundParam(name.clone()))?;
        ordered.push(value.clone());
    }
    Ok((rewritten, ordered))
}

fn decode_row(pg: &PgRow) -> Row {
    let mut row = Row::new();
    for column in pg.columns() {
        let value = decode_value(pg, column.ordinal(), column.type_info().name());
        row.push(column.name(), value);
    }
    row
}

fn number(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Decode one column to a JSON scalar. Unknown types degrade to their
/// text form rather than failing the whole row.
fn decode_value(pg: &PgRow, idx: usize, type_name: &str) -> serde_json::Value {
    match type_name {
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => pg
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
        "INT2" => pg
            .try_get::<Option<i16>, _>(idx)
            .ok()
            .flatten()
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "INT4" => pg
            .try_get::<Option<i32>, _>(idx)
            .ok()
            .flatten()
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "INT8" => pg
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "FLOAT4" => pg
            .try_get::<Option<f32>, _>(idx)
            .ok()
            .flatten()
            .map(|v| number(f64::from(v)))
            .unwrap_or(serde_json::Value::Null),
        "FLOAT8" => pg
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(number)
            .unwrap_or(serde_json::Value::Null),
        "NUMERIC" => pg
            .try_get::<Option<Decimal>, _>(idx)
            .ok()
            .flatten()
            .and_then(|d| d.to_f64())
            .map(number)
            .unwrap_or(serde_json::Value::Null),
        "BOOL" => pg
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(serde_json::Value::Bool)
            .unwrap_or(serde_json::Value::Null),
        "DATE" => pg
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(|d| serde_json::Value::String(d.to_string()))
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMP" => pg
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|t| serde_json::Value::String(t.to_string()))
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMPTZ" => pg
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|t| serde_json::Value::String(t.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null),
        _ => pg
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::types::{ParamMap, Period};

    fn statement(sql: &str, pairs: &[(&str, ParamValue)]) -> BoundStatement {
        let mut params = ParamMap::new();
        for (k, v) in pairs {
            params.insert(k.to_string(), v.clone());
        }
        BoundStatement {
            sql: sql.to_string(),
            params,
            entity_id: None,
            period: Period::default(),
            surfaces: vec![],
        }
    }

    #[test]
    fn rewrites_named_to_positional_in_order() {
        let stmt = statement(
            "SELECT a FROM t WHERE x = :entity_id AND y = :fiscal_year LIMIT :limit",
            &[
                ("entity_id", ParamValue::Text("AAPL".into())),
                ("fiscal_year", ParamValue::Int(2023)),
                ("limit", ParamValue::Int(8)),
            ],
        );
        let (sql, ordered) = to_positional(&stmt.sql, &stmt).unwrap();
        assert_eq!(
            sql,
            "SELECT a FROM t WHERE x = $1 AND y = $2 LIMIT $3"
        );
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[0], ParamValue::Text("AAPL".into()));
        assert_eq!(ordered[2], ParamValue::Int(8));
    }

    #[test]
    fn repeated_placeholder_reuses_one_index() {
        let stmt = statement(
            "SELECT a FROM t WHERE x = :entity_id OR y = :entity_id LIMIT :limit",
            &[
                ("entity_id", ParamValue::Text("AAPL".into())),
                ("limit", ParamValue::Int(8)),
            ],
        );
        let (sql, ordered) = to_positional(&stmt.sql, &stmt).unwrap();
        assert_eq!(sql, "SELECT a FROM t WHERE x = $1 OR y = $1 LIMIT $2");
        assert_eq!(ordered.len(), 2);
    }

    #[test]
    fn cast_is_preserved() {
        let stmt = statement(
            "SELECT a::text FROM t LIMIT :limit",
            &[("limit", ParamValue::Int(8))],
        );
        let (sql, _) = to_positional(&stmt.sql, &stmt).unwrap();
        assert_eq!(sql, "SELECT a::text FROM t LIMIT $1");
    }

    #[test]
    fn unbound_placeholder_is_an_error() {
        let stmt = statement("SELECT a FROM t WHERE x = :entity_id LIMIT 5", &[]);
        let err = to_positional(&stmt.sql, &stmt).unwrap_err();
        assert!(matches!(err, FinsightError::UnboundParam(name) if name == "entity_id"));
    }
}
