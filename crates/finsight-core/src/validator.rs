//! SQL allow-list validator.
//!
//! The single security-critical boundary in the pipeline. Eight ordered
//! rules, each independently sufficient to reject; applied to every
//! concrete statement immediately before execution, after per-entity
//! fan-out. The validator never mutates a statement and rejects on any
//! ambiguity rather than attempting a fix.
//!
//! The scan is a deliberately small lexer, not a SQL parser: words,
//! parameter placeholders, and the handful of punctuation marks the
//! rules care about. String literals are not special-cased — a keyword
//! smuggled inside a literal rejects, since bound parameters are the
//! only sanctioned way to pass data.

use crate::templates::{ALLOWED_PARAMS, ALLOWED_SURFACES, LIMIT_CEILING};
use crate::types::{ParamMap, ParamValue, ValidationVerdict};

/// Everything the validator checks against, bundled so tests can probe
/// rule-by-rule behavior. Production code uses [`ValidatorPolicy::default`],
/// which is the fixed allow-list from [`crate::templates`].
#[derive(Debug, Clone, Copy)]
pub struct ValidatorPolicy {
    pub surfaces: &'static [&'static str],
    pub params: &'static [&'static str],
    pub limit_ceiling: i64,
}

impl Default for ValidatorPolicy {
    fn default() -> Self {
        Self {
            surfaces: ALLOWED_SURFACES,
            params: ALLOWED_PARAMS,
            limit_ceiling: LIMIT_CEILING,
        }
    }
}

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "create", "alter", "truncate", "grant", "revoke",
];

/// Validate a statement and its parameter map against the default
/// policy.
pub fn validate(statement: &str, params: &ParamMap) -> ValidationVerdict {
    validate_with(&ValidatorPolicy::default(), statement, params)
}

/// Validate against an explicit policy. Rules run in order; the first
/// violation wins.
pub fn validate_with(
    policy: &ValidatorPolicy,
    statement: &str,
    params: &ParamMap,
) -> ValidationVerdict {
    let trimmed = statement.trim();
    if trimmed.is_empty() {
        return ValidationVerdict::reject("empty statement");
    }

    // ── Rule 1: SELECT only ───────────────────────────────────────
    // `get` rather than indexing: arbitrary (multibyte) input must
    // reject, never panic.
    let starts_with_select = match trimmed.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("select") => trimmed
            .get(6..)
            .and_then(|rest| rest.chars().next())
            .map(|c| !c.is_alphanumeric() && c != '_')
            .unwrap_or(true),
        _ => false,
    };
    if !starts_with_select {
        return ValidationVerdict::reject("statement must start with SELECT");
    }

    // ── Rule 2: at most one statement ─────────────────────────────
    // One trailing terminator is tolerated; anything else is statement
    // stacking.
    let semicolons = trimmed.matches(';').count();
    if semicolons > 1 {
        return ValidationVerdict::reject("multiple statement terminators (statement stacking)");
    }
    let body = if semicolons == 1 {
        let stripped = trimmed.trim_end();
        if !stripped.ends_with(';') {
            return ValidationVerdict::reject("statement terminator in mid-statement");
        }
        stripped.trim_end_matches(';')
    } else {
        trimmed
    };

    let toks = lex(body);
    if toks.is_empty() {
        return ValidationVerdict::reject("empty statement");
    }

    // ── Rule 3: no DDL/DML keyword anywhere ───────────────────────
    for tok in &toks {
        if let Tok::Word(w) = tok {
            if FORBIDDEN_KEYWORDS.contains(&w.as_str()) {
                return ValidationVerdict::reject(format!(
                    "forbidden keyword `{}`",
                    w.to_uppercase()
                ));
            }
        }
    }

    // ── Rule 4: no unqualified wildcard projection ────────────────
    // Any asterisk outside parentheses rejects; `count(*)` sits at
    // depth 1 and passes.
    let mut depth = 0i32;
    for tok in &toks {
        match tok {
            Tok::Punct('(') => depth += 1,
            Tok::Punct(')') => depth -= 1,
            Tok::Punct('*') if depth == 0 => {
                return ValidationVerdict::reject(
                    "wildcard projection — every column must be explicit",
                );
            }
            _ => {}
        }
    }

    // ── Rule 5: every FROM/JOIN surface must be allow-listed ──────
    let (surfaces, implicit_list) = collect_surfaces(&toks);
    for surface in &surfaces {
        if !policy
            .surfaces
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(surface))
        {
            return ValidationVerdict::reject(format!("surface `{surface}` is not allow-listed"));
        }
    }

    // ── Rule 6: mandatory, capped LIMIT ───────────────────────────
    if let Some(reason) = check_limit(policy, &toks, params) {
        return ValidationVerdict::reject(reason);
    }

    // ── Rule 7: parameter names restricted to the allowed set ─────
    for tok in &toks {
        if let Tok::Param(name) = tok {
            if !policy.params.contains(&name.as_str()) {
                return ValidationVerdict::reject(format!("parameter `:{name}` is not allowed"));
            }
        }
    }
    for name in params.keys() {
        if !policy.params.contains(&name.as_str()) {
            return ValidationVerdict::reject(format!("bound parameter `{name}` is not allowed"));
        }
    }

    // ── Rule 8: no cross joins, explicit or implicit ──────────────
    for pair in toks.windows(2) {
        if let (Tok::Word(a), Tok::Word(b)) = (&pair[0], &pair[1]) {
            if a == "cross" && b == "join" {
                return ValidationVerdict::reject("CROSS JOIN is not permitted");
            }
        }
    }
    if implicit_list {
        let has_predicate = toks.iter().any(|t| {
            matches!(t, Tok::Word(w) if w == "where" || w == "using" || w == "on")
        });
        if !has_predicate {
            return ValidationVerdict::reject(
                "comma-separated table list without WHERE/USING/ON (implicit cross join)",
            );
        }
    }

    ValidationVerdict::pass()
}

// ── Lexer ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    /// Lowercased word: identifier, keyword, or number literal.
    Word(String),
    /// Named placeholder `:name`, without the colon.
    Param(String),
    /// Positional placeholder `$n`.
    Positional,
    Punct(char),
}

fn lex(body: &str) -> Vec<Tok> {
    let mut toks = Vec::new();
    let mut chars = body.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        match c {
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::new();
                word.push(c.to_ascii_lowercase());
                while let Some(&(_, n)) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' || n == '.' {
                        word.push(n.to_ascii_lowercase());
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Word(word));
            }
            ':' => {
                // `::` is a cast, not a placeholder.
                if matches!(chars.peek(), Some(&(_, ':'))) {
                    chars.next();
                    continue;
                }
                let mut name = String::new();
                while let Some(&(_, n)) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n.to_ascii_lowercase());
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !name.is_empty() {
                    toks.push(Tok::Param(name));
                }
            }
            '$' => {
                let mut saw_digit = false;
                while let Some(&(_, n)) = chars.peek() {
                    if n.is_ascii_digit() {
                        saw_digit = true;
                        chars.next();
                    } else {
                        break;
                    }
                }
                if saw_digit {
                    toks.push(Tok::Positional);
                }
            }
            '(' | ')' | ',' | '*' => toks.push(Tok::Punct(c)),
            _ => {}
        }
    }
    toks
}

/// Table/view keywords that end a FROM clause's comma list.
fn is_clause_keyword(word: &str) -> bool {
    matches!(
        word,
        "where"
            | "join"
            | "inner"
            | "left"
            | "right"
            | "full"
            | "cross"
            | "on"
            | "using"
            | "order"
            | "group"
            | "having"
            | "limit"
            | "union"
            | "intersect"
            | "except"
    )
}

/// Collect every table referenced by a FROM or JOIN clause, at any
/// nesting depth (subqueries included — their inner FROM is scanned by
/// the same pass). Also reports whether any FROM clause used a
/// comma-separated table list, which rule 8 treats as an implicit
/// cross join unless a predicate is present.
fn collect_surfaces(toks: &[Tok]) -> (Vec<String>, bool) {
    let mut surfaces = Vec::new();
    let mut implicit_list = false;
    let mut i = 0;
    while i < toks.len() {
        let is_from = matches!(&toks[i], Tok::Word(w) if w == "from");
        let is_join = matches!(&toks[i], Tok::Word(w) if w == "join");
        if !is_from && !is_join {
            i += 1;
            continue;
        }
        i += 1;
        // Derived table: `FROM ( SELECT ... )` — the inner FROM will be
        // reached by this same loop.
        if matches!(toks.get(i), Some(Tok::Punct('('))) {
            continue;
        }
        let Some(Tok::Word(table)) = toks.get(i) else {
            continue;
        };
        surfaces.push(table.clone());
        i += 1;
        if is_join {
            continue;
        }
        // Walk a FROM clause's comma list: optional alias, then either
        // a comma and the next table, or the end of the clause.
        loop {
            match toks.get(i) {
                Some(Tok::Word(w)) if w == "as" => i += 1,
                Some(Tok::Word(w)) if !is_clause_keyword(w) => i += 1, // alias
                Some(Tok::Punct(',')) => {
                    implicit_list = true;
                    i += 1;
                    if let Some(Tok::Word(table)) = toks.get(i) {
                        surfaces.push(table.clone());
                        i += 1;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }
    (surfaces, implicit_list)
}

/// Rule 6: the statement must carry a LIMIT whose value — literal or
/// bound — is a positive integer no greater than the ceiling. A
/// positional LIMIT cannot be tied back to the parameter map, so it
/// rejects as ambiguous.
fn check_limit(policy: &ValidatorPolicy, toks: &[Tok], params: &ParamMap) -> Option<String> {
    let Some(limit_idx) = toks
        .iter()
        .rposition(|t| matches!(t, Tok::Word(w) if w == "limit"))
    else {
        return Some("statement has no LIMIT clause".to_string());
    };
    let value = toks.get(limit_idx + 1);
    match value {
        Some(Tok::Word(w)) if w.chars().all(|c| c.is_ascii_digit()) => {
            match w.parse::<i64>() {
                Ok(n) if n >= 1 && n <= policy.limit_ceiling => None,
                Ok(n) => Some(format!(
                    "LIMIT {n} exceeds the ceiling of {}",
                    policy.limit_ceiling
                )),
                Err(_) => Some("LIMIT value is not a valid integer".to_string()),
            }
        }
        Some(Tok::Param(name)) => {
            if !policy.params.contains(&name.as_str()) {
                return Some(format!("LIMIT parameter `:{name}` is not allowed"));
            }
            match params.get(name) {
                Some(ParamValue::Int(n)) if *n >= 1 && *n <= policy.limit_ceiling => None,
                Some(ParamValue::Int(n)) => Some(format!(
                    "bound LIMIT {n} exceeds the ceiling of {}",
                    policy.limit_ceiling
                )),
                Some(ParamValue::Text(_)) => {
                    Some("bound LIMIT value is not an integer".to_string())
                }
                None => Some(format!("LIMIT parameter `:{name}` has no bound value")),
            }
        }
        Some(Tok::Positional) => {
            Some("positional LIMIT binding cannot be verified".to_string())
        }
        _ => Some("LIMIT clause has no usable value".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::Template;
    use crate::types::ParamValue;

    fn no_params() -> ParamMap {
        ParamMap::new()
    }

    fn params_for(template: Template) -> ParamMap {
        let mut map = ParamMap::new();
        for name in template.params() {
            let value = match *name {
                "fiscal_year" => ParamValue::Int(2023),
                "fiscal_quarter" => ParamValue::Int(2),
                "limit" => ParamValue::Int(template.default_limit()),
                _ => ParamValue::Text("AAPL".to_string()),
            };
            map.insert((*name).to_string(), value);
        }
        map
    }

    // ── Every shipped template passes ─────────────────────────────

    #[test]
    fn all_templates_validate_with_their_default_bindings() {
        for t in Template::all() {
            let verdict = validate(t.sql(), &params_for(*t));
            assert!(verdict.ok, "{t} rejected: {}", verdict.reason);
        }
    }

    // ── Rule 1: SELECT only ───────────────────────────────────────

    #[test]
    fn rejects_non_select() {
        let mut params = no_params();
        params.insert("limit".into(), ParamValue::Int(5));
        let v = validate("DELETE FROM quarterly_financials LIMIT :limit", &params);
        assert!(!v.ok);
    }

    #[test]
    fn rejects_explain_prefix() {
        let v = validate(
            "EXPLAIN SELECT revenue FROM quarterly_financials LIMIT 5",
            &no_params(),
        );
        assert!(!v.ok);
        assert!(v.reason.contains("SELECT"));
    }

    #[test]
    fn multibyte_garbage_rejects_without_panicking() {
        let v = validate("sélect revenue FROM quarterly_financials LIMIT 5", &no_params());
        assert!(!v.ok);
        let v = validate("данные", &no_params());
        assert!(!v.ok);
    }

    #[test]
    fn select_with_no_projection_rejects() {
        // Bare "SELECT" survives rule 1 but has no LIMIT.
        let v = validate("SELECT", &no_params());
        assert!(!v.ok);
    }

    #[test]
    fn select_is_case_insensitive() {
        let v = validate(
            "select revenue from quarterly_financials limit 5",
            &no_params(),
        );
        assert!(v.ok, "{}", v.reason);
    }

    // ── Rule 2: single statement ──────────────────────────────────

    #[test]
    fn tolerates_one_trailing_terminator() {
        let v = validate(
            "SELECT revenue FROM quarterly_financials LIMIT 5;",
            &no_params(),
        );
        assert!(v.ok, "{}", v.reason);
    }

    #[test]
    fn rejects_statement_stacking() {
        let v = validate(
            "SELECT revenue FROM quarterly_financials LIMIT 5; SELECT eps FROM quarterly_financials LIMIT 5;",
            &no_params(),
        );
        assert!(!v.ok);
        assert!(v.reason.contains("stacking"));
    }

    #[test]
    fn rejects_mid_statement_terminator() {
        let v = validate(
            "SELECT revenue FROM quarterly_financials LIMIT 5; --",
            &no_params(),
        );
        assert!(!v.ok);
    }

    // ── Rule 3: DDL/DML keywords ──────────────────────────────────

    #[test]
    fn rejects_every_forbidden_keyword_as_whole_word() {
        for kw in FORBIDDEN_KEYWORDS {
            let sql = format!(
                "SELECT revenue FROM quarterly_financials WHERE note = {kw} LIMIT 5"
            );
            let v = validate(&sql, &no_params());
            assert!(!v.ok, "{kw} slipped through");
            assert!(v.reason.contains(&kw.to_uppercase()));
        }
    }

    #[test]
    fn keyword_inside_identifier_is_not_a_match() {
        // `updated_at` contains "update" but is one word.
        let v = validate(
            "SELECT updated_at FROM quarterly_financials LIMIT 5",
            &no_params(),
        );
        assert!(v.ok, "{}", v.reason);
    }

    // ── Rule 4: wildcard projection ───────────────────────────────

    #[test]
    fn rejects_select_star() {
        let v = validate("SELECT * FROM quarterly_financials LIMIT 5", &no_params());
        assert!(!v.ok);
        assert!(v.reason.contains("wildcard"));
    }

    #[test]
    fn rejects_qualified_star() {
        let v = validate(
            "SELECT q.* FROM quarterly_financials q LIMIT 5",
            &no_params(),
        );
        assert!(!v.ok);
    }

    #[test]
    fn count_star_inside_parens_is_allowed() {
        let v = validate(
            "SELECT count(*) FROM quarterly_financials LIMIT 1",
            &no_params(),
        );
        assert!(v.ok, "{}", v.reason);
    }

    // ── Rule 5: surface allow-list ────────────────────────────────

    #[test]
    fn rejects_unknown_surface() {
        let v = validate("SELECT a FROM pg_shadow LIMIT 5", &no_params());
        assert!(!v.ok);
        assert!(v.reason.contains("pg_shadow"));
    }

    #[test]
    fn rejects_unknown_surface_in_join() {
        let v = validate(
            "SELECT q.revenue FROM quarterly_financials q JOIN secret_table s ON s.id = q.entity_id LIMIT 5",
            &no_params(),
        );
        assert!(!v.ok);
        assert!(v.reason.contains("secret_table"));
    }

    #[test]
    fn rejects_unknown_surface_inside_subquery() {
        let v = validate(
            "SELECT revenue FROM quarterly_financials WHERE entity_id IN (SELECT id FROM pg_user) LIMIT 5",
            &no_params(),
        );
        assert!(!v.ok);
        assert!(v.reason.contains("pg_user"));
    }

    #[test]
    fn surface_check_is_case_insensitive() {
        let v = validate(
            "SELECT revenue FROM Quarterly_Financials LIMIT 5",
            &no_params(),
        );
        assert!(v.ok, "{}", v.reason);
    }

    // ── Rule 6: LIMIT mandatory and capped ────────────────────────

    #[test]
    fn rejects_missing_limit() {
        let v = validate("SELECT revenue FROM quarterly_financials", &no_params());
        assert!(!v.ok);
        assert!(v.reason.to_lowercase().contains("limit"));
    }

    #[test]
    fn rejects_limit_500_literal() {
        let v = validate(
            "SELECT revenue FROM quarterly_financials LIMIT 500",
            &no_params(),
        );
        assert!(!v.ok);
        assert!(v.reason.contains("500"));
    }

    #[test]
    fn rejects_bound_limit_500() {
        let mut params = no_params();
        params.insert("limit".into(), ParamValue::Int(500));
        let v = validate(
            "SELECT revenue FROM quarterly_financials LIMIT :limit",
            &params,
        );
        assert!(!v.ok);
        assert!(v.reason.contains("500"));
    }

    #[test]
    fn accepts_limit_at_the_ceiling() {
        let v = validate(
            "SELECT revenue FROM quarterly_financials LIMIT 200",
            &no_params(),
        );
        assert!(v.ok, "{}", v.reason);
    }

    #[test]
    fn rejects_unbound_limit_placeholder() {
        let v = validate(
            "SELECT revenue FROM quarterly_financials LIMIT :limit",
            &no_params(),
        );
        assert!(!v.ok);
        assert!(v.reason.contains("no bound value"));
    }

    #[test]
    fn rejects_zero_and_negative_limits() {
        let v = validate(
            "SELECT revenue FROM quarterly_financials LIMIT 0",
            &no_params(),
        );
        assert!(!v.ok);
    }

    #[test]
    fn rejects_positional_limit() {
        let v = validate(
            "SELECT revenue FROM quarterly_financials LIMIT $1",
            &no_params(),
        );
        assert!(!v.ok);
    }

    // ── Rule 7: parameter names ───────────────────────────────────

    #[test]
    fn rejects_unknown_placeholder_name() {
        let v = validate(
            "SELECT revenue FROM quarterly_financials WHERE entity_id = :ticker LIMIT 5",
            &no_params(),
        );
        assert!(!v.ok);
        assert!(v.reason.contains("ticker"));
    }

    #[test]
    fn rejects_unknown_bound_name() {
        let mut params = no_params();
        params.insert("injection".into(), ParamValue::Text("x".into()));
        let v = validate("SELECT revenue FROM quarterly_financials LIMIT 5", &params);
        assert!(!v.ok);
        assert!(v.reason.contains("injection"));
    }

    #[test]
    fn postgres_cast_is_not_a_placeholder() {
        let v = validate(
            "SELECT revenue::text FROM quarterly_financials LIMIT 5",
            &no_params(),
        );
        assert!(v.ok, "{}", v.reason);
    }

    // ── Rule 8: cross joins ───────────────────────────────────────

    #[test]
    fn rejects_explicit_cross_join() {
        let v = validate(
            "SELECT q.revenue FROM quarterly_financials q CROSS JOIN annual_financials a LIMIT 5",
            &no_params(),
        );
        assert!(!v.ok);
        assert!(v.reason.contains("CROSS JOIN"));
    }

    #[test]
    fn rejects_comma_list_without_predicate() {
        let v = validate(
            "SELECT q.revenue FROM quarterly_financials q, annual_financials a LIMIT 5",
            &no_params(),
        );
        assert!(!v.ok);
        assert!(v.reason.contains("implicit"));
    }

    #[test]
    fn accepts_comma_list_with_where() {
        let v = validate(
            "SELECT q.revenue FROM quarterly_financials q, annual_financials a WHERE a.entity_id = q.entity_id LIMIT 5",
            &no_params(),
        );
        assert!(v.ok, "{}", v.reason);
    }

    // ── Never mutates ─────────────────────────────────────────────

    #[test]
    fn verdict_is_pure_data() {
        let sql = "SELECT * FROM quarterly_financials LIMIT 500";
        let before = sql.to_string();
        let _ = validate(sql, &no_params());
        assert_eq!(sql, before);
    }
}
