//! A closed, safe, tree-walked expression evaluator used to compile and run
//! rulesets against a normalized row context.
//!
//! It does **not**: expose arbitrary function calls, traverse host-type
//! attributes, support user-defined functions, or allow heterogeneous
//! arithmetic beyond the documented coercions.

mod ast;
mod interpreter;
mod parser;
mod token;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use notify_schemas::Context;
use serde::{Deserialize, Serialize};

pub use ast::Expr;

#[derive(Debug, Clone)]
pub enum RuleEvaluationError {
    Parse(String),
    UnknownName(String),
    TypeError(String),
    /// Wraps an error with the offending rule id, per the evaluator contract.
    Rule { id: String, source: Box<RuleEvaluationError> },
}

impl fmt::Display for RuleEvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleEvaluationError::Parse(msg) => write!(f, "parse error: {msg}"),
            RuleEvaluationError::UnknownName(name) => write!(f, "unknown name: {name}"),
            RuleEvaluationError::TypeError(msg) => write!(f, "type error: {msg}"),
            RuleEvaluationError::Rule { id, source } => write!(f, "rule {id}: {source}"),
        }
    }
}

impl std::error::Error for RuleEvaluationError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub when: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RuleDoc {
    rules: Vec<RuleDef>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub description: Option<String>,
    expr: Expr,
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn from_yaml(src: &str) -> Result<RuleSet, RuleEvaluationError> {
        let doc: RuleDoc = serde_yaml::from_str(src)
            .map_err(|e| RuleEvaluationError::Parse(e.to_string()))?;
        let mut rules = Vec::with_capacity(doc.rules.len());
        for def in doc.rules {
            let expr = compile(&def.when)
                .map_err(|source| RuleEvaluationError::Rule { id: def.id.clone(), source: Box::new(source) })?;
            rules.push(Rule {
                id: def.id,
                description: def.description,
                expr,
            });
        }
        Ok(RuleSet { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluates every rule independently against `context`. Errors raised by
    /// any rule propagate immediately, tagged with the offending id.
    pub fn evaluate(
        &self,
        context: &Context,
        today: NaiveDate,
    ) -> Result<BTreeMap<String, bool>, RuleEvaluationError> {
        let mut out = BTreeMap::new();
        for rule in &self.rules {
            let value = interpreter::eval(&rule.expr, context, today)
                .map_err(|source| RuleEvaluationError::Rule { id: rule.id.clone(), source: Box::new(source) })?;
            out.insert(rule.id.clone(), value.is_truthy());
        }
        Ok(out)
    }
}

/// Compiles a single `when` expression, usable both for ruleset rules and
/// for action `when` guards (see `notify-actions`).
pub fn compile(src: &str) -> Result<Expr, RuleEvaluationError> {
    let tokens = token::tokenize(src).map_err(RuleEvaluationError::Parse)?;
    parser::Parser::new(&tokens)
        .parse()
        .map_err(RuleEvaluationError::Parse)
}

pub fn eval(expr: &Expr, context: &Context, today: NaiveDate) -> Result<notify_schemas::Value, RuleEvaluationError> {
    interpreter::eval(expr, context, today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_schemas::Value;
    use std::collections::BTreeMap as Map;

    fn ctx_with(email_notify: bool) -> Context {
        let mut row = Map::new();
        row.insert("DebeNotificar".to_string(), Value::Bool(email_notify));
        Context::new(row, Map::new())
    }

    #[test]
    fn evaluates_bracket_access_on_row() {
        let rs = RuleSet::from_yaml(
            "rules:\n  - id: debe_notificar\n    when: \"row['DebeNotificar']\"\n",
        )
        .unwrap();
        let ctx = ctx_with(true);
        let out = rs.evaluate(&ctx, today()).unwrap();
        assert_eq!(out.get("debe_notificar"), Some(&true));
    }

    #[test]
    fn evaluates_dotted_access_equivalently() {
        let rs = RuleSet::from_yaml(
            "rules:\n  - id: debe_notificar\n    when: \"row.DebeNotificar\"\n",
        )
        .unwrap();
        let ctx = ctx_with(false);
        let out = rs.evaluate(&ctx, today()).unwrap();
        assert_eq!(out.get("debe_notificar"), Some(&false));
    }

    #[test]
    fn unknown_name_is_not_swallowed() {
        let rs = RuleSet::from_yaml("rules:\n  - id: r1\n    when: \"mystery_fn()\"\n").unwrap();
        let ctx = ctx_with(true);
        let err = rs.evaluate(&ctx, today()).unwrap_err();
        match err {
            RuleEvaluationError::Rule { id, .. } => assert_eq!(id, "r1"),
            other => panic!("expected Rule error, got {other:?}"),
        }
    }

    #[test]
    fn days_until_uses_injected_today() {
        let rs = RuleSet::from_yaml(
            "rules:\n  - id: soon\n    when: \"days_until(parse_date('2024-01-10')) <= 7\"\n",
        )
        .unwrap();
        let ctx = Context::default();
        let out = rs
            .evaluate(&ctx, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
            .unwrap();
        assert_eq!(out.get("soon"), Some(&true));
    }

    #[test]
    fn evaluation_is_deterministic_across_calls() {
        let rs = RuleSet::from_yaml("rules:\n  - id: r1\n    when: \"row.x > 1 and not row.y\"\n").unwrap();
        let mut row = Map::new();
        row.insert("x".to_string(), Value::Int(5));
        row.insert("y".to_string(), Value::Bool(false));
        let ctx = Context::new(row, Map::new());
        let first = rs.evaluate(&ctx, today()).unwrap();
        let second = rs.evaluate(&ctx, today()).unwrap();
        assert_eq!(first, second);
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }
}
