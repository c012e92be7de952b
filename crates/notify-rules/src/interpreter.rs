use chrono::NaiveDate;
use notify_schemas::{Context, Value};

use crate::ast::{BinOp, Expr, UnOp};
use crate::RuleEvaluationError;

const HELPERS: &[&str] = &["today", "parse_date", "days_until", "len", "str", "int", "float", "bool"];

pub fn eval(expr: &Expr, ctx: &Context, today: NaiveDate) -> Result<Value, RuleEvaluationError> {
    match expr {
        Expr::Lit(v) => Ok(v.clone()),
        Expr::Path(path) => resolve_path(path, ctx),
        Expr::Call(name, args) => eval_call(name, args, ctx, today),
        Expr::Unary(UnOp::Not, inner) => Ok(Value::Bool(!eval(inner, ctx, today)?.is_truthy())),
        Expr::Unary(UnOp::Neg, inner) => match eval(inner, ctx, today)? {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(RuleEvaluationError::TypeError(format!(
                "cannot negate {other:?}"
            ))),
        },
        Expr::Binary(op, l, r) => eval_binary(*op, l, r, ctx, today),
    }
}

fn resolve_path(path: &str, ctx: &Context) -> Result<Value, RuleEvaluationError> {
    if path.starts_with("row.") || path.starts_with("rule_results.") {
        match ctx.get_path(path) {
            Some(v) => Ok(v),
            None => Ok(Value::Null),
        }
    } else {
        Err(RuleEvaluationError::UnknownName(path.to_string()))
    }
}

fn eval_call(
    name: &str,
    args: &[Expr],
    ctx: &Context,
    today: NaiveDate,
) -> Result<Value, RuleEvaluationError> {
    if !HELPERS.contains(&name) {
        return Err(RuleEvaluationError::UnknownName(name.to_string()));
    }
    let evaluated: Result<Vec<Value>, RuleEvaluationError> =
        args.iter().map(|a| eval(a, ctx, today)).collect();
    let evaluated = evaluated?;

    match name {
        "today" => Ok(Value::Date(today)),
        "parse_date" => {
            let s = arg_as_string(&evaluated, 0)?;
            let d = NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|_| RuleEvaluationError::TypeError(format!("invalid ISO date: {s}")))?;
            Ok(Value::Date(d))
        }
        "days_until" => {
            let d = match evaluated.first() {
                Some(Value::Date(d)) => *d,
                Some(Value::Str(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|_| RuleEvaluationError::TypeError(format!("invalid ISO date: {s}")))?,
                _ => return Err(RuleEvaluationError::TypeError("days_until expects a date".into())),
            };
            Ok(Value::Int((d - today).num_days()))
        }
        "len" => match evaluated.first() {
            Some(Value::Str(s)) => Ok(Value::Int(s.chars().count() as i64)),
            Some(Value::Null) => Ok(Value::Int(0)),
            _ => Err(RuleEvaluationError::TypeError("len expects a string".into())),
        },
        "str" => Ok(Value::Str(
            evaluated.first().cloned().unwrap_or(Value::Null).to_string(),
        )),
        "int" => {
            let v = evaluated.first().cloned().unwrap_or(Value::Null);
            match v {
                Value::Int(i) => Ok(Value::Int(i)),
                Value::Float(f) => Ok(Value::Int(f as i64)),
                Value::Bool(b) => Ok(Value::Int(b as i64)),
                Value::Str(s) => s
                    .trim()
                    .replace(',', ".")
                    .parse::<f64>()
                    .map(|f| Value::Int(f as i64))
                    .map_err(|_| RuleEvaluationError::TypeError(format!("cannot coerce to int: {s}"))),
                other => Err(RuleEvaluationError::TypeError(format!(
                    "cannot coerce to int: {other:?}"
                ))),
            }
        }
        "float" => {
            let v = evaluated.first().cloned().unwrap_or(Value::Null);
            match v {
                Value::Int(i) => Ok(Value::Float(i as f64)),
                Value::Float(f) => Ok(Value::Float(f)),
                Value::Str(s) => s
                    .trim()
                    .replace(',', ".")
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| RuleEvaluationError::TypeError(format!("cannot coerce to float: {s}"))),
                other => Err(RuleEvaluationError::TypeError(format!(
                    "cannot coerce to float: {other:?}"
                ))),
            }
        }
        "bool" => Ok(Value::Bool(
            evaluated.first().map(Value::is_truthy).unwrap_or(false),
        )),
        _ => unreachable!("helper list checked above"),
    }
}

fn arg_as_string(args: &[Value], idx: usize) -> Result<String, RuleEvaluationError> {
    match args.get(idx) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(RuleEvaluationError::TypeError("missing argument".into())),
    }
}

fn eval_binary(
    op: BinOp,
    l: &Expr,
    r: &Expr,
    ctx: &Context,
    today: NaiveDate,
) -> Result<Value, RuleEvaluationError> {
    match op {
        BinOp::And => {
            let lv = eval(l, ctx, today)?;
            if !lv.is_truthy() {
                return Ok(lv);
            }
            eval(r, ctx, today)
        }
        BinOp::Or => {
            let lv = eval(l, ctx, today)?;
            if lv.is_truthy() {
                return Ok(lv);
            }
            eval(r, ctx, today)
        }
        _ => {
            let lv = eval(l, ctx, today)?;
            let rv = eval(r, ctx, today)?;
            match op {
                BinOp::Eq => Ok(Value::Bool(values_equal(&lv, &rv))),
                BinOp::Ne => Ok(Value::Bool(!values_equal(&lv, &rv))),
                BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, &lv, &rv),
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => arithmetic(op, &lv, &rv),
                BinOp::And | BinOp::Or => unreachable!("handled above"),
            }
        }
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        _ => l == r,
    }
}

fn compare(op: BinOp, l: &Value, r: &Value) -> Result<Value, RuleEvaluationError> {
    let ordering = match (l, r) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                RuleEvaluationError::TypeError("comparison produced no ordering".into())
            })?,
            _ => {
                return Err(RuleEvaluationError::TypeError(format!(
                    "cannot compare {l:?} and {r:?}"
                )))
            }
        },
    };
    let result = match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn arithmetic(op: BinOp, l: &Value, r: &Value) -> Result<Value, RuleEvaluationError> {
    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        return Ok(match op {
            BinOp::Add => Value::Int(a + b),
            BinOp::Sub => Value::Int(a - b),
            BinOp::Mul => Value::Int(a * b),
            BinOp::Div => Value::Float(*a as f64 / *b as f64),
            _ => unreachable!(),
        });
    }
    let a = l
        .as_f64()
        .ok_or_else(|| RuleEvaluationError::TypeError(format!("not numeric: {l:?}")))?;
    let b = r
        .as_f64()
        .ok_or_else(|| RuleEvaluationError::TypeError(format!("not numeric: {r:?}")))?;
    Ok(Value::Float(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        _ => unreachable!(),
    }))
}
