use std::collections::BTreeMap;

use chrono::NaiveDate;
use notify_schemas::{Context, Value};
use serde_json::Value as Json;

/// Rebuilds a rule/template `Context` from the `context: {row, rule_results}`
/// section of a dispatcher payload, as received by an adapter.
pub fn context_from_payload(payload: &Json) -> Context {
    let mut row = BTreeMap::new();
    let mut rule_results = BTreeMap::new();

    if let Some(ctx) = payload.get("context") {
        if let Some(Json::Object(row_obj)) = ctx.get("row") {
            for (k, v) in row_obj {
                row.insert(k.clone(), json_to_value(v));
            }
        }
        if let Some(Json::Object(rr_obj)) = ctx.get("rule_results") {
            for (k, v) in rr_obj {
                rule_results.insert(k.clone(), v.as_bool().unwrap_or(false));
            }
        }
    }

    Context::new(row, rule_results)
}

fn json_to_value(v: &Json) -> Value {
    match v {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => Value::Str(s.clone()),
        _ => Value::Null,
    }
}

pub fn today_utc() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
