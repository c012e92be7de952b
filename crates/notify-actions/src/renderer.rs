use std::sync::OnceLock;

use chrono::NaiveDate;
use notify_rules::RuleEvaluationError;
use notify_schemas::{Action, Context};
use regex::Regex;
use serde_json::Value as Json;

use crate::RenderedAction;

fn interpolation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*(.*?)\s*\}\}").unwrap())
}

/// Replaces every `{{ expr }}` segment with the stringified evaluation of
/// `expr`; `null`/missing values render as the empty string. This is the
/// single, safe interpolation form — not a general template language.
pub fn render_template(
    template: &str,
    ctx: &Context,
    today: NaiveDate,
) -> Result<String, RuleEvaluationError> {
    let mut err = None;
    let rendered = interpolation_re()
        .replace_all(template, |caps: &regex::Captures| {
            if err.is_some() {
                return String::new();
            }
            let expr_src = &caps[1];
            match notify_rules::compile(expr_src).and_then(|e| notify_rules::eval(&e, ctx, today)) {
                Ok(value) => value.to_string(),
                Err(e) => {
                    err = Some(e);
                    String::new()
                }
            }
        })
        .into_owned();
    match err {
        Some(e) => Err(e),
        None => Ok(rendered),
    }
}

/// Evaluates an action's `when` guard. Missing/empty ⇒ true. A value wrapped
/// in `{{ ... }}` has the braces stripped before evaluation. The guard
/// expression is always evaluated; the falsy/truthy keyword check below
/// (`"false"/"0"/"no"/""` / `"true"/"1"/"yes"`) is applied to the *resolved
/// value*, and only when that value is itself a string — a cell whose
/// content is the literal text `"false"` must read as falsy even though
/// `Value::is_truthy` would otherwise treat any non-empty string as true.
/// Anything else falls back to that value's own truthiness.
pub fn evaluate_guard(
    when: Option<&str>,
    ctx: &Context,
    today: NaiveDate,
) -> Result<bool, RuleEvaluationError> {
    let raw = match when {
        None => return Ok(true),
        Some(s) if s.trim().is_empty() => return Ok(true),
        Some(s) => s.trim(),
    };

    let stripped = raw
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .map(|s| s.trim())
        .unwrap_or(raw);

    let expr = notify_rules::compile(stripped)?;
    let value = notify_rules::eval(&expr, ctx, today)?;

    if let notify_schemas::Value::Str(s) = &value {
        match s.trim().to_lowercase().as_str() {
            "" | "false" | "0" | "no" => return Ok(false),
            "true" | "1" | "yes" => return Ok(true),
            _ => {}
        }
    }

    Ok(value.is_truthy())
}

/// Renders every string-valued field of `action` except `when`.
pub fn render_action(
    action: &Action,
    ctx: &Context,
    today: NaiveDate,
) -> Result<RenderedAction, RuleEvaluationError> {
    let to = match &action.to {
        Some(t) => Some(render_template(t, ctx, today)?),
        None => None,
    };
    let subject = match &action.subject {
        Some(s) => Some(render_template(s, ctx, today)?),
        None => None,
    };
    let template = action.template.clone();

    let mut extra = std::collections::BTreeMap::new();
    for (k, v) in &action.extra {
        if let Json::String(s) = v {
            extra.insert(k.clone(), render_template(s, ctx, today)?);
        }
    }

    Ok(RenderedAction {
        action_type: action.action_type.clone(),
        channel: action.channel_key(),
        to,
        subject,
        template,
        extra,
    })
}
