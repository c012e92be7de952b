//! Template-expands action fields and evaluates `when` guards, and the
//! quiet-hours gate that decides whether *now* permits live delivery.
//!
//! It does **not**: decide inline-vs-queued dispatch or invoke adapters —
//! that is `notify-dispatch`'s job.

mod quiet_hours;
mod renderer;

use std::collections::BTreeMap;

pub use quiet_hours::QuietHours;
pub use renderer::{evaluate_guard, render_action, render_template};

#[derive(Debug, Clone)]
pub struct RenderedAction {
    pub action_type: String,
    pub channel: String,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub template: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl RenderedAction {
    /// The rendered (template-expanded) view of this action, as delivered to
    /// adapters and enqueued workers — never the raw, unexpanded `Action`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("type".to_string(), serde_json::Value::String(self.action_type.clone()));
        map.insert("channel".to_string(), serde_json::Value::String(self.channel.clone()));
        if let Some(to) = &self.to {
            map.insert("to".to_string(), serde_json::Value::String(to.clone()));
        }
        if let Some(subject) = &self.subject {
            map.insert("subject".to_string(), serde_json::Value::String(subject.clone()));
        }
        if let Some(template) = &self.template {
            map.insert("template".to_string(), serde_json::Value::String(template.clone()));
        }
        for (k, v) in &self.extra {
            map.insert(k.clone(), serde_json::Value::String(v.clone()));
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use notify_schemas::{Action, Context, Value};
    use std::collections::BTreeMap as Map;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn ctx() -> Context {
        let mut row = Map::new();
        row.insert("telefono".to_string(), Value::Str("+34111".to_string()));
        let mut rule_results = Map::new();
        rule_results.insert("debe_notificar".to_string(), true);
        Context::new(row, rule_results)
    }

    #[test]
    fn renders_dotted_row_access() {
        let rendered = render_template("to {{ row.telefono }}", &ctx(), today()).unwrap();
        assert_eq!(rendered, "to +34111");
    }

    #[test]
    fn guard_defaults_true_when_missing() {
        assert!(evaluate_guard(None, &ctx(), today()).unwrap());
    }

    #[test]
    fn guard_strips_braces_before_eval() {
        let ok = evaluate_guard(Some("{{ rule_results.debe_notificar }}"), &ctx(), today()).unwrap();
        assert!(ok);
    }

    #[test]
    fn guard_literal_false_short_circuits() {
        assert!(!evaluate_guard(Some("false"), &ctx(), today()).unwrap());
    }

    #[test]
    fn guard_resolved_string_value_false_keyword_is_falsy() {
        // A row cell whose literal text is "false" must read as falsy even
        // though it's a non-empty string — the keyword check applies to the
        // resolved value, not the guard's source text.
        let mut row = Map::new();
        row.insert("estado".to_string(), Value::Str("false".to_string()));
        let ctx = Context::new(row, Map::new());
        assert!(!evaluate_guard(Some("row.estado"), &ctx, today()).unwrap());
    }

    #[test]
    fn guard_resolved_string_value_non_keyword_is_truthy() {
        // A resolved string that isn't one of the keyword literals falls
        // back to plain string truthiness (non-empty ⇒ true).
        let mut row = Map::new();
        row.insert("estado".to_string(), Value::Str("activo".to_string()));
        let ctx = Context::new(row, Map::new());
        assert!(evaluate_guard(Some("row.estado"), &ctx, today()).unwrap());
    }

    #[test]
    fn render_action_does_not_mutate_input() {
        let action = Action {
            action_type: "notify".into(),
            channel: "whatsapp".into(),
            when: Some("{{ rule_results.debe_notificar }}".into()),
            to: Some("{{ row.telefono }}".into()),
            subject: None,
            template: None,
            extra: Default::default(),
        };
        let before = action.to.clone();
        let rendered = render_action(&action, &ctx(), today()).unwrap();
        assert_eq!(rendered.to.as_deref(), Some("+34111"));
        assert_eq!(action.to, before);
    }
}
