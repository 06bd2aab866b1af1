//! # Step Context
//!
//! Holds the outputs of the plan steps that already ran and resolves `#name`
//! references in the parameters of the next step.
//!
//! A parameter that is exactly one reference (`"#E1"`) is replaced by the
//! referenced value with its JSON type intact. References embedded in longer
//! text are rendered as text. References to names that have no output yet
//! stay literal.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;

static REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([A-Za-z_][A-Za-z0-9_]*)").expect("valid reference pattern"));

static WHOLE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([A-Za-z_][A-Za-z0-9_]*)$").expect("valid reference pattern"));

/// Outputs recorded so far in one plan run
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    outputs: BTreeMap<String, Value>,
}

impl StepContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step output under its variable name
    pub fn bind(&mut self, variable: impl Into<String>, value: Value) {
        self.outputs.insert(variable.into(), value);
    }

    /// Output recorded under `variable`
    pub fn get(&self, variable: &str) -> Option<&Value> {
        self.outputs.get(variable)
    }

    /// All recorded outputs
    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.outputs
    }

    /// Consume the context, keeping the outputs
    pub fn into_outputs(self) -> BTreeMap<String, Value> {
        self.outputs
    }

    /// Resolve references in every parameter
    pub fn resolve_parameters(&self, parameters: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        parameters
            .iter()
            .map(|(name, value)| (name.clone(), self.resolve(value)))
            .collect()
    }

    /// Resolve references inside one value, descending into arrays and
    /// objects
    pub fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::String(text) => self.resolve_text(text),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_text(&self, text: &str) -> Value {
        if let Some(caps) = WHOLE_REFERENCE.captures(text) {
            if let Some(bound) = self.outputs.get(&caps[1]) {
                return bound.clone();
            }
            return Value::String(text.to_string());
        }

        let rendered = REFERENCE.replace_all(text, |caps: &Captures| match self.outputs.get(&caps[1]) {
            Some(bound) => render_inline(bound),
            None => caps[0].to_string(),
        });
        Value::String(rendered.into_owned())
    }
}

/// Strings are spliced in without quotes, everything else as compact JSON
fn render_inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> StepContext {
        let mut ctx = StepContext::new();
        ctx.bind("E1", json!("sunny, 24C"));
        ctx.bind("E2", json!({"items": [1, 2, 3]}));
        ctx.bind("count", json!(3));
        ctx
    }

    #[test]
    fn test_whole_reference_keeps_json_type() {
        let ctx = context();
        assert_eq!(ctx.resolve(&json!("#E2")), json!({"items": [1, 2, 3]}));
        assert_eq!(ctx.resolve(&json!("#count")), json!(3));
    }

    #[test]
    fn test_embedded_reference_is_rendered_as_text() {
        let ctx = context();
        assert_eq!(
            ctx.resolve(&json!("Weather: #E1 (#count sources)")),
            json!("Weather: sunny, 24C (3 sources)")
        );
        assert_eq!(
            ctx.resolve(&json!("data=#E2")),
            json!(r#"data={"items":[1,2,3]}"#)
        );
    }

    #[test]
    fn test_unknown_reference_stays_literal() {
        let ctx = context();
        assert_eq!(ctx.resolve(&json!("#E9")), json!("#E9"));
        assert_eq!(ctx.resolve(&json!("use #E9 and #E1")), json!("use #E9 and sunny, 24C"));
    }

    #[test]
    fn test_nested_values_and_non_strings() {
        let ctx = context();
        let resolved = ctx.resolve(&json!({"q": ["#E1", 7, {"n": "#count"}], "flag": true}));
        assert_eq!(
            resolved,
            json!({"q": ["sunny, 24C", 7, {"n": 3}], "flag": true})
        );
    }

    #[test]
    fn test_resolve_parameters() {
        let ctx = context();
        let mut params = BTreeMap::new();
        params.insert("query".to_string(), json!("summarize #E1"));
        params.insert("limit".to_string(), json!(5));

        let resolved = ctx.resolve_parameters(&params);
        assert_eq!(resolved["query"], json!("summarize sunny, 24C"));
        assert_eq!(resolved["limit"], json!(5));
    }
}
