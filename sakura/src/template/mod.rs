//! String interpolation against a value environment.
//!
//! Blossom values may contain `{{name}}` placeholders that are rendered
//! against the environment right before validation-free execution. A string
//! consisting of exactly one placeholder resolves to the named value itself,
//! so structured values pass through loops and subtree calls unchanged.

use thiserror::Error;

use crate::value::{Value, ValueMap};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("undefined name \"{0}\" in template")]
    UndefinedName(String),
    #[error("unclosed \"{{{{\" in template")]
    UnclosedPlaceholder,
}

/// Renders `{{name}}` placeholders in `template` to their display form.
pub fn render(template: &str, env: &ValueMap) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or(TemplateError::UnclosedPlaceholder)?;
        let name = after[..end].trim();
        let value = env
            .get(name)
            .ok_or_else(|| TemplateError::UndefinedName(name.to_string()))?;
        out.push_str(&value.to_string());
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Resolves one value against the environment.
///
/// Strings that are exactly one placeholder return a deep copy of the named
/// value; other strings with placeholders are rendered; arrays and maps are
/// resolved element-wise; everything else passes through.
pub fn resolve_value(value: &Value, env: &ValueMap) -> Result<Value, TemplateError> {
    match value {
        Value::String(text) => {
            if let Some(name) = single_placeholder(text) {
                return env
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TemplateError::UndefinedName(name.to_string()));
            }
            if text.contains("{{") {
                return Ok(Value::String(render(text, env)?));
            }
            Ok(value.clone())
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(item, env))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Map(entries) => entries
            .iter()
            .map(|(key, entry)| resolve_value(entry, env).map(|v| (key.clone(), v)))
            .collect::<Result<ValueMap, _>>()
            .map(Value::Map),
        other => Ok(other.clone()),
    }
}

/// Resolves every entry of a value map against the environment.
pub fn resolve_map(values: &ValueMap, env: &ValueMap) -> Result<ValueMap, TemplateError> {
    values
        .iter()
        .map(|(key, value)| resolve_value(value, env).map(|v| (key.clone(), v)))
        .collect()
}

/// Returns the placeholder name when the whole string is one `{{name}}`.
fn single_placeholder(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}
