//! Settings schema and resolution.
//!
//! Extensions declare their settings once in the manifest; users supply
//! override values through the host. [`resolve`] combines the two into the
//! effective view a handler sees: override wins over default, both are
//! coerced to the declared type, and an entry with neither resolves to
//! `null` (observable by the script, not an error). Keys absent from the
//! schema never leak into the view.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{ExtensionError, ExtensionResult};

/// Declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Number,
    Boolean,
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingType::String => write!(f, "string"),
            SettingType::Number => write!(f, "number"),
            SettingType::Boolean => write!(f, "boolean"),
        }
    }
}

/// One settings-schema entry, declared in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingSchema {
    pub name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub required: bool,

    #[serde(rename = "type")]
    pub setting_type: SettingType,

    /// Default value, coerced to the declared type at resolution time.
    #[serde(default)]
    pub default: Option<Value>,

    /// Choices presented by a UI; not interpreted by the host.
    #[serde(default)]
    pub options: Vec<SettingOption>,
}

/// A selectable option for a setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingOption {
    pub label: String,
    pub value: Value,
}

/// Compute the effective settings view for one extension instance.
///
/// Exactly the schema's keys appear in the result. For each entry the
/// resolved value is the coerced override if present, else the coerced
/// default, else `null`. An uncoercible override fails with
/// [`ExtensionError::SettingsType`] before any handler runs.
pub fn resolve(
    schema: &[SettingSchema],
    overrides: &HashMap<String, Value>,
) -> ExtensionResult<Map<String, Value>> {
    let mut view = Map::new();
    for entry in schema {
        let raw = overrides
            .get(&entry.name)
            .filter(|v| !v.is_null())
            .or(entry.default.as_ref());
        let value = match raw {
            Some(v) => coerce(v, entry.setting_type).ok_or_else(|| {
                ExtensionError::SettingsType {
                    key: entry.name.clone(),
                    expected: entry.setting_type,
                    value: v.to_string(),
                }
            })?,
            None => Value::Null,
        };
        view.insert(entry.name.clone(), value);
    }
    Ok(view)
}

/// Coerce a raw value to the declared type. `None` means no coercion exists.
fn coerce(value: &Value, ty: SettingType) -> Option<Value> {
    match ty {
        SettingType::String => match value {
            Value::String(s) => Some(Value::String(s.clone())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        SettingType::Number => match value {
            Value::Number(n) => Some(Value::Number(n.clone())),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        SettingType::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, ty: SettingType, default: Option<Value>) -> SettingSchema {
        SettingSchema {
            name: name.to_string(),
            title: String::new(),
            description: String::new(),
            required: false,
            setting_type: ty,
            default,
            options: Vec::new(),
        }
    }

    #[test]
    fn test_empty_schema_yields_empty_view() {
        let view = resolve(&[], &HashMap::from([("stray".into(), json!("x"))])).unwrap();
        assert!(view.is_empty());
    }

    #[test]
    fn test_no_default_no_override_is_null() {
        let schema = vec![
            entry("string", SettingType::String, None),
            entry("number", SettingType::Number, None),
            entry("boolean", SettingType::Boolean, None),
        ];
        let view = resolve(&schema, &HashMap::new()).unwrap();
        assert_eq!(view["string"], Value::Null);
        assert_eq!(view["number"], Value::Null);
        assert_eq!(view["boolean"], Value::Null);
    }

    #[test]
    fn test_defaults_resolve_exactly() {
        let schema = vec![
            entry("stringDefault", SettingType::String, Some(json!("default"))),
            entry("numberDefault", SettingType::Number, Some(json!(1))),
            entry("booleanDefault", SettingType::Boolean, Some(json!(true))),
        ];
        let view = resolve(&schema, &HashMap::new()).unwrap();
        assert_eq!(view["stringDefault"], json!("default"));
        assert_eq!(view["numberDefault"], json!(1));
        assert_eq!(view["booleanDefault"], json!(true));
    }

    #[test]
    fn test_overrides_win_over_defaults() {
        let schema = vec![
            entry("stringValued", SettingType::String, Some(json!("default"))),
            entry("numberValued", SettingType::Number, Some(json!(1))),
            entry("booleanValued", SettingType::Boolean, Some(json!(false))),
        ];
        let overrides = HashMap::from([
            ("stringValued".to_string(), json!("valued")),
            ("numberValued".to_string(), json!(1.1)),
            ("booleanValued".to_string(), json!(true)),
        ]);
        let view = resolve(&schema, &overrides).unwrap();
        assert_eq!(view["stringValued"], json!("valued"));
        assert_eq!(view["numberValued"], json!(1.1));
        assert_eq!(view["booleanValued"], json!(true));
    }

    #[test]
    fn test_string_coercion() {
        let schema = vec![
            entry("n", SettingType::Number, None),
            entry("b", SettingType::Boolean, None),
            entry("s", SettingType::String, None),
        ];
        let overrides = HashMap::from([
            ("n".to_string(), json!("1.5")),
            ("b".to_string(), json!("true")),
            ("s".to_string(), json!(42)),
        ]);
        let view = resolve(&schema, &overrides).unwrap();
        assert_eq!(view["n"], json!(1.5));
        assert_eq!(view["b"], json!(true));
        assert_eq!(view["s"], json!("42"));
    }

    #[test]
    fn test_uncoercible_override_fails() {
        let schema = vec![entry("n", SettingType::Number, None)];
        let overrides = HashMap::from([("n".to_string(), json!("not a number"))]);
        let err = resolve(&schema, &overrides).unwrap_err();
        assert!(matches!(err, ExtensionError::SettingsType { ref key, .. } if key == "n"));
    }

    #[test]
    fn test_unknown_keys_never_exposed() {
        let schema = vec![entry("known", SettingType::String, None)];
        let overrides = HashMap::from([
            ("known".to_string(), json!("v")),
            ("unknown".to_string(), json!("leak")),
        ]);
        let view = resolve(&schema, &overrides).unwrap();
        assert_eq!(view.len(), 1);
        assert!(view.get("unknown").is_none());
    }

    #[test]
    fn test_null_override_falls_back_to_default() {
        let schema = vec![entry("s", SettingType::String, Some(json!("default")))];
        let overrides = HashMap::from([("s".to_string(), Value::Null)]);
        let view = resolve(&schema, &overrides).unwrap();
        assert_eq!(view["s"], json!("default"));
    }
}
