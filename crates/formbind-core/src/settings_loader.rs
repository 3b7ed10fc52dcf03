//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `FORMBIND_DEBUG` | `debug` |
//! | `FORMBIND_LOG_LEVEL` | `log_level` |
//! | `FORMBIND_VALIDATE_ON_WRITE` | `validate_on_write` |
//! | `FORMBIND_WRITE_METHODS` | `write_methods` (comma-separated) |
//! | `FORMBIND_CHOICE_PREVIEW_LIMIT` | `choice_preview_limit` |
//! | `FORMBIND_LIST_PLACEHOLDER` | `list_placeholder` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use formbind_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/formbind.toml").unwrap();
//! formbind_core::SETTINGS.configure(settings);
//! ```

use std::path::Path;

use crate::error::FormError;
use crate::settings::Settings;

const ENV_PREFIX: &str = "FORMBIND_";

/// Loads settings from a TOML string.
///
/// Keys missing from the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, FormError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| FormError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_onto_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, FormError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, FormError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, FormError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| FormError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_onto_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, FormError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, FormError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `FORMBIND_*` environment variable overrides to a settings struct.
///
/// Unparseable numeric values are ignored and the previous value is kept.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |key| std::env::var(format!("{ENV_PREFIX}{key}")).ok());
}

fn apply_overrides_from(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("DEBUG") {
        settings.debug = parse_flag(&val);
    }

    if let Some(val) = lookup("LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("VALIDATE_ON_WRITE") {
        settings.validate_on_write = parse_flag(&val);
    }

    if let Some(val) = lookup("WRITE_METHODS") {
        settings.write_methods = val
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Some(val) = lookup("CHOICE_PREVIEW_LIMIT") {
        if let Ok(limit) = val.trim().parse::<usize>() {
            settings.choice_preview_limit = limit;
        }
    }

    if let Some(val) = lookup("LIST_PLACEHOLDER") {
        settings.list_placeholder = parse_flag(&val);
    }
}

// ============================================================
// Helpers
// ============================================================

fn parse_flag(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn read_config(path: &Path, format: &str) -> Result<String, FormError> {
    std::fs::read_to_string(path).map_err(|e| {
        FormError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_onto_defaults(overrides: serde_json::Value, format: &str) -> Result<Settings, FormError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        FormError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, overrides);
    serde_json::from_value(merged).map_err(|e| {
        FormError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_v) => merge_json(base_v, override_v),
                    None => override_v,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = false
            validate_on_write = false
            choice_preview_limit = 5
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert!(!settings.validate_on_write);
        assert_eq!(settings.choice_preview_limit, 5);
        // Defaults preserved
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.write_methods.len(), 3);
    }

    #[test]
    fn test_from_toml_str_write_methods() {
        let settings = from_toml_str(r#"write_methods = ["POST", "DELETE"]"#).unwrap();
        assert_eq!(settings.write_methods, vec!["POST", "DELETE"]);
        assert!(settings.is_write_method("delete"));
        assert!(!settings.is_write_method("PUT"));
    }

    #[test]
    fn test_from_toml_str_extra_table() {
        let toml = r#"
            [extra]
            theme = "dark"
        "#;
        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.extra.get("theme"), Some(&serde_json::json!("dark")));
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert!(settings.debug);
        assert!(settings.validate_on_write);
    }

    #[test]
    fn test_from_toml_str_invalid() {
        let result = from_toml_str("[[invalid toml content");
        assert!(matches!(result, Err(FormError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_toml_str_wrong_type() {
        let result = from_toml_str(r#"choice_preview_limit = "ten""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_str_basic() {
        let json = r#"{ "log_level": "debug", "list_placeholder": false }"#;
        let settings = from_json_str(json).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert!(!settings.list_placeholder);
        assert_eq!(settings.choice_preview_limit, 10);
    }

    #[test]
    fn test_from_json_str_invalid() {
        assert!(from_json_str("{not json").is_err());
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = from_toml_file("/definitely/not/here/formbind.toml");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read TOML file"));
    }

    #[test]
    fn test_from_json_file_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("formbind-settings-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "choice_preview_limit": 2 }"#).unwrap();
        let settings = from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(settings.choice_preview_limit, 2);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("DEBUG", "0"),
            ("LOG_LEVEL", "warn"),
            ("VALIDATE_ON_WRITE", "no"),
            ("WRITE_METHODS", "post, delete ,"),
            ("CHOICE_PREVIEW_LIMIT", "4"),
            ("LIST_PLACEHOLDER", "false"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        apply_overrides_from(&mut settings, |k| vars.get(k).map(ToString::to_string));

        assert!(!settings.debug);
        assert_eq!(settings.log_level, "warn");
        assert!(!settings.validate_on_write);
        assert_eq!(settings.write_methods, vec!["POST", "DELETE"]);
        assert_eq!(settings.choice_preview_limit, 4);
        assert!(!settings.list_placeholder);
    }

    #[test]
    fn test_overrides_ignore_bad_numbers() {
        let mut settings = Settings::default();
        apply_overrides_from(&mut settings, |k| {
            (k == "CHOICE_PREVIEW_LIMIT").then(|| "lots".to_string())
        });
        assert_eq!(settings.choice_preview_limit, 10);
    }

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"a": {"b": 1, "c": 2}, "d": 3});
        let over = serde_json::json!({"a": {"c": 20}});
        let merged = merge_json(base, over);
        assert_eq!(merged, serde_json::json!({"a": {"b": 1, "c": 20}, "d": 3}));
    }
}
