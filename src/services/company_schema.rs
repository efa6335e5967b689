// ============================================================================
// Company / Schema Resolution
// ============================================================================
//
// Maps the company key a caller selects (`4B-BIO`, `4B-ORANG`, ...) to the
// HANA schema holding that company's data. The `SAP_COMPANY_DB` setting is
// normalized once, at load time, into a typed mapping; resolution afterwards
// is a pure lookup and never fails.
//
// ============================================================================

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::setting::SAP_COMPANY_DB;
use crate::utils::log_sanitizer::sanitize_for_log;

pub const DEFAULT_SCHEMA: &str = "4B-BIO_APP";

/// Companies every installation knows about, with their schemas.
const KNOWN_COMPANIES: [(&str, &str); 2] = [("4B-BIO", "4B-BIO_APP"), ("4B-ORANG", "4B-ORANG_APP")];

#[derive(Error, Debug, PartialEq)]
pub enum CompanyDbParseError {
    #[error("setting value is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Strip surrounding whitespace and stray quote characters.
pub fn clean_token(raw: &str) -> &str {
    raw.trim().trim_matches(['"', '\'']).trim()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Company key to schema name, as configured in the `SAP_COMPANY_DB` setting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyDbMapping {
    entries: BTreeMap<String, String>,
}

impl CompanyDbMapping {
    /// Accepts a JSON object, or a string holding a JSON-encoded object
    /// (possibly encoded twice). Keys and values are cleaned; entries whose
    /// value is not a string are skipped.
    pub fn from_setting_value(value: &Value) -> Result<Self, CompanyDbParseError> {
        let mut current = value.clone();

        // Unwrap at most two levels of string encoding
        for _ in 0..2 {
            let decoded: Value = match &current {
                Value::String(raw) => serde_json::from_str(raw.trim())
                    .map_err(|e| CompanyDbParseError::InvalidJson(e.to_string()))?,
                _ => break,
            };
            current = decoded;
        }

        let object = match current {
            Value::Object(map) => map,
            other => return Err(CompanyDbParseError::NotAnObject(kind_of(&other))),
        };

        let entries = object
            .iter()
            .filter_map(|(key, value)| {
                let key = clean_token(key);
                let value = clean_token(value.as_str()?);
                if key.is_empty() || value.is_empty() {
                    return None;
                }
                Some((key.to_string(), value.to_string()))
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str).or_else(|| {
            self.entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompanyOption {
    pub key: String,
    pub schema: String,
}

/// Canonical company for a spelling such as `4b_bio`, `4B BIO` or `4B-BIO_APP`.
fn known_company_schema(key: &str) -> Option<&'static str> {
    let normalized = key.to_ascii_uppercase().replace(['_', ' '], "-");
    let normalized = normalized.strip_suffix("-APP").unwrap_or(&normalized);

    KNOWN_COMPANIES
        .iter()
        .find(|(company, _)| *company == normalized)
        .map(|(_, schema)| *schema)
}

#[derive(Debug, Clone, Default)]
pub struct SchemaResolver {
    mapping: CompanyDbMapping,
    default_schema: Option<String>,
}

impl SchemaResolver {
    pub fn new(mapping: CompanyDbMapping, default_schema: Option<String>) -> Self {
        let default_schema = default_schema
            .as_deref()
            .map(clean_token)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Self {
            mapping,
            default_schema,
        }
    }

    /// Build from the raw setting value. A malformed setting is logged and
    /// the hardcoded companies are used instead.
    pub fn from_setting(value: Option<&Value>, default_schema: Option<String>) -> Self {
        let mapping = match value {
            Some(value) => match CompanyDbMapping::from_setting_value(value) {
                Ok(mapping) => mapping,
                Err(e) => {
                    tracing::warn!(
                        "⚠️  {} setting is malformed ({}), using built-in companies",
                        SAP_COMPANY_DB,
                        e
                    );
                    CompanyDbMapping::default()
                }
            },
            None => {
                tracing::debug!("{} setting not found, using built-in companies", SAP_COMPANY_DB);
                CompanyDbMapping::default()
            }
        };

        Self::new(mapping, default_schema)
    }

    pub fn resolve(&self, key: &str) -> String {
        let key = clean_token(key);

        if key.is_empty() {
            return self
                .default_schema
                .clone()
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        }

        if let Some(schema) = self.mapping.get(key) {
            return schema.to_string();
        }

        if let Some(schema) = known_company_schema(key) {
            return schema.to_string();
        }

        tracing::debug!(
            "Unknown company key '{}', using {}",
            sanitize_for_log(key),
            DEFAULT_SCHEMA
        );
        DEFAULT_SCHEMA.to_string()
    }

    pub fn company_options(&self) -> Vec<CompanyOption> {
        if self.mapping.is_empty() {
            return KNOWN_COMPANIES
                .iter()
                .map(|(key, schema)| CompanyOption {
                    key: key.to_string(),
                    schema: schema.to_string(),
                })
                .collect();
        }

        self.mapping
            .iter()
            .map(|(key, schema)| CompanyOption {
                key: key.to_string(),
                schema: schema.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_orang_without_setting() {
        let resolver = SchemaResolver::from_setting(None, None);
        assert_eq!(resolver.resolve("4B-ORANG"), "4B-ORANG_APP");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = SchemaResolver::from_setting(Some(&json!({"4B-BIO": "4B-BIO_APP"})), None);
        let first = resolver.resolve("4B-ORANG");
        let second = resolver.resolve("4B-ORANG");
        assert_eq!(first, second);
    }

    #[test]
    fn test_aliases() {
        let resolver = SchemaResolver::default();
        for alias in ["4B-BIO", "4b_bio", "4B BIO", "4B-BIO-APP", "4B-BIO_APP"] {
            assert_eq!(resolver.resolve(alias), "4B-BIO_APP", "alias {}", alias);
        }
        for alias in ["4B-ORANG", "4b_orang", "4B ORANG", "4B-ORANG-APP", "4B-ORANG_APP"] {
            assert_eq!(resolver.resolve(alias), "4B-ORANG_APP", "alias {}", alias);
        }
    }

    #[test]
    fn test_configured_mapping_wins() {
        let resolver = SchemaResolver::from_setting(
            Some(&json!({" \"4B-BIO\" ": "'4B-BIO_TEST'", "4B-ORANG": 7})),
            None,
        );
        assert_eq!(resolver.resolve("4B-BIO"), "4B-BIO_TEST");
        // non-string value skipped, falls through to the alias table
        assert_eq!(resolver.resolve("4B-ORANG"), "4B-ORANG_APP");
    }

    #[test]
    fn test_string_encoded_settings() {
        let once = json!("{\"4B-BIO\": \"BIO_SCHEMA\"}");
        let mapping = CompanyDbMapping::from_setting_value(&once).unwrap();
        assert_eq!(mapping.get("4B-BIO"), Some("BIO_SCHEMA"));

        let twice = Value::String(serde_json::to_string(&once).unwrap());
        let mapping = CompanyDbMapping::from_setting_value(&twice).unwrap();
        assert_eq!(mapping.get("4b-bio"), Some("BIO_SCHEMA"));
    }

    #[test]
    fn test_malformed_setting_falls_back() {
        assert!(matches!(
            CompanyDbMapping::from_setting_value(&json!("not json")),
            Err(CompanyDbParseError::InvalidJson(_))
        ));
        assert_eq!(
            CompanyDbMapping::from_setting_value(&json!([1, 2])),
            Err(CompanyDbParseError::NotAnObject("an array"))
        );

        let resolver = SchemaResolver::from_setting(Some(&json!(42)), None);
        assert_eq!(resolver.resolve("4B-ORANG"), "4B-ORANG_APP");
    }

    #[test]
    fn test_empty_key_uses_default_schema() {
        let resolver = SchemaResolver::new(CompanyDbMapping::default(), Some("\"4B-ORANG_APP\"".to_string()));
        assert_eq!(resolver.resolve("  "), "4B-ORANG_APP");
        assert_eq!(SchemaResolver::default().resolve(""), DEFAULT_SCHEMA);
    }

    #[test]
    fn test_unknown_key_defaults() {
        assert_eq!(SchemaResolver::default().resolve("ACME"), DEFAULT_SCHEMA);
    }

    #[test]
    fn test_company_options() {
        let defaults = SchemaResolver::default().company_options();
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults[1].schema, "4B-ORANG_APP");

        let configured = SchemaResolver::new(CompanyDbMapping::from_pairs([("X", "X_APP")]), None);
        assert_eq!(
            configured.company_options(),
            vec![CompanyOption {
                key: "X".to_string(),
                schema: "X_APP".to_string()
            }]
        );
    }
}
