// HANA over hdbconnect
// Each call opens its own connection, scopes it with SET SCHEMA, runs one
// statement (prepared when it carries parameters) and drops the connection.

use async_trait::async_trait;
use hdbconnect_async::{Connection, HdbValue, ResultSet};
use serde_json::{Map, Number, Value};
use tokio::time::timeout;
use url::Url;

use super::{set_schema_statement, HanaConnector, HanaError, HanaQuery, HanaRow, Result};
use crate::config::HanaConfig;
use crate::utils::log_sanitizer::sanitize_for_log;

pub struct HdbConnector {
    config: HanaConfig,
    connect_url: String,
}

impl HdbConnector {
    pub fn new(config: HanaConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(HanaError::NotConfigured("HANA_HOST is not set".to_string()));
        }
        if config.user.trim().is_empty() {
            return Err(HanaError::NotConfigured("HANA_USER is not set".to_string()));
        }

        let connect_url = connect_url(&config)?;
        Ok(Self { config, connect_url })
    }

    async fn run(&self, schema: &str, query: &HanaQuery) -> Result<Vec<HanaRow>> {
        let connection = Connection::new(self.connect_url.as_str())
            .await
            .map_err(|e| HanaError::Connect(e.to_string()))?;

        connection
            .exec(set_schema_statement(schema))
            .await
            .map_err(|e| HanaError::Query(format!("SET SCHEMA failed: {}", e)))?;

        let result_set = if query.params.is_empty() {
            connection
                .query(query.sql.as_str())
                .await
                .map_err(|e| HanaError::Query(e.to_string()))?
        } else {
            let mut statement = connection
                .prepare(query.sql.as_str())
                .await
                .map_err(|e| HanaError::Query(e.to_string()))?;
            statement
                .execute(&query.params)
                .await
                .map_err(|e| HanaError::Query(e.to_string()))?
                .into_resultset()
                .map_err(|e| HanaError::Decode(e.to_string()))?
        };

        rows_from(result_set).await
    }
}

/// `hdbsql://` URL for the configured server node. TLS switches the scheme
/// to `hdbsqls` and picks the certificate policy.
pub fn connect_url(config: &HanaConfig) -> Result<String> {
    let scheme = if config.encrypt { "hdbsqls" } else { "hdbsql" };
    let mut url = Url::parse(&format!("{}://{}:{}", scheme, config.host.trim(), config.port))
        .map_err(|e| HanaError::NotConfigured(format!("invalid HANA_HOST: {}", e)))?;

    url.set_username(&config.user)
        .and_then(|_| url.set_password(Some(config.password.as_str())))
        .map_err(|_| HanaError::NotConfigured("HANA_HOST cannot carry credentials".to_string()))?;

    if config.encrypt {
        let policy = if config.ssl_validate {
            "use_mozillas_root_certificates"
        } else {
            "insecure_omit_server_certificate_check"
        };
        url.set_query(Some(policy));
    }

    Ok(url.to_string())
}

async fn rows_from(result_set: ResultSet) -> Result<Vec<HanaRow>> {
    let metadata = result_set.metadata();
    let columns: Vec<String> = metadata
        .iter()
        .map(|field| field.displayname().to_string())
        .collect();

    let rows = result_set
        .into_rows()
        .await
        .map_err(|e| HanaError::Decode(e.to_string()))?;

    Ok(rows
        .into_iter()
        .map(|row| {
            columns
                .iter()
                .cloned()
                .zip(row.into_iter().map(|value| json_value(&value)))
                .collect::<Map<String, Value>>()
        })
        .collect())
}

/// Integers stay numbers; decimals, dates and text are carried as strings
/// so `RowExt` parses them without float rounding.
pub fn json_value(value: &HdbValue) -> Value {
    match value {
        HdbValue::NULL => Value::Null,
        HdbValue::TINYINT(v) => Value::Number(Number::from(*v)),
        HdbValue::SMALLINT(v) => Value::Number(Number::from(*v)),
        HdbValue::INT(v) => Value::Number(Number::from(*v)),
        HdbValue::BIGINT(v) => Value::Number(Number::from(*v)),
        HdbValue::BOOLEAN(v) => Value::Bool(*v),
        other if other.is_null() => Value::Null,
        other => Value::String(other.to_string()),
    }
}

#[async_trait]
impl HanaConnector for HdbConnector {
    async fn fetch_all(&self, schema: &str, query: &HanaQuery) -> Result<Vec<HanaRow>> {
        tracing::debug!(
            "HANA query on {}: {}",
            sanitize_for_log(schema),
            sanitize_for_log(&query.sql)
        );

        match timeout(self.config.timeout, self.run(schema, query)).await {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::warn!("⚠️  HANA statement on {} failed: {}", sanitize_for_log(schema), e);
                }
                result
            }
            Err(_) => Err(HanaError::Timeout(self.config.timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(encrypt: bool, ssl_validate: bool) -> HanaConfig {
        HanaConfig {
            host: "hana.local".to_string(),
            port: 30015,
            user: "PORTAL".to_string(),
            password: "p@ss:word".to_string(),
            default_schema: None,
            encrypt,
            ssl_validate,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_missing_host_is_not_configured() {
        let mut cfg = config(false, false);
        cfg.host = String::new();
        assert!(matches!(HdbConnector::new(cfg), Err(HanaError::NotConfigured(_))));
    }

    #[test]
    fn test_plain_url() {
        let url = connect_url(&config(false, false)).unwrap();
        assert!(url.starts_with("hdbsql://PORTAL:"));
        assert!(url.ends_with("@hana.local:30015"));
        assert!(!url.contains("p@ss:word"));
    }

    #[test]
    fn test_tls_policies() {
        let unchecked = connect_url(&config(true, false)).unwrap();
        assert!(unchecked.starts_with("hdbsqls://"));
        assert!(unchecked.ends_with("?insecure_omit_server_certificate_check"));

        let validated = connect_url(&config(true, true)).unwrap();
        assert!(validated.ends_with("?use_mozillas_root_certificates"));
    }

    #[test]
    fn test_value_mapping() {
        assert_eq!(json_value(&HdbValue::NULL), Value::Null);
        assert_eq!(json_value(&HdbValue::INT(-1)), Value::from(-1));
        assert_eq!(json_value(&HdbValue::BIGINT(5_000_000_000)), Value::from(5_000_000_000i64));
        assert_eq!(
            json_value(&HdbValue::STRING("Multan".to_string())),
            Value::String("Multan".to_string())
        );
    }
}
