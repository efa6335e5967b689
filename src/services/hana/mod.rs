// SAP HANA query layer
// Parameterized statements against the Business One tables, executed on a
// per-call connection scoped with SET SCHEMA, rows normalized to JSON objects

pub mod browse;
pub mod connection;
pub mod ledger;
pub mod queries;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

pub use browse::BrowseRequest;
pub use connection::HdbConnector;
pub use ledger::LedgerFilter;
pub use queries::{ProductCatalogFilter, TargetFilter, TargetKind, TerritoryStatus};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum HanaError {
    #[error("HANA connection is not configured: {0}")]
    NotConfigured(String),

    #[error("Could not connect to HANA: {0}")]
    Connect(String),

    #[error("HANA did not answer within {0}s")]
    Timeout(u64),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Unexpected result shape: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, HanaError>;

// ============================================================================
// Statements
// ============================================================================

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Int(i64),
    Text(String),
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(value: NaiveDate) -> Self {
        SqlParam::Text(value.format("%Y-%m-%d").to_string())
    }
}

/// SQL text with `?` placeholders and its parameters, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct HanaQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl HanaQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, param: impl Into<SqlParam>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// Quote an identifier for HANA, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// The statement every connection runs before querying a company database.
pub fn set_schema_statement(schema: &str) -> String {
    format!("SET SCHEMA {}", quote_ident(schema))
}

// ============================================================================
// Connector
// ============================================================================

pub type HanaRow = serde_json::Map<String, Value>;

/// Executes one statement on a fresh connection scoped to `schema`.
#[async_trait]
pub trait HanaConnector: Send + Sync {
    async fn fetch_all(&self, schema: &str, query: &HanaQuery) -> Result<Vec<HanaRow>>;

    async fn fetch_one(&self, schema: &str, query: &HanaQuery) -> Result<Option<HanaRow>> {
        Ok(self.fetch_all(schema, query).await?.into_iter().next())
    }
}

// ============================================================================
// Row accessors
// ============================================================================

/// Typed access to normalized rows. Column lookup falls back to a
/// case-insensitive match because HANA upper-cases unquoted aliases.
pub trait RowExt {
    fn column(&self, name: &str) -> Option<&Value>;

    fn get_string(&self, name: &str) -> Option<String> {
        match self.column(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.trim().to_string()),
            other => Some(other.to_string()),
        }
    }

    fn get_i64(&self, name: &str) -> Option<i64> {
        match self.column(name)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn get_decimal(&self, name: &str) -> Option<Decimal> {
        let raw = match self.column(name)? {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => return None,
        };
        Decimal::from_str(&raw)
            .or_else(|_| Decimal::from_scientific(&raw))
            .ok()
    }

    fn get_date(&self, name: &str) -> Option<NaiveDate> {
        let raw = self.get_string(name)?;
        let date_part = raw.get(..10)?;
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }
}

impl RowExt for HanaRow {
    fn column(&self, name: &str) -> Option<&Value> {
        self.get(name).or_else(|| {
            self.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> HanaRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("4B-BIO_APP"), "\"4B-BIO_APP\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(set_schema_statement("4B-ORANG_APP"), "SET SCHEMA \"4B-ORANG_APP\"");
    }

    #[test]
    fn test_case_insensitive_columns() {
        let r = row(json!({"TERRITORYID": 12, "TerritoryName": " Multan "}));
        assert_eq!(r.get_i64("TerritoryId"), Some(12));
        assert_eq!(r.get_string("TERRITORYNAME").as_deref(), Some("Multan"));
    }

    #[test]
    fn test_numbers_encoded_as_strings() {
        let r = row(json!({"Target": "1500000.50", "Id": "42", "Sci": "1.5e3"}));
        assert_eq!(r.get_decimal("Target"), Some(Decimal::from_str("1500000.50").unwrap()));
        assert_eq!(r.get_i64("Id"), Some(42));
        assert_eq!(r.get_decimal("Sci"), Some(Decimal::from(1500)));
    }

    #[test]
    fn test_nulls_and_missing() {
        let r = row(json!({"ParentId": null}));
        assert_eq!(r.get_i64("ParentId"), None);
        assert_eq!(r.get_string("Missing"), None);
        assert_eq!(r.get_decimal("ParentId"), None);
    }

    #[test]
    fn test_dates_with_time_component() {
        let r = row(json!({"F_REFDATE": "2024-07-01 00:00:00.000000000", "T": "2024-07-31"}));
        assert_eq!(r.get_date("f_refdate"), NaiveDate::from_ymd_opt(2024, 7, 1));
        assert_eq!(r.get_date("T"), NaiveDate::from_ymd_opt(2024, 7, 31));
    }

    #[test]
    fn test_query_binds_in_order() {
        let q = HanaQuery::new("SELECT 1 FROM DUMMY WHERE a = ? AND b = ?")
            .bind(7i64)
            .bind(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(q.params, vec![SqlParam::Int(7), SqlParam::Text("2024-01-05".to_string())]);
    }
}
