// Generic read-only table browse.
//
// Every identifier is checked against a whitelist pattern before it reaches
// the statement; filter values are bound. Anything that fails validation is
// dropped, and an unusable table name yields no query at all.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::{quote_ident, HanaQuery};

static PLAIN_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_@.]+$").expect("valid identifier regex"));
static QUOTED_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"[^"]+"$"#).expect("valid quoted identifier regex"));

pub const MAX_BROWSE_ROWS: u32 = 1_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowseRequest {
    pub table: String,
    /// Comma-separated column list, `*` when empty.
    #[serde(default)]
    pub select: Option<String>,
    /// Comma-separated `column:value` equality filters.
    #[serde(default)]
    pub filters: Option<String>,
    /// Comma-separated `column [ASC|DESC]` terms.
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

fn is_valid_ident(ident: &str) -> bool {
    PLAIN_IDENT.is_match(ident) || QUOTED_IDENT.is_match(ident)
}

fn quote_part(part: &str) -> String {
    if QUOTED_IDENT.is_match(part) {
        part.to_string()
    } else {
        quote_ident(part)
    }
}

fn split_terms(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
}

impl BrowseRequest {
    fn table_ref(&self) -> Option<String> {
        let table = self.table.trim();
        if table.is_empty() || !PLAIN_IDENT.is_match(table) {
            return None;
        }

        match table.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
                Some(format!("{}.{}", quote_part(schema), quote_part(name)))
            }
            Some(_) => None,
            None => Some(quote_part(table)),
        }
    }

    /// Build the statement, or `None` when the table name is unusable.
    pub fn to_query(&self) -> Option<HanaQuery> {
        let table_ref = self.table_ref()?;

        let columns: Vec<&str> = split_terms(self.select.as_deref())
            .filter(|col| *col == "*" || is_valid_ident(col))
            .collect();
        let columns = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(",")
        };

        let mut query = HanaQuery::new(String::new());
        let mut conditions = Vec::new();
        for pair in split_terms(self.filters.as_deref()) {
            if let Some((column, value)) = pair.split_once(':') {
                let column = column.trim();
                if !column.is_empty() && is_valid_ident(column) {
                    conditions.push(format!("{} = ?", column));
                    query = query.bind(value.trim());
                }
            }
        }

        let mut order_terms = Vec::new();
        for term in split_terms(self.order.as_deref()) {
            let mut tokens = term.split_whitespace();
            let column = tokens.next().unwrap_or_default();
            if column.is_empty() || !is_valid_ident(column) {
                continue;
            }
            match tokens.next().map(str::to_ascii_uppercase).as_deref() {
                Some(dir @ ("ASC" | "DESC")) => order_terms.push(format!("{} {}", column, dir)),
                _ => order_terms.push(column.to_string()),
            }
        }

        let mut sql = format!("SELECT {} FROM {}", columns, table_ref);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        if !order_terms.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_terms.join(", "));
        }

        let limit = self.limit.unwrap_or(100).clamp(1, MAX_BROWSE_ROWS);
        sql.push_str(&format!(" LIMIT {}", limit));
        if let Some(offset) = self.offset.filter(|o| *o > 0) {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        query.sql = sql;
        Some(query)
    }
}
