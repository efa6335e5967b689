// General ledger statements: journal lines (OJDT/JDT1), chart of accounts,
// opening balances and the lists that feed the ledger filters.

use chrono::NaiveDate;

use super::HanaQuery;

/// Largest page the ledger report serves.
pub const MAX_LEDGER_PAGE_SIZE: u32 = 1_000;
/// Default and largest row count of the business partner list.
pub const BUSINESS_PARTNER_LOV_LIMIT: u32 = 1_000;

/// Journal line filters. Every field is optional; blank strings count as
/// absent. `bp_codes` with more than one entry becomes an IN list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerFilter {
    pub account_from: Option<String>,
    pub account_to: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub bp_codes: Vec<String>,
    pub project_code: Option<String>,
    pub trans_type: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl LedgerFilter {
    /// The single business partner, when exactly one is selected.
    pub fn single_bp_code(&self) -> Option<&str> {
        match self.bp_codes.as_slice() {
            [code] => Some(code.as_str()),
            _ => None,
        }
    }

    fn where_clause(&self, mut query: HanaQuery) -> (String, HanaQuery) {
        let mut clauses: Vec<String> = Vec::new();

        if let Some(account) = present(&self.account_from) {
            clauses.push("T1.\"Account\" >= ?".to_string());
            query = query.bind(account);
        }
        if let Some(account) = present(&self.account_to) {
            clauses.push("T1.\"Account\" <= ?".to_string());
            query = query.bind(account);
        }
        if let Some(from) = self.from_date {
            clauses.push("T0.\"RefDate\" >= TO_DATE(?, 'YYYY-MM-DD')".to_string());
            query = query.bind(from);
        }
        if let Some(to) = self.to_date {
            clauses.push("T0.\"RefDate\" <= TO_DATE(?, 'YYYY-MM-DD')".to_string());
            query = query.bind(to);
        }

        let codes: Vec<&str> = self
            .bp_codes
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        match codes.len() {
            0 => {}
            1 => {
                clauses.push("T1.\"ShortName\" = ?".to_string());
                query = query.bind(codes[0]);
            }
            n => {
                clauses.push(format!("T1.\"ShortName\" IN ({})", vec!["?"; n].join(", ")));
                for code in codes {
                    query = query.bind(code);
                }
            }
        }

        if let Some(project) = present(&self.project_code) {
            clauses.push("T1.\"Project\" = ?".to_string());
            query = query.bind(project);
        }
        if let Some(trans_type) = present(&self.trans_type) {
            clauses.push("T0.\"TransType\" = ?".to_string());
            query = query.bind(trans_type);
        }

        if clauses.is_empty() {
            (String::new(), query)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), query)
        }
    }
}

/// One page of journal lines with account, partner, project and invoice
/// line details, ordered for running balances per account.
pub fn general_ledger_report(filter: &LedgerFilter, limit: u32, offset: u64) -> HanaQuery {
    let (where_sql, query) = filter.where_clause(HanaQuery::new(String::new()));
    let limit = limit.clamp(1, MAX_LEDGER_PAGE_SIZE);

    let sql = format!(
        "SELECT T0.\"TransId\", T0.\"RefDate\" AS \"PostingDate\", T0.\"DueDate\", \
         T0.\"TaxDate\" AS \"DocumentDate\", T0.\"Ref1\" AS \"Reference1\", T0.\"Ref2\" AS \"Reference2\", \
         T0.\"Ref3\" AS \"Reference3\", T0.\"TransType\", T0.\"BaseRef\" AS \"BaseDocument\", \
         T0.\"Memo\" AS \"HeaderMemo\", T0.\"CreateDate\" AS \"CreatedOn\", T0.\"UserSign\" AS \"CreatedByCode\", \
         T1.\"Line_ID\" AS \"LineNum\", T1.\"Account\", T2.\"AcctName\" AS \"AccountName\", \
         T2.\"Finanse\" AS \"AccountType\", T1.\"Debit\", T1.\"Credit\", T1.\"FCDebit\", T1.\"FCCredit\", \
         T1.\"FCCurrency\", T1.\"ShortName\" AS \"BPCode\", \
         COALESCE(T3.\"CardName\", T6.\"firstName\" || ' ' || T6.\"lastName\") AS \"BPName\", \
         T1.\"LineMemo\" AS \"Description\", T1.\"Project\" AS \"ProjectCode\", T4.\"PrjName\" AS \"ProjectName\", \
         T1.\"Ref1\" AS \"LineRef1\", T1.\"Ref2\" AS \"LineRef2\", \
         COALESCE(T5.\"Quantity\", 0) AS \"Qty\", COALESCE(T5.\"Price\", 0) AS \"UnitPrice\", \
         COALESCE(T5.\"DiscPrcnt\", 0) AS \"Discount\", \
         COALESCE(T5.\"GTotal\", ABS(T1.\"Debit\" + T1.\"Credit\")) AS \"Amount\" \
         FROM \"OJDT\" T0 \
         INNER JOIN \"JDT1\" T1 ON T0.\"TransId\" = T1.\"TransId\" \
         LEFT JOIN \"OACT\" T2 ON T1.\"Account\" = T2.\"AcctCode\" \
         LEFT JOIN \"OCRD\" T3 ON T1.\"ShortName\" = T3.\"CardCode\" \
         LEFT JOIN \"OPRJ\" T4 ON T1.\"Project\" = T4.\"PrjCode\" \
         LEFT JOIN \"INV1\" T5 ON T0.\"BaseRef\" = CAST(T5.\"DocEntry\" AS VARCHAR) AND T1.\"Line_ID\" = T5.\"LineNum\" \
         LEFT JOIN \"OHEM\" T6 ON T1.\"ShortName\" = CAST(T6.\"empID\" AS VARCHAR)\
         {where_sql} \
         ORDER BY T1.\"Account\", T0.\"RefDate\", T0.\"TransId\", T1.\"Line_ID\" \
         LIMIT {limit} OFFSET {offset}",
        where_sql = where_sql,
        limit = limit,
        offset = offset,
    );

    HanaQuery { sql, ..query }
}

/// Number of journal lines matching `filter`, for pagination.
pub fn general_ledger_count(filter: &LedgerFilter) -> HanaQuery {
    let (where_sql, query) = filter.where_clause(HanaQuery::new(String::new()));

    let sql = format!(
        "SELECT COUNT(*) AS \"TotalCount\" FROM \"OJDT\" T0 \
         INNER JOIN \"JDT1\" T1 ON T0.\"TransId\" = T1.\"TransId\"{}",
        where_sql
    );

    HanaQuery { sql, ..query }
}

/// Debit, credit and balance of an account before `before`.
pub fn account_opening_balance(account: &str, before: NaiveDate, bp_code: Option<&str>) -> HanaQuery {
    let mut query = HanaQuery::new(String::new()).bind(account.trim()).bind(before);
    let mut sql = String::from(
        "SELECT COALESCE(SUM(\"Debit\"), 0) AS \"Debit\", COALESCE(SUM(\"Credit\"), 0) AS \"Credit\", \
         COALESCE(SUM(\"Debit\"), 0) - COALESCE(SUM(\"Credit\"), 0) AS \"Balance\" \
         FROM \"JDT1\" WHERE \"Account\" = ? AND \"RefDate\" < TO_DATE(?, 'YYYY-MM-DD')",
    );

    if let Some(code) = bp_code.map(str::trim).filter(|c| !c.is_empty()) {
        sql.push_str(" AND \"ShortName\" = ?");
        query = query.bind(code);
    }

    HanaQuery { sql, ..query }
}

/// OACT, optionally narrowed to one `Finanse` class (A, L, E, I, O).
pub fn chart_of_accounts_list(account_type: Option<&str>) -> HanaQuery {
    let mut query = HanaQuery::new(String::new());
    let mut sql = String::from(
        "SELECT \"AcctCode\", \"AcctName\", \"GroupMask\", \"FatherNum\", \"Postable\", \
         \"ActCurr\", \"Finanse\", \"ExportCode\" FROM \"OACT\"",
    );

    if let Some(account_type) = account_type.map(str::trim).filter(|t| !t.is_empty()) {
        sql.push_str(" WHERE \"Finanse\" = ?");
        query = query.bind(account_type.to_ascii_uppercase());
    }
    sql.push_str(" ORDER BY \"AcctCode\"");

    HanaQuery { sql, ..query }
}

/// Business partners that appear on journal lines. Employees and `LS`
/// codes are excluded.
pub fn business_partner_lov(card_type: Option<&str>, limit: Option<u32>) -> HanaQuery {
    let limit = limit
        .unwrap_or(BUSINESS_PARTNER_LOV_LIMIT)
        .clamp(1, BUSINESS_PARTNER_LOV_LIMIT);
    let mut query = HanaQuery::new(String::new());
    let mut sql = String::from(
        "SELECT DISTINCT T0.\"CardCode\", T0.\"CardName\", T0.\"CardType\" FROM \"OCRD\" T0 \
         INNER JOIN \"JDT1\" T1 ON T0.\"CardCode\" = T1.\"ShortName\" \
         WHERE T0.\"CardCode\" IS NOT NULL AND T0.\"CardName\" IS NOT NULL \
         AND T0.\"CardCode\" NOT LIKE 'LS%' \
         AND NOT EXISTS (SELECT 1 FROM \"OHEM\" E WHERE CAST(E.\"empID\" AS VARCHAR) = T0.\"CardCode\")",
    );

    if let Some(card_type) = card_type.map(str::trim).filter(|t| !t.is_empty()) {
        sql.push_str(" AND T0.\"CardType\" = ?");
        query = query.bind(card_type.to_ascii_uppercase());
    }
    sql.push_str(&format!(" ORDER BY T0.\"CardCode\" LIMIT {}", limit));

    HanaQuery { sql, ..query }
}

pub fn projects_lov(active_only: bool) -> HanaQuery {
    if active_only {
        HanaQuery::new(
            "SELECT \"PrjCode\", \"PrjName\", \"Active\" FROM \"OPRJ\" WHERE \"Active\" = ? ORDER BY \"PrjCode\"",
        )
        .bind("Y")
    } else {
        HanaQuery::new("SELECT \"PrjCode\", \"PrjName\", \"Active\" FROM \"OPRJ\" ORDER BY \"PrjCode\"")
    }
}

// ============================================================================
// Transaction types
// ============================================================================

/// Business One object types that post journal entries.
const TRANSACTION_TYPE_NAMES: &[(&str, &str)] = &[
    ("30", "Journal Entry"),
    ("13", "A/R Invoice"),
    ("14", "A/R Credit Memo"),
    ("15", "Delivery"),
    ("16", "Returns"),
    ("17", "Sales Order"),
    ("23", "Sales Quotation"),
    ("540000006", "Sales Blanket Agreement"),
    ("18", "A/P Invoice"),
    ("19", "A/P Credit Memo"),
    ("20", "Goods Receipt PO"),
    ("21", "Goods Return"),
    ("22", "Purchase Order"),
    ("540000005", "Purchase Blanket Agreement"),
    ("59", "Goods Receipt"),
    ("60", "Goods Issue"),
    ("67", "Inventory Transfer"),
    ("69", "Landing Costs"),
    ("310000001", "Inventory Posting"),
    ("24", "Incoming Payment"),
    ("46", "Outgoing Payment"),
    ("162", "Deposit"),
    ("163", "Check for Payment"),
    ("202", "Production Order"),
    ("204", "Assembly/Disassembly"),
    ("1250000001", "Inventory Count"),
    ("1470000049", "Service Call"),
    ("1470000071", "Service Contract"),
    ("1470000094", "Equipment Card"),
    ("-2", "Adjustment"),
    ("-3", "Closing"),
];

/// The types offered in the ledger filter, in display order.
const TRANSACTION_TYPE_FILTER: &[(&str, &str)] = &[
    ("13", "A/R Invoice"),
    ("14", "A/R Credit Memo"),
    ("18", "A/P Invoice"),
    ("19", "A/P Credit Memo"),
    ("24", "Incoming Payment"),
    ("46", "Outgoing Payment"),
    ("30", "Journal Entry"),
    ("59", "Goods Receipt"),
    ("60", "Goods Issue"),
    ("67", "Inventory Transfer"),
    ("162", "Inventory Revaluation"),
];

pub fn transaction_type_name(code: &str) -> String {
    let code = code.trim();
    TRANSACTION_TYPE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("Type {}", code))
}

pub fn transaction_types_lov() -> Vec<(&'static str, &'static str)> {
    TRANSACTION_TYPE_FILTER.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::hana::SqlParam;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn text(value: &str) -> SqlParam {
        SqlParam::Text(value.to_string())
    }

    #[test]
    fn test_unfiltered_report_pages() {
        let q = general_ledger_report(&LedgerFilter::default(), 50, 100);
        assert!(!q.sql.contains("WHERE"));
        assert!(q.sql.ends_with("LIMIT 50 OFFSET 100"));
        assert!(q.sql.contains("ORDER BY T1.\"Account\", T0.\"RefDate\""));
        assert!(q.params.is_empty());
    }

    #[test]
    fn test_report_and_count_share_filters() {
        let filter = LedgerFilter {
            account_from: Some(" 1100 ".to_string()),
            account_to: Some("1199".to_string()),
            from_date: Some(date(2024, 7, 1)),
            to_date: Some(date(2024, 7, 31)),
            bp_codes: vec!["C001".to_string()],
            project_code: Some("  ".to_string()),
            trans_type: Some("13".to_string()),
        };

        let report = general_ledger_report(&filter, 20, 0);
        let count = general_ledger_count(&filter);
        let expected = vec![
            text("1100"),
            text("1199"),
            text("2024-07-01"),
            text("2024-07-31"),
            text("C001"),
            text("13"),
        ];

        assert_eq!(report.params, expected);
        assert_eq!(count.params, expected);
        assert_eq!(report.sql.matches('?').count(), expected.len());
        assert!(count.sql.starts_with("SELECT COUNT(*) AS \"TotalCount\""));
        assert!(!count.sql.contains("ORDER BY"));
        assert!(!report.sql.contains("\"Project\" = ?"));
    }

    #[test]
    fn test_several_partners_become_in_list() {
        let filter = LedgerFilter {
            bp_codes: vec!["C001".to_string(), " ".to_string(), "C002".to_string()],
            ..Default::default()
        };
        let q = general_ledger_count(&filter);
        assert!(q.sql.contains("T1.\"ShortName\" IN (?, ?)"));
        assert_eq!(q.params, vec![text("C001"), text("C002")]);
        assert_eq!(filter.single_bp_code(), None);
    }

    #[test]
    fn test_page_size_is_capped() {
        let q = general_ledger_report(&LedgerFilter::default(), 50_000, 0);
        assert!(q.sql.contains("LIMIT 1000 OFFSET 0"));
    }

    #[test]
    fn test_opening_balance_binds_partner() {
        let q = account_opening_balance("1100", date(2024, 7, 1), Some("C001"));
        assert!(q.sql.contains("\"RefDate\" < TO_DATE(?, 'YYYY-MM-DD')"));
        assert!(q.sql.ends_with("AND \"ShortName\" = ?"));
        assert_eq!(q.params, vec![text("1100"), text("2024-07-01"), text("C001")]);

        let without = account_opening_balance("1100", date(2024, 7, 1), None);
        assert_eq!(without.params.len(), 2);
    }

    #[test]
    fn test_chart_of_accounts_type_is_upper_cased() {
        let q = chart_of_accounts_list(Some(" a "));
        assert!(q.sql.contains("WHERE \"Finanse\" = ?"));
        assert_eq!(q.params, vec![text("A")]);
        assert!(!chart_of_accounts_list(None).sql.contains("WHERE"));
    }

    #[test]
    fn test_business_partner_lov() {
        let q = business_partner_lov(Some("c"), Some(5_000));
        assert!(q.sql.contains("NOT LIKE 'LS%'"));
        assert!(q.sql.ends_with("LIMIT 1000"));
        assert_eq!(q.params, vec![text("C")]);

        let all = business_partner_lov(None, Some(25));
        assert!(all.params.is_empty());
        assert!(all.sql.ends_with("LIMIT 25"));
    }

    #[test]
    fn test_projects_lov() {
        assert_eq!(projects_lov(true).params, vec![text("Y")]);
        assert!(!projects_lov(false).sql.contains("WHERE"));
    }

    #[test]
    fn test_transaction_type_names() {
        assert_eq!(transaction_type_name("13"), "A/R Invoice");
        assert_eq!(transaction_type_name(" 46 "), "Outgoing Payment");
        assert_eq!(transaction_type_name("999"), "Type 999");
        assert_eq!(transaction_types_lov().len(), 11);
        assert_eq!(transaction_types_lov()[0], ("13", "A/R Invoice"));
    }
}
