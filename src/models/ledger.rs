use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::services::hana::ledger::{transaction_type_name, MAX_LEDGER_PAGE_SIZE};
use crate::services::hana::{HanaRow, LedgerFilter, RowExt};

// "PR: 232687 | IN: 5700817" in journal line memos
static PROJECT_IN_MEMO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PR:\s*(\d+)").expect("static project pattern is valid"));

pub const DEFAULT_LEDGER_PAGE_SIZE: u32 = 50;

/// Query string of the general ledger endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerQuery {
    pub account_from: Option<String>,
    pub account_to: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// One card code or a comma-separated list.
    pub bp_code: Option<String>,
    pub project_code: Option<String>,
    pub trans_type: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    #[serde(default)]
    pub group_by_account: bool,
}

impl LedgerQuery {
    pub fn filter(&self) -> LedgerFilter {
        LedgerFilter {
            account_from: self.account_from.clone(),
            account_to: self.account_to.clone(),
            from_date: self.from_date,
            to_date: self.to_date,
            bp_codes: self
                .bp_code
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            project_code: self.project_code.clone(),
            trans_type: self.trans_type.clone(),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_LEDGER_PAGE_SIZE)
            .clamp(1, MAX_LEDGER_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.page_size())
    }
}

/// One journal entry line.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LedgerLine {
    pub trans_id: i64,
    pub line_num: i64,
    pub posting_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub document_date: Option<NaiveDate>,
    pub reference1: Option<String>,
    pub reference2: Option<String>,
    pub reference3: Option<String>,
    pub trans_type: Option<String>,
    pub trans_type_name: Option<String>,
    pub base_document: Option<String>,
    pub header_memo: Option<String>,
    pub created_on: Option<NaiveDate>,
    pub created_by_code: Option<i64>,
    pub account: String,
    pub account_name: Option<String>,
    pub account_type: Option<String>,
    pub debit: Decimal,
    pub credit: Decimal,
    pub fc_debit: Decimal,
    pub fc_credit: Decimal,
    pub fc_currency: Option<String>,
    pub bp_code: Option<String>,
    pub bp_name: Option<String>,
    pub description: Option<String>,
    pub extracted_project: Option<String>,
    pub project_code: Option<String>,
    pub project_name: Option<String>,
    pub line_ref1: Option<String>,
    pub line_ref2: Option<String>,
    pub qty: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub amount: Decimal,
    pub running_balance: Decimal,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl LedgerLine {
    pub fn from_row(row: &HanaRow) -> Option<Self> {
        let trans_type = non_blank(row.get_string("TransType"));
        let description = non_blank(row.get_string("Description"));
        let extracted_project = description
            .as_deref()
            .and_then(|memo| PROJECT_IN_MEMO.captures(memo))
            .map(|caps| caps[1].to_string());

        Some(Self {
            trans_id: row.get_i64("TransId")?,
            line_num: row.get_i64("LineNum").unwrap_or_default(),
            posting_date: row.get_date("PostingDate"),
            due_date: row.get_date("DueDate"),
            document_date: row.get_date("DocumentDate"),
            reference1: non_blank(row.get_string("Reference1")),
            reference2: non_blank(row.get_string("Reference2")),
            reference3: non_blank(row.get_string("Reference3")),
            trans_type_name: trans_type.as_deref().map(transaction_type_name),
            trans_type,
            base_document: non_blank(row.get_string("BaseDocument")),
            header_memo: non_blank(row.get_string("HeaderMemo")),
            created_on: row.get_date("CreatedOn"),
            created_by_code: row.get_i64("CreatedByCode"),
            account: non_blank(row.get_string("Account"))?,
            account_name: non_blank(row.get_string("AccountName")),
            account_type: non_blank(row.get_string("AccountType")),
            debit: row.get_decimal("Debit").unwrap_or_default(),
            credit: row.get_decimal("Credit").unwrap_or_default(),
            fc_debit: row.get_decimal("FCDebit").unwrap_or_default(),
            fc_credit: row.get_decimal("FCCredit").unwrap_or_default(),
            fc_currency: non_blank(row.get_string("FCCurrency")),
            bp_code: non_blank(row.get_string("BPCode")),
            bp_name: non_blank(row.get_string("BPName")),
            description,
            extracted_project,
            project_code: non_blank(row.get_string("ProjectCode")),
            project_name: non_blank(row.get_string("ProjectName")),
            line_ref1: non_blank(row.get_string("LineRef1")),
            line_ref2: non_blank(row.get_string("LineRef2")),
            qty: row.get_decimal("Qty").unwrap_or_default(),
            unit_price: row.get_decimal("UnitPrice").unwrap_or_default(),
            discount: row.get_decimal("Discount").unwrap_or_default(),
            amount: row.get_decimal("Amount").unwrap_or_default(),
            running_balance: Decimal::ZERO,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct LedgerTotals {
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    /// Debit minus credit.
    pub difference: Decimal,
}

/// The lines of one account on the current page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccountLedger {
    pub account: String,
    pub account_name: Option<String>,
    pub opening_balance: Decimal,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub closing_balance: Decimal,
    pub transactions: Vec<LedgerLine>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum LedgerData {
    Transactions {
        transactions: Vec<LedgerLine>,
        grand_total: LedgerTotals,
    },
    Accounts {
        accounts: Vec<AccountLedger>,
        grand_total: LedgerTotals,
    },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_records: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total_records: u64) -> Self {
        let size = u64::from(page_size.max(1));
        Self {
            page,
            page_size,
            total_records,
            total_pages: total_records.div_ceil(size),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LedgerReport {
    pub success: bool,
    pub data: LedgerData,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct OpeningBalance {
    pub debit: Decimal,
    pub credit: Decimal,
    pub balance: Decimal,
}

impl OpeningBalance {
    pub fn from_row(row: &HanaRow) -> Self {
        let debit = row.get_decimal("Debit").unwrap_or_default();
        let credit = row.get_decimal("Credit").unwrap_or_default();
        Self {
            debit,
            credit,
            balance: row.get_decimal("Balance").unwrap_or(debit - credit),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpeningBalanceQuery {
    pub before: NaiveDate,
    pub bp_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccountRow {
    pub acct_code: String,
    pub acct_name: Option<String>,
    pub group_mask: Option<i64>,
    pub father_num: Option<String>,
    pub postable: bool,
    pub currency: Option<String>,
    pub account_type: Option<String>,
    pub export_code: Option<String>,
}

impl AccountRow {
    pub fn from_row(row: &HanaRow) -> Option<Self> {
        Some(Self {
            acct_code: non_blank(row.get_string("AcctCode"))?,
            acct_name: non_blank(row.get_string("AcctName")),
            group_mask: row.get_i64("GroupMask"),
            father_num: non_blank(row.get_string("FatherNum")),
            postable: row.get_string("Postable").is_some_and(|v| v == "Y"),
            currency: non_blank(row.get_string("ActCurr")),
            account_type: non_blank(row.get_string("Finanse")),
            export_code: non_blank(row.get_string("ExportCode")),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartOfAccountsQuery {
    pub account_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionType {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LedgerPartner {
    pub card_code: String,
    pub card_name: Option<String>,
    pub card_type: Option<String>,
}

impl LedgerPartner {
    pub fn from_row(row: &HanaRow) -> Option<Self> {
        Some(Self {
            card_code: non_blank(row.get_string("CardCode"))?,
            card_name: non_blank(row.get_string("CardName")),
            card_type: non_blank(row.get_string("CardType")),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerPartnerQuery {
    pub bp_type: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectRow {
    pub prj_code: String,
    pub prj_name: Option<String>,
    pub active: bool,
}

impl ProjectRow {
    pub fn from_row(row: &HanaRow) -> Option<Self> {
        Some(Self {
            prj_code: non_blank(row.get_string("PrjCode"))?,
            prj_name: non_blank(row.get_string("PrjName")),
            active: row.get_string("Active").is_some_and(|v| v == "Y"),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectsQuery {
    #[serde(default = "active_only_default")]
    pub active_only: bool,
}

fn active_only_default() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn row(value: serde_json::Value) -> HanaRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_line_from_row() {
        let line = LedgerLine::from_row(&row(json!({
            "TRANSID": 501, "LineNum": 0, "PostingDate": "2024-07-03 00:00:00.000000000",
            "TransType": "13", "Account": "1100", "AccountName": "Trade Debtors",
            "Debit": "1500.00", "Credit": "0", "BPCode": "C001", "BPName": "Alpha Agro",
            "Description": "PR: 232687 | IN: 5700817", "Amount": "1500"
        })))
        .unwrap();

        assert_eq!(line.trans_id, 501);
        assert_eq!(line.posting_date, NaiveDate::from_ymd_opt(2024, 7, 3));
        assert_eq!(line.trans_type_name.as_deref(), Some("A/R Invoice"));
        assert_eq!(line.extracted_project.as_deref(), Some("232687"));
        assert_eq!(line.debit, dec!(1500.00));
        assert_eq!(line.qty, Decimal::ZERO);
    }

    #[test]
    fn test_line_without_project_memo() {
        let line = LedgerLine::from_row(&row(json!({
            "TransId": 1, "Account": "2100", "Description": "Salary July"
        })))
        .unwrap();
        assert_eq!(line.extracted_project, None);
        assert_eq!(line.trans_type_name, None);
    }

    #[test]
    fn test_line_requires_account() {
        assert!(LedgerLine::from_row(&row(json!({"TransId": 1, "Account": ""}))).is_none());
    }

    #[test]
    fn test_query_paging_and_partner_list() {
        let query = LedgerQuery {
            bp_code: Some("C001, C002,".to_string()),
            page: Some(3),
            page_size: Some(20),
            ..Default::default()
        };
        assert_eq!(query.filter().bp_codes, vec!["C001", "C002"]);
        assert_eq!(query.offset(), 40);

        let defaults = LedgerQuery {
            page: Some(0),
            ..Default::default()
        };
        assert_eq!(defaults.page(), 1);
        assert_eq!(defaults.page_size(), 50);
        assert_eq!(defaults.offset(), 0);
    }

    #[test]
    fn test_pagination_rounds_up() {
        assert_eq!(Pagination::new(1, 50, 101).total_pages, 3);
        assert_eq!(Pagination::new(1, 50, 0).total_pages, 0);
    }

    #[test]
    fn test_opening_balance_defaults() {
        let opening = OpeningBalance::from_row(&row(json!({"Debit": "300", "Credit": "100"})));
        assert_eq!(opening.balance, dec!(200));
    }
}
