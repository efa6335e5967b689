// General ledger: paged journal lines with running balances, optionally
// grouped per account with opening and closing balances, plus the lists
// behind the ledger filters.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::middleware::error_handling::Result;
use crate::models::ledger::{
    AccountLedger, AccountRow, LedgerData, LedgerLine, LedgerPartner, LedgerQuery, LedgerReport, LedgerTotals,
    OpeningBalance, Pagination, ProjectRow, TransactionType,
};
use crate::services::hana::{ledger, HanaConnector, LedgerFilter, RowExt};
use crate::utils::log_sanitizer::sanitize_for_log;

/// Adds `running_balance` to each line, starting from `start`.
pub fn apply_running_balance(lines: &mut [LedgerLine], start: Decimal) -> Decimal {
    let mut balance = start;
    for line in lines.iter_mut() {
        balance += line.debit - line.credit;
        line.running_balance = balance;
    }
    balance
}

pub fn totals(lines: &[LedgerLine]) -> LedgerTotals {
    let total_debit: Decimal = lines.iter().map(|l| l.debit).sum();
    let total_credit: Decimal = lines.iter().map(|l| l.credit).sum();
    LedgerTotals {
        total_debit,
        total_credit,
        difference: total_debit - total_credit,
    }
}

/// Lines grouped per account, in first-seen order.
pub fn group_by_account(lines: Vec<LedgerLine>) -> Vec<(String, Option<String>, Vec<LedgerLine>)> {
    let mut groups: Vec<(String, Option<String>, Vec<LedgerLine>)> = Vec::new();

    for line in lines {
        match groups.iter_mut().find(|(account, _, _)| *account == line.account) {
            Some((_, _, group)) => group.push(line),
            None => groups.push((line.account.clone(), line.account_name.clone(), vec![line])),
        }
    }

    groups
}

pub struct GeneralLedgerService {
    hana: Arc<dyn HanaConnector>,
}

impl GeneralLedgerService {
    pub fn new(hana: Arc<dyn HanaConnector>) -> Self {
        Self { hana }
    }

    pub async fn count(&self, schema: &str, filter: &LedgerFilter) -> Result<u64> {
        let row = self
            .hana
            .fetch_one(schema, &ledger::general_ledger_count(filter))
            .await?;
        Ok(row
            .and_then(|r| r.get_i64("TotalCount"))
            .map_or(0, |n| n.max(0) as u64))
    }

    pub async fn opening_balance(
        &self,
        schema: &str,
        account: &str,
        before: NaiveDate,
        bp_code: Option<&str>,
    ) -> Result<OpeningBalance> {
        let row = self
            .hana
            .fetch_one(schema, &ledger::account_opening_balance(account, before, bp_code))
            .await?;
        Ok(row.as_ref().map(OpeningBalance::from_row).unwrap_or_default())
    }

    pub async fn report(&self, schema: &str, query: &LedgerQuery) -> Result<LedgerReport> {
        let filter = query.filter();
        let (page, page_size) = (query.page(), query.page_size());

        let lines_query = ledger::general_ledger_report(&filter, page_size, query.offset());
        let (total_records, rows) =
            tokio::try_join!(self.count(schema, &filter), async {
                Ok(self.hana.fetch_all(schema, &lines_query).await?)
            })?;

        let mut lines: Vec<LedgerLine> = rows.iter().filter_map(LedgerLine::from_row).collect();
        tracing::debug!(
            "📒 Ledger page {} on {}: {} of {} lines",
            page,
            sanitize_for_log(schema),
            lines.len(),
            total_records
        );

        let data = if query.group_by_account {
            let mut accounts = Vec::new();
            let mut grand_total = LedgerTotals::default();

            for (account, account_name, mut transactions) in group_by_account(lines) {
                let opening_balance = match filter.from_date {
                    Some(from) => {
                        self.opening_balance(schema, &account, from, filter.single_bp_code())
                            .await?
                            .balance
                    }
                    None => Decimal::ZERO,
                };

                apply_running_balance(&mut transactions, Decimal::ZERO);
                let account_totals = totals(&transactions);
                grand_total.total_debit += account_totals.total_debit;
                grand_total.total_credit += account_totals.total_credit;

                accounts.push(AccountLedger {
                    account,
                    account_name,
                    opening_balance,
                    total_debit: account_totals.total_debit,
                    total_credit: account_totals.total_credit,
                    closing_balance: opening_balance + account_totals.difference,
                    transactions,
                });
            }

            grand_total.difference = grand_total.total_debit - grand_total.total_credit;
            LedgerData::Accounts { accounts, grand_total }
        } else {
            apply_running_balance(&mut lines, Decimal::ZERO);
            let grand_total = totals(&lines);
            LedgerData::Transactions {
                transactions: lines,
                grand_total,
            }
        };

        Ok(LedgerReport {
            success: true,
            data,
            pagination: Pagination::new(page, page_size, total_records),
        })
    }

    pub async fn chart_of_accounts(&self, schema: &str, account_type: Option<&str>) -> Result<Vec<AccountRow>> {
        let rows = self
            .hana
            .fetch_all(schema, &ledger::chart_of_accounts_list(account_type))
            .await?;
        Ok(rows.iter().filter_map(AccountRow::from_row).collect())
    }

    pub fn transaction_types(&self) -> Vec<TransactionType> {
        ledger::transaction_types_lov()
            .into_iter()
            .map(|(code, name)| TransactionType {
                code: code.to_string(),
                name: name.to_string(),
            })
            .collect()
    }

    pub async fn business_partners(
        &self,
        schema: &str,
        card_type: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<LedgerPartner>> {
        let rows = self
            .hana
            .fetch_all(schema, &ledger::business_partner_lov(card_type, limit))
            .await?;
        Ok(rows.iter().filter_map(LedgerPartner::from_row).collect())
    }

    pub async fn projects(&self, schema: &str, active_only: bool) -> Result<Vec<ProjectRow>> {
        let rows = self
            .hana
            .fetch_all(schema, &ledger::projects_lov(active_only))
            .await?;
        Ok(rows.iter().filter_map(ProjectRow::from_row).collect())
    }
}
