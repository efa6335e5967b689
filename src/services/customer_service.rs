// Child/parent customer resolution over OCRD, plus policy-wise balances.

use std::sync::Arc;

use crate::middleware::error_handling::Result;
use crate::models::business_partner::{ChildCustomer, ChildCustomerQuery, PolicyBalance};
use crate::services::hana::{queries, HanaConnector, RowExt};
use crate::utils::log_sanitizer::{sanitize_for_log, sanitize_option_for_log};

/// Case-insensitive substring on the name, or case-insensitive prefix on
/// the code. An empty search matches everything.
pub fn matches_search(customer: &ChildCustomer, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    customer.card_name.to_lowercase().contains(&needle)
        || customer.card_code.to_lowercase().starts_with(&needle)
}

pub struct CustomerService {
    hana: Arc<dyn HanaConnector>,
}

impl CustomerService {
    pub fn new(hana: Arc<dyn HanaConnector>) -> Self {
        Self { hana }
    }

    /// Direct children of `father_card`. No children is an empty list.
    pub async fn child_customers(
        &self,
        schema: &str,
        father_card: &str,
        search: Option<&str>,
    ) -> Result<Vec<ChildCustomer>> {
        let father_card = father_card.trim();
        if father_card.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .hana
            .fetch_all(schema, &queries::child_customers(father_card))
            .await?;

        let children: Vec<ChildCustomer> = rows
            .iter()
            .filter_map(ChildCustomer::from_row)
            .filter(|child| search.map_or(true, |s| matches_search(child, s)))
            .collect();

        tracing::debug!(
            "{} children for {} in {} (search: {})",
            children.len(),
            sanitize_for_log(father_card),
            schema,
            sanitize_option_for_log(&search.map(str::to_string))
        );
        Ok(children)
    }

    /// Parent code for a customer name: exact (trimmed, case-insensitive)
    /// match first, then a `LIKE` match.
    pub async fn resolve_parent_code(&self, schema: &str, father_name: &str) -> Result<Option<String>> {
        let name = father_name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        if let Some(row) = self
            .hana
            .fetch_one(schema, &queries::customer_by_name_exact(name))
            .await?
        {
            return Ok(row.get_string("CardCode").filter(|c| !c.is_empty()));
        }

        let fallback = self
            .hana
            .fetch_one(schema, &queries::customer_by_name_like(name))
            .await?;
        Ok(fallback
            .and_then(|row| row.get_string("CardCode"))
            .filter(|c| !c.is_empty()))
    }

    /// Children for the query string: `father_card` wins, otherwise the
    /// parent is looked up by `father_name`. An unresolvable parent yields
    /// an empty list.
    pub async fn children_for(&self, schema: &str, query: &ChildCustomerQuery) -> Result<Vec<ChildCustomer>> {
        let search = query.search.as_deref();

        if let Some(card) = query.father_card.as_deref().filter(|c| !c.trim().is_empty()) {
            return self.child_customers(schema, card, search).await;
        }

        let Some(name) = query.father_name.as_deref() else {
            return Ok(Vec::new());
        };

        match self.resolve_parent_code(schema, name).await? {
            Some(card) => self.child_customers(schema, &card, search).await,
            None => {
                tracing::info!("No customer named '{}' in {}", sanitize_for_log(name), schema);
                Ok(Vec::new())
            }
        }
    }

    pub async fn policy_balance(&self, schema: &str, card_code: &str) -> Result<Vec<PolicyBalance>> {
        let rows = self
            .hana
            .fetch_all(schema, &queries::policy_customer_balance(card_code))
            .await?;
        Ok(rows.iter().filter_map(PolicyBalance::from_row).collect())
    }
}
