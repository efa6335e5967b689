use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::services::hana::{HanaRow, RowExt};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChildCustomer {
    pub card_code: String,
    pub card_name: String,
    pub father_card: Option<String>,
}

impl ChildCustomer {
    pub fn from_row(row: &HanaRow) -> Option<Self> {
        Some(Self {
            card_code: row.get_string("CardCode").filter(|c| !c.is_empty())?,
            card_name: row.get_string("CardName").unwrap_or_default(),
            father_card: row.get_string("FatherCard"),
        })
    }
}

/// `father_card` wins over `father_name` when both are given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChildCustomerQuery {
    pub father_card: Option<String>,
    pub father_name: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PolicyBalance {
    pub card_code: String,
    pub card_name: Option<String>,
    pub project: Option<String>,
    pub project_name: Option<String>,
    pub balance: Decimal,
}

impl PolicyBalance {
    pub fn from_row(row: &HanaRow) -> Option<Self> {
        Some(Self {
            card_code: row.get_string("CardCode")?,
            card_name: row.get_string("CardName"),
            project: row.get_string("Project"),
            project_name: row.get_string("PrjName"),
            balance: row.get_decimal("Balance").unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_child_from_row() {
        let row = json!({"CardCode": " ORC00197 ", "CardName": "Kissan Traders (Branch)", "FatherCard": "ORC00196"});
        let child = ChildCustomer::from_row(row.as_object().unwrap()).unwrap();
        assert_eq!(child.card_code, "ORC00197");
        assert_eq!(child.father_card.as_deref(), Some("ORC00196"));
    }

    #[test]
    fn test_child_without_code_is_skipped() {
        let row = json!({"CardCode": "  ", "CardName": "x"});
        assert!(ChildCustomer::from_row(row.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_policy_balance_from_row() {
        let row = json!({"CardCode": "ORC00196", "Project": "P-01", "PrjName": "Kharif 2024", "Balance": "-1250.75"});
        let balance = PolicyBalance::from_row(row.as_object().unwrap()).unwrap();
        assert_eq!(balance.balance, dec!(-1250.75));
        assert_eq!(balance.card_name, None);
    }
}
