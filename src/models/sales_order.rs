use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub fn validate_positive_quantity(quantity: &Decimal) -> Result<(), ValidationError> {
    if *quantity <= Decimal::ZERO {
        return Err(ValidationError::new("positive_quantity"));
    }
    Ok(())
}

pub fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("non_negative"));
    }
    Ok(())
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

pub fn validate_discount(percent: &Decimal) -> Result<(), ValidationError> {
    if *percent < Decimal::ZERO || *percent > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("discount_range"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderStatus {
    Draft,
    Posted,
    Failed,
}

impl SalesOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Draft => "draft",
            SalesOrderStatus::Posted => "posted",
            SalesOrderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SalesOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SalesOrderStatus::Draft),
            "posted" => Ok(SalesOrderStatus::Posted),
            "failed" => Ok(SalesOrderStatus::Failed),
            other => Err(format!("unknown sales order status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesOrderLine {
    pub line_num: i32,
    pub item_code: String,
    pub item_description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_code: Option<String>,
    pub warehouse_code: Option<String>,
    pub policy: Option<String>,
}

/// A locally captured order and, once pushed, its SAP document reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesOrder {
    pub id: Uuid,
    pub company_db: String,
    pub card_code: String,
    pub card_name: Option<String>,
    pub contact_person_code: Option<i32>,
    pub federal_tax_id: Option<String>,
    pub pay_to_code: Option<String>,
    pub address: Option<String>,
    pub secondary_card_code: Option<String>,
    pub secondary_card_name: Option<String>,
    pub doc_date: NaiveDate,
    pub doc_due_date: NaiveDate,
    pub tax_date: Option<NaiveDate>,
    pub comments: Option<String>,
    pub status: SalesOrderStatus,
    pub is_posted_to_sap: bool,
    pub sap_doc_entry: Option<i64>,
    pub sap_doc_num: Option<i64>,
    pub sap_error: Option<String>,
    pub sap_response_json: Option<Value>,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<SalesOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SalesOrderLineRequest {
    #[validate(
        length(min = 1, max = 50, message = "Item code required"),
        custom(function = validate_not_blank, message = "Item code required")
    )]
    pub item_code: String,
    #[validate(length(max = 200))]
    pub item_description: Option<String>,
    #[validate(custom(function = validate_positive_quantity))]
    pub quantity: Decimal,
    #[validate(custom(function = validate_non_negative))]
    pub unit_price: Decimal,
    #[serde(default)]
    #[validate(custom(function = validate_discount))]
    pub discount_percent: Decimal,
    #[validate(length(max = 20))]
    pub tax_code: Option<String>,
    #[validate(length(max = 20))]
    pub warehouse_code: Option<String>,
    #[validate(length(max = 100))]
    pub policy: Option<String>,
}

impl SalesOrderLineRequest {
    pub fn into_line(self, line_num: i32) -> SalesOrderLine {
        SalesOrderLine {
            line_num,
            item_code: self.item_code.trim().to_string(),
            item_description: self.item_description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount_percent: self.discount_percent,
            tax_code: self.tax_code,
            warehouse_code: self.warehouse_code,
            policy: self.policy,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSalesOrderRequest {
    #[validate(
        length(min = 1, max = 50, message = "Customer code required"),
        custom(function = validate_not_blank, message = "Customer code required")
    )]
    pub card_code: String,
    #[validate(length(max = 200))]
    pub card_name: Option<String>,
    pub contact_person_code: Option<i32>,
    #[validate(length(max = 50))]
    pub federal_tax_id: Option<String>,
    #[validate(length(max = 100))]
    pub pay_to_code: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub secondary_card_code: Option<String>,
    #[validate(length(max = 200))]
    pub secondary_card_name: Option<String>,
    /// Defaults to today.
    pub doc_date: Option<NaiveDate>,
    /// Defaults to the document date.
    pub doc_due_date: Option<NaiveDate>,
    pub tax_date: Option<NaiveDate>,
    #[validate(length(max = 254, message = "Comments too long"))]
    pub comments: Option<String>,
    #[validate(length(min = 1, message = "At least one line is required"), nested)]
    pub lines: Vec<SalesOrderLineRequest>,
}

/// Edits to an unposted order. Absent fields are left unchanged; `lines`,
/// when present, replaces every line.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSalesOrderRequest {
    #[validate(
        length(min = 1, max = 50, message = "Customer code required"),
        custom(function = validate_not_blank, message = "Customer code required")
    )]
    pub card_code: Option<String>,
    #[validate(length(max = 200))]
    pub card_name: Option<String>,
    pub contact_person_code: Option<i32>,
    #[validate(length(max = 50))]
    pub federal_tax_id: Option<String>,
    #[validate(length(max = 100))]
    pub pay_to_code: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub secondary_card_code: Option<String>,
    #[validate(length(max = 200))]
    pub secondary_card_name: Option<String>,
    pub doc_date: Option<NaiveDate>,
    pub doc_due_date: Option<NaiveDate>,
    pub tax_date: Option<NaiveDate>,
    #[validate(length(max = 254, message = "Comments too long"))]
    pub comments: Option<String>,
    #[validate(length(min = 1, message = "At least one line is required"), nested)]
    pub lines: Option<Vec<SalesOrderLineRequest>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSalesOrdersQuery {
    pub posted: Option<bool>,
    pub card_code: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListSalesOrdersQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Outcome of one push to SAP, returned by the post endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PostToSapResponse {
    pub success: bool,
    pub message: String,
    pub order: SalesOrder,
}
