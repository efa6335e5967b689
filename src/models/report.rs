use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::services::hana::{HanaRow, RowExt, TargetFilter};

/// Envelope for report payloads.
#[derive(Debug, Serialize)]
pub struct ReportResponse<T: Serialize> {
    pub success: bool,
    pub count: usize,
    pub data: T,
}

impl<T: Serialize> ReportResponse<Vec<T>> {
    pub fn from_rows(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

/// Target vs achievement for one territory and period.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TargetSummaryRow {
    pub territory_id: i64,
    pub territory_name: Option<String>,
    pub target: Decimal,
    pub achievement: Decimal,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

impl TargetSummaryRow {
    pub fn from_row(row: &HanaRow) -> Option<Self> {
        Some(Self {
            territory_id: row.get_i64("TerritoryId")?,
            territory_name: row.get_string("TerritoryName"),
            target: row.get_decimal("Target").unwrap_or_default(),
            achievement: row.get_decimal("Achievement").unwrap_or_default(),
            from_date: row.get_date("FromDate"),
            to_date: row.get_date("ToDate"),
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TerritoryRow {
    pub territory_id: i64,
    pub territory_name: String,
    pub parent_id: Option<i64>,
    pub active: bool,
}

impl TerritoryRow {
    pub fn from_row(row: &HanaRow) -> Option<Self> {
        Some(Self {
            territory_id: row.get_i64("TerritoryId")?,
            territory_name: row.get_string("TerritoryName").unwrap_or_default(),
            // root nodes carry a negative parent id
            parent_id: row.get_i64("ParentId").filter(|p| *p >= 0),
            active: row.get_string("Inactive").map_or(true, |v| v != "Y"),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TerritoryListQuery {
    pub status: Option<crate::services::hana::TerritoryStatus>,
    pub limit: Option<u32>,
}

/// Query string of the hierarchy endpoints: report filters plus grouping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HierarchyQuery {
    pub emp_id: Option<i64>,
    pub territory: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// `leaf`, a level number, or absent for the nested tree.
    pub level: Option<String>,
}

impl HierarchyQuery {
    pub fn filter(&self) -> TargetFilter {
        TargetFilter {
            emp_id: self.emp_id,
            territory: self.territory.clone(),
            year: self.year,
            month: self.month,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}
