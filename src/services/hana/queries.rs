// Statement builders for the Business One reporting tables.
// Every builder returns a HanaQuery; values are always bound, never spliced.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use super::HanaQuery;

/// Largest row count a caller may request from OTER in one call.
pub const MAX_TERRITORY_ROWS: u32 = 10_000;

/// Which target table a report reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Sales,
    Collection,
}

impl TargetKind {
    fn table(self) -> &'static str {
        match self {
            TargetKind::Sales => "B4_SALES_TARGET",
            TargetKind::Collection => "B4_COLLECTION_TARGET",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            TargetKind::Sales => "Sales_Target",
            TargetKind::Collection => "colletion_Target",
        }
    }
}

/// Report filters shared by the sales and collection reports.
///
/// An explicit `start_date`/`end_date` pair wins over `year`/`month`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetFilter {
    pub emp_id: Option<i64>,
    pub territory: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl TargetFilter {
    /// First day of the selected month and first day of the next one.
    pub fn month_window(&self) -> Option<(NaiveDate, NaiveDate)> {
        let (year, month) = (self.year?, self.month?);
        if !(1..=12).contains(&month) {
            return None;
        }
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some((start, next))
    }

    fn where_clause(&self, query: HanaQuery) -> (String, HanaQuery) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut query = query;

        if let Some(emp_id) = self.emp_id {
            clauses.push("c.TerritoryId IN (SELECT U_TID FROM \"B4_EMP\" WHERE empID = ?)");
            query = query.bind(emp_id);
        }

        if let Some(territory) = self.territory.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            clauses.push("c.TerritoryId IN (SELECT \"territryID\" FROM \"OTER\" WHERE \"descript\" = ?)");
            query = query.bind(territory);
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            clauses.push("c.F_REFDATE >= TO_DATE(?, 'YYYY-MM-DD') AND c.T_REFDATE <= TO_DATE(?, 'YYYY-MM-DD')");
            query = query.bind(start).bind(end);
        } else if let Some((start, next)) = self.month_window() {
            clauses.push("c.F_REFDATE >= TO_DATE(?, 'YYYY-MM-DD') AND c.T_REFDATE < TO_DATE(?, 'YYYY-MM-DD')");
            query = query.bind(start).bind(next);
        }

        if clauses.is_empty() {
            (String::new(), query)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), query)
        }
    }
}

/// Target vs achievement per territory and period, the flat report.
pub fn target_summary(kind: TargetKind, filter: &TargetFilter) -> HanaQuery {
    let (where_sql, query) = filter.where_clause(HanaQuery::new(String::new()));

    let sql = format!(
        "SELECT c.TerritoryId AS \"TerritoryId\", O.\"descript\" AS \"TerritoryName\", \
         SUM(c.{target}) AS \"Target\", SUM(c.DocTotal) AS \"Achievement\", \
         c.F_REFDATE AS \"FromDate\", c.T_REFDATE AS \"ToDate\" \
         FROM \"{table}\" c \
         INNER JOIN \"OTER\" O ON O.\"territryID\" = c.TerritoryId\
         {where_sql} \
         GROUP BY c.TerritoryId, O.\"descript\", c.F_REFDATE, c.T_REFDATE \
         ORDER BY c.TerritoryId, c.F_REFDATE, c.T_REFDATE",
        target = kind.target_column(),
        table = kind.table(),
        where_sql = where_sql,
    );

    HanaQuery { sql, ..query }
}

pub fn sales_vs_achievement(filter: &TargetFilter) -> HanaQuery {
    target_summary(TargetKind::Sales, filter)
}

pub fn collection_vs_achievement(filter: &TargetFilter) -> HanaQuery {
    target_summary(TargetKind::Collection, filter)
}

/// Ungrouped leaf facts, rolled up through the territory tree in Rust.
pub fn target_facts(kind: TargetKind, filter: &TargetFilter) -> HanaQuery {
    let (where_sql, query) = filter.where_clause(HanaQuery::new(String::new()));

    let sql = format!(
        "SELECT c.TerritoryId AS \"TerritoryId\", c.EmpId AS \"EmpId\", \
         c.{target} AS \"Target\", c.DocTotal AS \"Achievement\", \
         c.F_REFDATE AS \"FromDate\", c.T_REFDATE AS \"ToDate\" \
         FROM \"{table}\" c\
         {where_sql} \
         ORDER BY c.TerritoryId, c.F_REFDATE",
        target = kind.target_column(),
        table = kind.table(),
        where_sql = where_sql,
    );

    HanaQuery { sql, ..query }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerritoryStatus {
    Active,
    Inactive,
}

/// All OTER rows with their parent link.
pub fn territories_full(status: Option<TerritoryStatus>, limit: Option<u32>) -> HanaQuery {
    let limit = limit.unwrap_or(MAX_TERRITORY_ROWS).clamp(1, MAX_TERRITORY_ROWS);
    let mut query = HanaQuery::new(String::new());

    let where_sql = match status {
        Some(status) => {
            query = query.bind(match status {
                TerritoryStatus::Active => "N",
                TerritoryStatus::Inactive => "Y",
            });
            " WHERE T0.\"inactive\" = ?"
        }
        None => "",
    };

    query.sql = format!(
        "SELECT T0.\"territryID\" AS \"TerritoryId\", T0.\"descript\" AS \"TerritoryName\", \
         T0.\"parent\" AS \"ParentId\", T0.\"inactive\" AS \"Inactive\" \
         FROM \"OTER\" T0{} ORDER BY T0.\"territryID\" LIMIT {}",
        where_sql, limit
    );
    query
}

/// Every OTER row, for building the territory tree. Never capped: a
/// truncated tree would drop ancestors from the rollup.
pub fn territory_tree() -> HanaQuery {
    HanaQuery::new(
        "SELECT T0.\"territryID\" AS \"TerritoryId\", T0.\"descript\" AS \"TerritoryName\", \
         T0.\"parent\" AS \"ParentId\", T0.\"inactive\" AS \"Inactive\" \
         FROM \"OTER\" T0 ORDER BY T0.\"territryID\"",
    )
}

pub fn territory_names() -> HanaQuery {
    HanaQuery::new(
        "SELECT DISTINCT O.\"descript\" AS \"TerritoryName\" FROM \"OTER\" O ORDER BY O.\"descript\"",
    )
}

/// Employees that carry a territory assignment.
pub fn employee_territories() -> HanaQuery {
    HanaQuery::new(
        "SELECT T0.\"empID\" AS \"EmpId\", T0.\"firstName\" AS \"FirstName\", \
         T0.\"lastName\" AS \"LastName\", T0.\"U_TID\" AS \"TerritoryId\" \
         FROM \"OHEM\" T0 WHERE T0.\"U_TID\" IS NOT NULL ORDER BY T0.\"empID\"",
    )
}

/// Direct children of a business partner (one level).
pub fn child_customers(father_card: &str) -> HanaQuery {
    HanaQuery::new(
        "SELECT T0.\"CardCode\", T0.\"CardName\", T0.\"FatherCard\" \
         FROM \"OCRD\" T0 WHERE T0.\"FatherCard\" = ? ORDER BY T0.\"CardCode\"",
    )
    .bind(father_card.trim())
}

pub fn customer_by_name_exact(name: &str) -> HanaQuery {
    HanaQuery::new(
        "SELECT T0.\"CardCode\", T0.\"CardName\" FROM \"OCRD\" T0 \
         WHERE T0.\"CardType\" = 'C' AND T0.\"validFor\" = 'Y' \
         AND UPPER(TRIM(T0.\"CardName\")) = UPPER(TRIM(?)) \
         ORDER BY T0.\"CardCode\" LIMIT 1",
    )
    .bind(name)
}

pub fn customer_by_name_like(name: &str) -> HanaQuery {
    HanaQuery::new(
        "SELECT T0.\"CardCode\", T0.\"CardName\" FROM \"OCRD\" T0 \
         WHERE T0.\"CardType\" = 'C' AND T0.\"validFor\" = 'Y' \
         AND T0.\"CardName\" LIKE ? \
         ORDER BY T0.\"CardCode\" LIMIT 1",
    )
    .bind(format!("%{}%", name.trim()))
}

/// Ledger balance per project (policy) for one customer.
pub fn policy_customer_balance(card_code: &str) -> HanaQuery {
    HanaQuery::new(
        "SELECT T0.\"CardCode\", T0.\"CardName\", \
         CAST(T0.\"Project\" AS NVARCHAR(100)) AS \"Project\", T0.\"PrjName\", \
         SUM(T0.\"Sale\")+SUM(T0.\"Tax\")-SUM(T0.\"Return\")+SUM(T0.\"Collection\")+SUM(T0.\"DebitSwitching\")-\
         SUM(T0.\"CreditSwitching\")+SUM(T0.\"SwitchingDebit\")-SUM(T0.\"SwitchingCredit\")+SUM(T0.\"SecuredDebit\")-\
         SUM(T0.\"SecuredCredit\")+SUM(T0.\"BulkDebit\")-SUM(T0.\"BulkCredit\")+SUM(T0.\"Opening\") AS \"Balance\" \
         FROM \"CUSTLEDG12\" T0 WHERE T0.\"CardCode\" = ? \
         GROUP BY T0.\"CardCode\", T0.\"CardName\", T0.\"Project\", T0.\"PrjName\"",
    )
    .bind(card_code.trim())
}

/// Item master filters for the product catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductCatalogFilter {
    /// OITM numbering series; defaults to the finished-goods series.
    pub series: Option<String>,
    /// `U_PCN` catalog name.
    pub catalog: Option<String>,
    /// Substring of the item code or name.
    pub search: Option<String>,
}

pub const DEFAULT_PRODUCT_SERIES: &str = "72";

/// Sellable items with their group, catalog fields and the two ATC1
/// attachments (product image, Urdu description).
pub fn products_catalog(filter: &ProductCatalogFilter) -> HanaQuery {
    let series = filter
        .series
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_PRODUCT_SERIES);
    let mut query = HanaQuery::new(String::new()).bind(series);
    let mut clauses = vec!["T0.\"Series\" = ?", "T0.\"validFor\" = 'Y'"];

    if let Some(catalog) = filter.catalog.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        clauses.push("T0.\"U_PCN\" = ?");
        query = query.bind(catalog);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        clauses.push("(UPPER(T0.\"ItemCode\") LIKE UPPER(?) OR UPPER(T0.\"ItemName\") LIKE UPPER(?))");
        let pattern = format!("%{}%", search);
        query = query.bind(pattern.clone()).bind(pattern);
    }

    let sql = format!(
        "SELECT T1.\"ItmsGrpCod\", SUBSTR(T1.\"ItmsGrpNam\", 4) AS \"ItmsGrpNam\", \
         T0.\"U_PCN\" AS \"Product_Catalog_Name\", T0.\"ItemCode\", T0.\"ItemName\", \
         T0.\"U_GenericName\", T0.\"U_BrandName\", T0.\"SalPackMsr\", \
         (SELECT T2.\"FileName\" || '.' || T2.\"FileExt\" FROM \"ATC1\" T2 \
          WHERE T2.\"U_IMG_C\" = 'Product Image' AND T2.\"AbsEntry\" = T0.\"AtcEntry\") AS \"Product_Image\", \
         (SELECT T2.\"FileName\" || '.' || T2.\"FileExt\" FROM \"ATC1\" T2 \
          WHERE T2.\"U_IMG_C\" = 'Product Description Urdu' AND T2.\"AbsEntry\" = T0.\"AtcEntry\") \
          AS \"Product_Description_Urdu\" \
         FROM \"OITM\" T0 INNER JOIN \"OITB\" T1 ON T0.\"ItmsGrpCod\" = T1.\"ItmsGrpCod\" \
         WHERE {} ORDER BY T1.\"ItmsGrpCod\", T0.\"ItemCode\"",
        clauses.join(" AND ")
    );

    HanaQuery { sql, ..query }
}
