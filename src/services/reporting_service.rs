// Read-only SAP reports: territories, target vs achievement, hierarchy
// rollups, the product catalog and the generic table browse.

use serde::Serialize;
use std::sync::Arc;

use crate::middleware::error_handling::Result;
use crate::models::product::ProductRow;
use crate::models::report::{TargetSummaryRow, TerritoryListQuery, TerritoryRow};
use crate::services::hana::{
    queries, BrowseRequest, HanaConnector, HanaRow, ProductCatalogFilter, RowExt, TargetFilter, TargetKind,
};
use crate::services::territory_hierarchy::{
    EmployeeAssignment, GroupBy, RollupGroup, RollupNode, TargetFact, Territory, TerritoryTree,
};

/// Hierarchy output: flat groups for a level, or the nested tree.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum HierarchyReport {
    Groups(Vec<RollupGroup>),
    Tree(Vec<RollupNode>),
}

impl HierarchyReport {
    pub fn len(&self) -> usize {
        match self {
            HierarchyReport::Groups(groups) => groups.len(),
            HierarchyReport::Tree(nodes) => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fact_from_row(row: &HanaRow) -> Option<TargetFact> {
    Some(TargetFact {
        territory_id: row.get_i64("TerritoryId")?,
        employee_id: row.get_i64("EmpId"),
        from_date: row.get_date("FromDate"),
        to_date: row.get_date("ToDate"),
        target: row.get_decimal("Target").unwrap_or_default(),
        achievement: row.get_decimal("Achievement").unwrap_or_default(),
    })
}

fn assignment_from_row(row: &HanaRow) -> Option<EmployeeAssignment> {
    let first = row.get_string("FirstName").unwrap_or_default();
    let last = row.get_string("LastName").unwrap_or_default();

    Some(EmployeeAssignment {
        emp_id: row.get_i64("EmpId")?,
        name: format!("{} {}", first, last).trim().to_string(),
        territory_id: row.get_i64("TerritoryId")?,
    })
}

pub struct ReportingService {
    hana: Arc<dyn HanaConnector>,
}

impl ReportingService {
    pub fn new(hana: Arc<dyn HanaConnector>) -> Self {
        Self { hana }
    }

    pub async fn territories(&self, schema: &str, query: &TerritoryListQuery) -> Result<Vec<TerritoryRow>> {
        let rows = self
            .hana
            .fetch_all(schema, &queries::territories_full(query.status, query.limit))
            .await?;
        Ok(rows.iter().filter_map(TerritoryRow::from_row).collect())
    }

    pub async fn products(&self, schema: &str, filter: &ProductCatalogFilter) -> Result<Vec<ProductRow>> {
        let rows = self
            .hana
            .fetch_all(schema, &queries::products_catalog(filter))
            .await?;
        Ok(rows.iter().filter_map(ProductRow::from_row).collect())
    }

    pub async fn territory_names(&self, schema: &str) -> Result<Vec<String>> {
        let rows = self.hana.fetch_all(schema, &queries::territory_names()).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get_string("TerritoryName"))
            .filter(|name| !name.is_empty())
            .collect())
    }

    pub async fn target_summary(
        &self,
        schema: &str,
        kind: TargetKind,
        filter: &TargetFilter,
    ) -> Result<Vec<TargetSummaryRow>> {
        let query = match kind {
            TargetKind::Sales => queries::sales_vs_achievement(filter),
            TargetKind::Collection => queries::collection_vs_achievement(filter),
        };
        let rows = self.hana.fetch_all(schema, &query).await?;
        Ok(rows.iter().filter_map(TargetSummaryRow::from_row).collect())
    }

    /// Load OTER, the employee assignments and the leaf facts, then roll
    /// the facts up the tree. `None` returns the nested tree.
    pub async fn hierarchy(
        &self,
        schema: &str,
        kind: TargetKind,
        filter: &TargetFilter,
        group_by: Option<GroupBy>,
    ) -> Result<HierarchyReport> {
        let territories_query = queries::territory_tree();
        let employees_query = queries::employee_territories();
        let facts_query = queries::target_facts(kind, filter);

        let (territory_rows, employee_rows, fact_rows) = tokio::try_join!(
            self.hana.fetch_all(schema, &territories_query),
            self.hana.fetch_all(schema, &employees_query),
            self.hana.fetch_all(schema, &facts_query),
        )?;

        let territories: Vec<Territory> = territory_rows
            .iter()
            .filter_map(TerritoryRow::from_row)
            .map(|row| Territory {
                id: row.territory_id,
                name: row.territory_name,
                parent_id: row.parent_id,
            })
            .collect();
        let assignments: Vec<EmployeeAssignment> =
            employee_rows.iter().filter_map(assignment_from_row).collect();
        let facts: Vec<TargetFact> = fact_rows.iter().filter_map(fact_from_row).collect();

        let tree = TerritoryTree::new(territories).with_employees(assignments);
        tracing::debug!(
            "📊 Rolling up {} facts over {} territories in {}",
            facts.len(),
            tree.len(),
            schema
        );

        Ok(match group_by {
            Some(group_by) => HierarchyReport::Groups(tree.rollup(&facts, group_by)),
            None => HierarchyReport::Tree(tree.rollup_tree(&facts)),
        })
    }

    /// Generic browse. An unusable table name returns no rows.
    pub async fn browse(&self, schema: &str, request: &BrowseRequest) -> Result<Vec<HanaRow>> {
        match request.to_query() {
            Some(query) => Ok(self.hana.fetch_all(schema, &query).await?),
            None => {
                tracing::debug!("Browse request rejected: unusable table name");
                Ok(Vec::new())
            }
        }
    }
}
