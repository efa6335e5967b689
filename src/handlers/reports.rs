// SAP report endpoints (HANA, read-only)

use axum::{
    extract::{Query, State},
    Json,
};
use std::str::FromStr;

use crate::{
    middleware::{
        error_handling::{AppError, Result},
        Company,
    },
    models::{
        product::ProductRow,
        report::{HierarchyQuery, ReportResponse, TargetSummaryRow, TerritoryListQuery, TerritoryRow},
    },
    services::{
        hana::{BrowseRequest, HanaRow, ProductCatalogFilter, TargetFilter, TargetKind},
        territory_hierarchy::GroupBy,
        HierarchyReport, ReportingService,
    },
    AppState,
};

fn reporting(state: &AppState) -> ReportingService {
    ReportingService::new(state.hana.clone())
}

pub async fn list_territories(
    State(state): State<AppState>,
    company: Company,
    Query(params): Query<TerritoryListQuery>,
) -> Result<Json<ReportResponse<Vec<TerritoryRow>>>> {
    let rows = reporting(&state).territories(&company.schema, &params).await?;
    Ok(Json(ReportResponse::from_rows(rows)))
}

pub async fn territory_names(
    State(state): State<AppState>,
    company: Company,
) -> Result<Json<ReportResponse<Vec<String>>>> {
    let names = reporting(&state).territory_names(&company.schema).await?;
    Ok(Json(ReportResponse::from_rows(names)))
}

pub async fn sales_vs_achievement(
    State(state): State<AppState>,
    company: Company,
    Query(filter): Query<TargetFilter>,
) -> Result<Json<ReportResponse<Vec<TargetSummaryRow>>>> {
    let rows = reporting(&state)
        .target_summary(&company.schema, TargetKind::Sales, &filter)
        .await?;
    Ok(Json(ReportResponse::from_rows(rows)))
}

pub async fn collection_vs_achievement(
    State(state): State<AppState>,
    company: Company,
    Query(filter): Query<TargetFilter>,
) -> Result<Json<ReportResponse<Vec<TargetSummaryRow>>>> {
    let rows = reporting(&state)
        .target_summary(&company.schema, TargetKind::Collection, &filter)
        .await?;
    Ok(Json(ReportResponse::from_rows(rows)))
}

async fn hierarchy(
    state: &AppState,
    company: &Company,
    kind: TargetKind,
    params: &HierarchyQuery,
) -> Result<Json<ReportResponse<HierarchyReport>>> {
    let group_by = params
        .level
        .as_deref()
        .filter(|level| !level.trim().is_empty())
        .map(GroupBy::from_str)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let report = reporting(state)
        .hierarchy(&company.schema, kind, &params.filter(), group_by)
        .await?;

    Ok(Json(ReportResponse {
        success: true,
        count: report.len(),
        data: report,
    }))
}

pub async fn sales_hierarchy(
    State(state): State<AppState>,
    company: Company,
    Query(params): Query<HierarchyQuery>,
) -> Result<Json<ReportResponse<HierarchyReport>>> {
    hierarchy(&state, &company, TargetKind::Sales, &params).await
}

pub async fn collection_hierarchy(
    State(state): State<AppState>,
    company: Company,
    Query(params): Query<HierarchyQuery>,
) -> Result<Json<ReportResponse<HierarchyReport>>> {
    hierarchy(&state, &company, TargetKind::Collection, &params).await
}

pub async fn browse_table(
    State(state): State<AppState>,
    company: Company,
    Query(request): Query<BrowseRequest>,
) -> Result<Json<ReportResponse<Vec<HanaRow>>>> {
    let rows = reporting(&state).browse(&company.schema, &request).await?;
    Ok(Json(ReportResponse::from_rows(rows)))
}

pub async fn products_catalog(
    State(state): State<AppState>,
    company: Company,
    Query(filter): Query<ProductCatalogFilter>,
) -> Result<Json<ReportResponse<Vec<ProductRow>>>> {
    let products = reporting(&state).products(&company.schema, &filter).await?;
    Ok(Json(ReportResponse::from_rows(products)))
}
