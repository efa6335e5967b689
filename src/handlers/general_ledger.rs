// General ledger endpoints (HANA, read-only)

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    middleware::{error_handling::Result, Company},
    models::{
        ledger::{
            AccountRow, ChartOfAccountsQuery, LedgerPartner, LedgerPartnerQuery, LedgerQuery, LedgerReport,
            OpeningBalance, OpeningBalanceQuery, ProjectRow, ProjectsQuery, TransactionType,
        },
        report::ReportResponse,
    },
    services::GeneralLedgerService,
    AppState,
};

fn ledger(state: &AppState) -> GeneralLedgerService {
    GeneralLedgerService::new(state.hana.clone())
}

pub async fn general_ledger(
    State(state): State<AppState>,
    company: Company,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<LedgerReport>> {
    let report = ledger(&state).report(&company.schema, &query).await?;
    Ok(Json(report))
}

pub async fn opening_balance(
    State(state): State<AppState>,
    company: Company,
    Path(account): Path<String>,
    Query(query): Query<OpeningBalanceQuery>,
) -> Result<Json<ReportResponse<OpeningBalance>>> {
    let balance = ledger(&state)
        .opening_balance(&company.schema, &account, query.before, query.bp_code.as_deref())
        .await?;

    Ok(Json(ReportResponse {
        success: true,
        count: 1,
        data: balance,
    }))
}

pub async fn chart_of_accounts(
    State(state): State<AppState>,
    company: Company,
    Query(query): Query<ChartOfAccountsQuery>,
) -> Result<Json<ReportResponse<Vec<AccountRow>>>> {
    let accounts = ledger(&state)
        .chart_of_accounts(&company.schema, query.account_type.as_deref())
        .await?;
    Ok(Json(ReportResponse::from_rows(accounts)))
}

pub async fn transaction_types(State(state): State<AppState>) -> Json<ReportResponse<Vec<TransactionType>>> {
    Json(ReportResponse::from_rows(ledger(&state).transaction_types()))
}

pub async fn business_partners(
    State(state): State<AppState>,
    company: Company,
    Query(query): Query<LedgerPartnerQuery>,
) -> Result<Json<ReportResponse<Vec<LedgerPartner>>>> {
    let partners = ledger(&state)
        .business_partners(&company.schema, query.bp_type.as_deref(), query.limit)
        .await?;
    Ok(Json(ReportResponse::from_rows(partners)))
}

pub async fn projects(
    State(state): State<AppState>,
    company: Company,
    Query(query): Query<ProjectsQuery>,
) -> Result<Json<ReportResponse<Vec<ProjectRow>>>> {
    let projects = ledger(&state).projects(&company.schema, query.active_only).await?;
    Ok(Json(ReportResponse::from_rows(projects)))
}
