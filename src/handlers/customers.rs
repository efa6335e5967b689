use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    middleware::{error_handling::Result, Company},
    models::{
        business_partner::{ChildCustomer, ChildCustomerQuery, PolicyBalance},
        report::ReportResponse,
    },
    services::CustomerService,
    AppState,
};

pub async fn child_customers(
    State(state): State<AppState>,
    company: Company,
    Query(params): Query<ChildCustomerQuery>,
) -> Result<Json<ReportResponse<Vec<ChildCustomer>>>> {
    let children = CustomerService::new(state.hana.clone())
        .children_for(&company.schema, &params)
        .await?;
    Ok(Json(ReportResponse::from_rows(children)))
}

pub async fn policy_balance(
    State(state): State<AppState>,
    company: Company,
    Path(card_code): Path<String>,
) -> Result<Json<ReportResponse<Vec<PolicyBalance>>>> {
    let balances = CustomerService::new(state.hana.clone())
        .policy_balance(&company.schema, &card_code)
        .await?;
    Ok(Json(ReportResponse::from_rows(balances)))
}
