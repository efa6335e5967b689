// Sales order capture and SAP posting

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    middleware::{error_handling::Result, Company},
    models::sales_order::{
        CreateSalesOrderRequest, ListSalesOrdersQuery, PostToSapResponse, SalesOrder, UpdateSalesOrderRequest,
    },
    services::SalesOrderService,
    AppState,
};

fn sales_orders(state: &AppState) -> SalesOrderService {
    SalesOrderService::new(state.sales_orders.clone(), state.service_layer.clone())
}

// Picks up rotated Service Layer credentials before talking to SAP.
async fn sales_orders_for_sap(state: &AppState) -> Result<SalesOrderService> {
    state.settings.current().await?;
    Ok(sales_orders(state))
}

pub async fn create_sales_order(
    State(state): State<AppState>,
    company: Company,
    Json(request): Json<CreateSalesOrderRequest>,
) -> Result<(StatusCode, Json<SalesOrder>)> {
    let order = sales_orders(&state).create(&company.schema, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_sales_orders(
    State(state): State<AppState>,
    Query(params): Query<ListSalesOrdersQuery>,
) -> Result<Json<Vec<SalesOrder>>> {
    let orders = sales_orders(&state).list(&params).await?;
    Ok(Json(orders))
}

pub async fn get_sales_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SalesOrder>> {
    let order = sales_orders(&state).get(id).await?;
    Ok(Json(order))
}

pub async fn update_sales_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSalesOrderRequest>,
) -> Result<Json<SalesOrder>> {
    let order = sales_orders(&state).update(id, request).await?;
    Ok(Json(order))
}

pub async fn get_sap_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let document = sales_orders_for_sap(&state).await?.sap_document(id).await?;
    Ok(Json(document))
}

/// 200 when SAP accepted the order, 422 when the push failed; the failure
/// is stored on the returned order either way.
pub async fn post_to_sap(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<PostToSapResponse>)> {
    let outcome = sales_orders_for_sap(&state).await?.post_to_sap(id).await?;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(outcome)))
}
