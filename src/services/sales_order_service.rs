// Sales orders captured in the portal and pushed to SAP on request.
// A failed push is recorded on the order (message + SAP payload) and left
// for the operator to fix and post again; nothing is retried here.

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::sales_order::{
    CreateSalesOrderRequest, ListSalesOrdersQuery, PostToSapResponse, SalesOrder, UpdateSalesOrderRequest,
};
use crate::repositories::SalesOrderStore;
use crate::services::erp::{
    CreatedSalesOrder, SalesOrderDocument, SalesOrderDocumentLine, ServiceLayerError, ServiceLayerRegistry,
};
use crate::utils::log_sanitizer::sanitize_for_log;

const SAP_DATE_FORMAT: &str = "%Y-%m-%d";

/// Service Layer body for a stored order.
pub fn build_document(order: &SalesOrder) -> SalesOrderDocument {
    SalesOrderDocument {
        card_code: order.card_code.clone(),
        card_name: order.card_name.clone(),
        doc_date: order.doc_date.format(SAP_DATE_FORMAT).to_string(),
        doc_due_date: order.doc_due_date.format(SAP_DATE_FORMAT).to_string(),
        tax_date: order.tax_date.map(|d| d.format(SAP_DATE_FORMAT).to_string()),
        comments: order.comments.clone(),
        contact_person_code: order.contact_person_code,
        federal_tax_id: order.federal_tax_id.clone(),
        pay_to_code: order.pay_to_code.clone(),
        address: order.address.clone(),
        secondary_card_code: order.secondary_card_code.clone(),
        secondary_card_name: order.secondary_card_name.clone(),
        document_lines: order
            .lines
            .iter()
            .map(|line| SalesOrderDocumentLine {
                line_num: line.line_num,
                item_code: line.item_code.clone(),
                item_description: line.item_description.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                discount_percent: line.discount_percent,
                tax_code: line.tax_code.clone(),
                warehouse_code: line.warehouse_code.clone(),
                policy: line.policy.clone(),
            })
            .collect(),
    }
}

/// Text stored in `sap_error`: SAP's own message when it sent one.
fn failure_message(error: &ServiceLayerError) -> String {
    match error {
        ServiceLayerError::Business { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

pub struct SalesOrderService {
    store: Arc<dyn SalesOrderStore>,
    service_layer: Arc<ServiceLayerRegistry>,
}

impl SalesOrderService {
    pub fn new(store: Arc<dyn SalesOrderStore>, service_layer: Arc<ServiceLayerRegistry>) -> Self {
        Self { store, service_layer }
    }

    pub async fn create(&self, company_db: &str, request: CreateSalesOrderRequest) -> Result<SalesOrder> {
        request.validate()?;

        let order = self.store.create(company_db, &request).await?;
        tracing::info!(
            "📝 Sales order {} created for {} ({} lines)",
            order.id,
            sanitize_for_log(&order.card_code),
            order.lines.len()
        );
        Ok(order)
    }

    pub async fn get(&self, id: Uuid) -> Result<SalesOrder> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sales order not found".to_string()))
    }

    pub async fn list(&self, query: &ListSalesOrdersQuery) -> Result<Vec<SalesOrder>> {
        self.store.list(query).await
    }

    pub async fn update(&self, id: Uuid, request: UpdateSalesOrderRequest) -> Result<SalesOrder> {
        request.validate()?;

        match self.store.update_unposted(id, &request).await? {
            Some(order) => Ok(order),
            None => {
                // tell "missing" apart from "already posted"
                self.get(id).await?;
                Err(AppError::Conflict("Sales order is already posted to SAP".to_string()))
            }
        }
    }

    /// The SAP copy of a posted order, read back by DocEntry.
    pub async fn sap_document(&self, id: Uuid) -> Result<serde_json::Value> {
        let order = self.get(id).await?;
        let doc_entry = order
            .sap_doc_entry
            .filter(|_| order.is_posted_to_sap)
            .ok_or_else(|| AppError::NotFound("Sales order has not been posted to SAP".to_string()))?;

        let client = self.service_layer.client(&order.company_db)?;
        Ok(client.get_sales_order(doc_entry).await?)
    }

    async fn push(&self, order: &SalesOrder) -> std::result::Result<CreatedSalesOrder, ServiceLayerError> {
        let client = self.service_layer.client(&order.company_db)?;
        client.create_sales_order(&build_document(order)).await
    }

    /// Push the order to SAP once. The outcome is stored on the order and
    /// returned; `success` is false when SAP (or the connection) failed.
    pub async fn post_to_sap(&self, id: Uuid) -> Result<PostToSapResponse> {
        let order = self.get(id).await?;
        if order.is_posted_to_sap {
            return Err(AppError::Conflict(format!(
                "Sales order is already posted to SAP (DocNum {})",
                order.sap_doc_num.unwrap_or_default()
            )));
        }

        tracing::info!(
            "📤 Posting sales order {} to SAP company {}",
            order.id,
            sanitize_for_log(&order.company_db)
        );

        match self.push(&order).await {
            Ok(created) => {
                let order = self
                    .store
                    .record_posting_success(id, created.doc_entry, created.doc_num, &created.payload)
                    .await?;
                Ok(PostToSapResponse {
                    success: true,
                    message: format!("Posted to SAP as document {}", created.doc_num),
                    order,
                })
            }
            Err(error) => {
                let message = failure_message(&error);
                tracing::warn!(
                    "⚠️  Sales order {} was not posted: {}",
                    id,
                    sanitize_for_log(&message)
                );
                let order = self
                    .store
                    .record_posting_failure(id, &message, error.payload())
                    .await?;
                if order.is_posted_to_sap {
                    return Ok(PostToSapResponse {
                        success: true,
                        message: format!(
                            "Already posted to SAP as document {}",
                            order.sap_doc_num.unwrap_or_default()
                        ),
                        order,
                    });
                }
                Ok(PostToSapResponse {
                    success: false,
                    message,
                    order,
                })
            }
        }
    }
}
