use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{query, PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::SalesOrderStore;
use crate::middleware::error_handling::{AppError, Result};
use crate::models::sales_order::{
    CreateSalesOrderRequest, ListSalesOrdersQuery, SalesOrder, SalesOrderLine, SalesOrderLineRequest,
    SalesOrderStatus, UpdateSalesOrderRequest,
};

const ORDER_COLUMNS: &str = "id, company_db, card_code, card_name, contact_person_code, federal_tax_id, \
     pay_to_code, address, secondary_card_code, secondary_card_name, doc_date, doc_due_date, tax_date, \
     comments, status, is_posted_to_sap, sap_doc_entry, sap_doc_num, sap_error, sap_response_json, \
     posted_at, created_at, updated_at";

const LINE_COLUMNS: &str = "sales_order_id, line_num, item_code, item_description, quantity, unit_price, \
     discount_percent, tax_code, warehouse_code, policy";

// A failure never overwrites an order that already reached SAP.
const RECORD_FAILURE_SQL: &str = r#"
    UPDATE sales_orders SET
        status = 'failed', sap_error = $2, sap_response_json = $3, updated_at = NOW()
    WHERE id = $1 AND is_posted_to_sap = FALSE
"#;

pub struct SalesOrderRepository {
    pool: PgPool,
}

fn order_from_row(row: &PgRow, lines: Vec<SalesOrderLine>) -> Result<SalesOrder> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<SalesOrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    Ok(SalesOrder {
        id: row.try_get("id")?,
        company_db: row.try_get("company_db")?,
        card_code: row.try_get("card_code")?,
        card_name: row.try_get("card_name")?,
        contact_person_code: row.try_get("contact_person_code")?,
        federal_tax_id: row.try_get("federal_tax_id")?,
        pay_to_code: row.try_get("pay_to_code")?,
        address: row.try_get("address")?,
        secondary_card_code: row.try_get("secondary_card_code")?,
        secondary_card_name: row.try_get("secondary_card_name")?,
        doc_date: row.try_get("doc_date")?,
        doc_due_date: row.try_get("doc_due_date")?,
        tax_date: row.try_get("tax_date")?,
        comments: row.try_get("comments")?,
        status,
        is_posted_to_sap: row.try_get("is_posted_to_sap")?,
        sap_doc_entry: row.try_get("sap_doc_entry")?,
        sap_doc_num: row.try_get("sap_doc_num")?,
        sap_error: row.try_get("sap_error")?,
        sap_response_json: row.try_get("sap_response_json")?,
        posted_at: row.try_get("posted_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        lines,
    })
}

fn line_from_row(row: &PgRow) -> Result<SalesOrderLine> {
    Ok(SalesOrderLine {
        line_num: row.try_get("line_num")?,
        item_code: row.try_get("item_code")?,
        item_description: row.try_get("item_description")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        discount_percent: row.try_get("discount_percent")?,
        tax_code: row.try_get("tax_code")?,
        warehouse_code: row.try_get("warehouse_code")?,
        policy: row.try_get("policy")?,
    })
}

impl SalesOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_lines(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        lines: &[SalesOrderLineRequest],
    ) -> Result<()> {
        for (index, line) in lines.iter().enumerate() {
            let line = line.clone().into_line(index as i32);
            query(
                r#"
                INSERT INTO sales_order_lines (sales_order_id, line_num, item_code, item_description, quantity,
                    unit_price, discount_percent, tax_code, warehouse_code, policy)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(order_id)
            .bind(line.line_num)
            .bind(&line.item_code)
            .bind(&line.item_description)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.discount_percent)
            .bind(&line.tax_code)
            .bind(&line.warehouse_code)
            .bind(&line.policy)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn lines_for(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<SalesOrderLine>>> {
        let rows = query(&format!(
            "SELECT {} FROM sales_order_lines WHERE sales_order_id = ANY($1) ORDER BY sales_order_id, line_num",
            LINE_COLUMNS
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<Uuid, Vec<SalesOrderLine>> = HashMap::new();
        for row in &rows {
            let order_id: Uuid = row.try_get("sales_order_id")?;
            lines.entry(order_id).or_default().push(line_from_row(row)?);
        }
        Ok(lines)
    }

    async fn require(&self, id: Uuid) -> Result<SalesOrder> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sales order not found".to_string()))
    }
}

#[async_trait]
impl SalesOrderStore for SalesOrderRepository {
    async fn create(&self, company_db: &str, request: &CreateSalesOrderRequest) -> Result<SalesOrder> {
        let id = Uuid::new_v4();
        let doc_date = request.doc_date.unwrap_or_else(|| Utc::now().date_naive());
        let doc_due_date = request.doc_due_date.unwrap_or(doc_date);

        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO sales_orders (id, company_db, card_code, card_name, contact_person_code, federal_tax_id,
                pay_to_code, address, secondary_card_code, secondary_card_name, doc_date, doc_due_date, tax_date,
                comments, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'draft')
            "#,
        )
        .bind(id)
        .bind(company_db)
        .bind(request.card_code.trim())
        .bind(&request.card_name)
        .bind(request.contact_person_code)
        .bind(&request.federal_tax_id)
        .bind(&request.pay_to_code)
        .bind(&request.address)
        .bind(&request.secondary_card_code)
        .bind(&request.secondary_card_name)
        .bind(doc_date)
        .bind(doc_due_date)
        .bind(request.tax_date)
        .bind(&request.comments)
        .execute(&mut *tx)
        .await?;

        Self::insert_lines(&mut tx, id, &request.lines).await?;
        tx.commit().await?;

        self.require(id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SalesOrder>> {
        let row = query(&format!("SELECT {} FROM sales_orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut lines = self.lines_for(&[id]).await?;
                let order = order_from_row(&row, lines.remove(&id).unwrap_or_default())?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, request: &ListSalesOrdersQuery) -> Result<Vec<SalesOrder>> {
        let rows = query(&format!(
            "SELECT {} FROM sales_orders \
             WHERE ($1::BOOLEAN IS NULL OR is_posted_to_sap = $1) \
             AND ($2::VARCHAR IS NULL OR card_code = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            ORDER_COLUMNS
        ))
        .bind(request.posted)
        .bind(request.card_code.as_deref().map(str::trim))
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows
            .iter()
            .map(|row| row.try_get("id"))
            .collect::<std::result::Result<_, _>>()?;
        let mut lines = self.lines_for(&ids).await?;

        rows.iter()
            .zip(ids.iter())
            .map(|(row, id)| order_from_row(row, lines.remove(id).unwrap_or_default()))
            .collect()
    }

    async fn update_unposted(&self, id: Uuid, request: &UpdateSalesOrderRequest) -> Result<Option<SalesOrder>> {
        let mut tx = self.pool.begin().await?;

        let locked = query("SELECT id FROM sales_orders WHERE id = $1 AND is_posted_to_sap = FALSE FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        if locked.is_none() {
            return Ok(None);
        }

        query(
            r#"
            UPDATE sales_orders SET
                card_code = COALESCE($2, card_code),
                card_name = COALESCE($3, card_name),
                contact_person_code = COALESCE($4, contact_person_code),
                federal_tax_id = COALESCE($5, federal_tax_id),
                pay_to_code = COALESCE($6, pay_to_code),
                address = COALESCE($7, address),
                secondary_card_code = COALESCE($8, secondary_card_code),
                secondary_card_name = COALESCE($9, secondary_card_name),
                doc_date = COALESCE($10, doc_date),
                doc_due_date = COALESCE($11, doc_due_date),
                tax_date = COALESCE($12, tax_date),
                comments = COALESCE($13, comments),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(request.card_code.as_deref().map(str::trim))
        .bind(&request.card_name)
        .bind(request.contact_person_code)
        .bind(&request.federal_tax_id)
        .bind(&request.pay_to_code)
        .bind(&request.address)
        .bind(&request.secondary_card_code)
        .bind(&request.secondary_card_name)
        .bind(request.doc_date)
        .bind(request.doc_due_date)
        .bind(request.tax_date)
        .bind(&request.comments)
        .execute(&mut *tx)
        .await?;

        if let Some(lines) = &request.lines {
            query("DELETE FROM sales_order_lines WHERE sales_order_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Self::insert_lines(&mut tx, id, lines).await?;
        }

        tx.commit().await?;
        self.find_by_id(id).await
    }

    async fn record_posting_success(
        &self,
        id: Uuid,
        doc_entry: i64,
        doc_num: i64,
        response: &Value,
    ) -> Result<SalesOrder> {
        query(
            r#"
            UPDATE sales_orders SET
                status = 'posted', is_posted_to_sap = TRUE, sap_doc_entry = $2, sap_doc_num = $3,
                sap_error = NULL, sap_response_json = $4, posted_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(doc_entry)
        .bind(doc_num)
        .bind(response)
        .execute(&self.pool)
        .await?;

        self.require(id).await
    }

    async fn record_posting_failure(&self, id: Uuid, error: &str, response: Option<&Value>) -> Result<SalesOrder> {
        query(RECORD_FAILURE_SQL)
        .bind(id)
        .bind(error)
        .bind(response)
        .execute(&self.pool)
        .await?;

        self.require(id).await
    }
}
