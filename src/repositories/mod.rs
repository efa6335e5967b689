// Local persistence: the portal owns sales orders and settings; everything
// else is read from SAP. Handlers and services depend on the traits so the
// stores can be swapped (tests run against in-memory implementations).

pub mod sales_order_repo;
pub mod settings_repo;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::sales_order::{
    CreateSalesOrderRequest, ListSalesOrdersQuery, SalesOrder, UpdateSalesOrderRequest,
};

pub use sales_order_repo::SalesOrderRepository;
pub use settings_repo::SettingsRepository;

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, slug: &str) -> Result<Option<Value>>;
}

#[async_trait]
pub trait SalesOrderStore: Send + Sync {
    async fn create(&self, company_db: &str, request: &CreateSalesOrderRequest) -> Result<SalesOrder>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SalesOrder>>;

    async fn list(&self, query: &ListSalesOrdersQuery) -> Result<Vec<SalesOrder>>;

    /// Apply edits to an order that is not posted. Returns `None` when the
    /// order does not exist or is already posted.
    async fn update_unposted(&self, id: Uuid, request: &UpdateSalesOrderRequest) -> Result<Option<SalesOrder>>;

    async fn record_posting_success(
        &self,
        id: Uuid,
        doc_entry: i64,
        doc_num: i64,
        response: &Value,
    ) -> Result<SalesOrder>;

    async fn record_posting_failure(&self, id: Uuid, error: &str, response: Option<&Value>) -> Result<SalesOrder>;
}
