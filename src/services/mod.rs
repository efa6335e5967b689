pub mod company_schema;
pub mod customer_service;
pub mod erp;
pub mod general_ledger_service;
pub mod hana;
pub mod portal_settings;
pub mod reporting_service;
pub mod sales_order_service;
pub mod territory_hierarchy;

pub use company_schema::SchemaResolver;
pub use customer_service::CustomerService;
pub use general_ledger_service::GeneralLedgerService;
pub use portal_settings::PortalSettings;
pub use reporting_service::{HierarchyReport, ReportingService};
pub use sales_order_service::SalesOrderService;
pub use territory_hierarchy::TerritoryTree;
