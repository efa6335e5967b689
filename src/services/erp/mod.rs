// SAP Business One write-back
// Service Layer client (sessions, sales orders, business partners) and the
// per-company registry that owns the clients

pub mod registry;
pub mod service_layer;

pub use registry::ServiceLayerRegistry;
pub use service_layer::{
    BusinessPartnerDetails, CreatedSalesOrder, NewBusinessPartner, SalesOrderDocument,
    SalesOrderDocumentLine, ServiceLayerClient, ServiceLayerCredentials, ServiceLayerError,
    SessionState,
};
