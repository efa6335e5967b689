pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use config::AppConfig;
use middleware::company::COMPANY_HEADER;
use middleware::error_handling::Result;
use repositories::{SalesOrderStore, SettingsStore};
use services::erp::ServiceLayerRegistry;
use services::hana::HanaConnector;
use services::PortalSettings;

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub hana: Arc<dyn HanaConnector>,
    pub sales_orders: Arc<dyn SalesOrderStore>,
    pub service_layer: Arc<ServiceLayerRegistry>,
    pub settings: Arc<PortalSettings>,
}

impl AppState {
    /// Build the state and take the first settings snapshot, so a broken
    /// settings store fails startup rather than the first request.
    pub async fn load(
        config: AppConfig,
        hana: Arc<dyn HanaConnector>,
        settings: Arc<dyn SettingsStore>,
        sales_orders: Arc<dyn SalesOrderStore>,
    ) -> Result<Self> {
        let service_layer = Arc::new(ServiceLayerRegistry::new(config.service_layer.clone(), None));
        let settings = Arc::new(PortalSettings::new(&config, settings, service_layer.clone()));
        settings.current().await?;

        Ok(Self {
            config: Arc::new(config),
            hana,
            sales_orders,
            service_layer,
            settings,
        })
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(COMPANY_HEADER),
        ])
}

pub fn create_app(state: AppState) -> Router {
    use handlers::{business_partners, company, customers, general_ledger, reports, sales_orders};

    let sap = Router::new()
        .route("/companies", get(company::list_companies))
        .route("/territories", get(reports::list_territories))
        .route("/territory-names", get(reports::territory_names))
        .route("/sales-vs-achievement", get(reports::sales_vs_achievement))
        .route("/sales-vs-achievement/hierarchy", get(reports::sales_hierarchy))
        .route("/collection-vs-achievement", get(reports::collection_vs_achievement))
        .route("/collection-vs-achievement/hierarchy", get(reports::collection_hierarchy))
        .route("/child-customers", get(customers::child_customers))
        .route("/customers/:card_code/balance", get(customers::policy_balance))
        .route("/browse", get(reports::browse_table))
        .route("/products", get(reports::products_catalog))
        .route("/general-ledger", get(general_ledger::general_ledger))
        .route("/chart-of-accounts", get(general_ledger::chart_of_accounts))
        .route("/transaction-types", get(general_ledger::transaction_types))
        .route("/projects", get(general_ledger::projects))
        .route(
            "/accounts/:account/opening-balance",
            get(general_ledger::opening_balance),
        )
        .route(
            "/business-partners",
            post(business_partners::create_business_partner).get(general_ledger::business_partners),
        )
        .route("/business-partners/:card_code", get(business_partners::get_business_partner))
        .route(
            "/business-partners/:card_code/summary",
            get(business_partners::get_business_partner_summary),
        )
        .route("/connection-test", get(business_partners::test_connection));

    let orders = Router::new()
        .route(
            "/",
            post(sales_orders::create_sales_order).get(sales_orders::list_sales_orders),
        )
        .route(
            "/:id",
            get(sales_orders::get_sales_order).put(sales_orders::update_sales_order),
        )
        .route("/:id/post-to-sap", post(sales_orders::post_to_sap))
        .route("/:id/sap-document", get(sales_orders::get_sap_document));

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/api/health", get(company::health))
        .nest("/api/sap", sap)
        .nest("/api/sales-orders", orders)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
