use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use field_portal::config::{database::create_pool, AppConfig};
use field_portal::repositories::{SalesOrderRepository, SettingsRepository};
use field_portal::services::hana::HdbConnector;
use field_portal::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO; override with RUST_LOG
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "field_portal=info,tower_http=info,sqlx=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let pool = create_pool(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("✅ Database ready, migrations applied");

    let hana = HdbConnector::new(config.hana.clone()).context("HANA connection is not configured")?;
    tracing::info!("✅ HANA server node {}", config.hana.server_node());

    let settings = Arc::new(SettingsRepository::new(pool.clone()));
    let sales_orders = Arc::new(SalesOrderRepository::new(pool));
    let address = config.server_address();

    let state = AppState::load(config, Arc::new(hana), settings, sales_orders)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load portal settings: {}", e))?;
    let companies = state
        .settings
        .current()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load portal settings: {}", e))?;
    tracing::info!(
        "✅ {} companies available, Service Layer {}",
        companies.company_options().len(),
        if state.service_layer.is_configured() { "configured" } else { "not configured" }
    );

    let service_layer = state.service_layer.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("🚀 Field portal listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("🛑 Shutting down");
        })
        .await?;

    service_layer.logout_all().await;
    Ok(())
}
