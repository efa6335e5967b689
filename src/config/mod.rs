pub mod database;
pub mod tls;

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

pub use tls::{ClientTlsConfig, TlsMinVersion};

/// Parse the boolean spellings used in the portal's `.env` files.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: lookup("DATABASE_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: lookup("DATABASE_PORT")
                .unwrap_or_else(|| "5432".to_string())
                .parse()
                .context("Invalid DATABASE_PORT")?,
            username: lookup("DATABASE_USER").unwrap_or_else(|| "postgres".to_string()),
            password: lookup("DATABASE_PASSWORD").unwrap_or_default(),
            database: lookup("DATABASE_NAME").unwrap_or_else(|| "field_portal".to_string()),
            ssl_mode: lookup("DATABASE_SSL_MODE").unwrap_or_else(|| "prefer".to_string()),
            url: lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()),
        })
    }

    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.username, self.password, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

/// SAP HANA connection settings. `timeout` bounds one connect plus statement.
#[derive(Debug, Clone)]
pub struct HanaConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub default_schema: Option<String>,
    pub encrypt: bool,
    pub ssl_validate: bool,
    pub timeout: Duration,
}

impl HanaConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs: u64 = lookup("HANA_TIMEOUT_SECS")
            .unwrap_or_else(|| "60".to_string())
            .parse()
            .context("Invalid HANA_TIMEOUT_SECS")?;

        Ok(Self {
            host: lookup("HANA_HOST").unwrap_or_default(),
            port: lookup("HANA_PORT")
                .unwrap_or_else(|| "30015".to_string())
                .parse()
                .context("Invalid HANA_PORT")?,
            user: lookup("HANA_USER").unwrap_or_default(),
            password: lookup("HANA_PASSWORD").unwrap_or_default(),
            default_schema: lookup("HANA_SCHEMA")
                .map(|s| s.trim().trim_matches(['"', '\'']).to_string())
                .filter(|s| !s.is_empty()),
            encrypt: lookup("HANA_ENCRYPT").and_then(|v| parse_bool(&v)).unwrap_or(true),
            ssl_validate: lookup("HANA_SSL_VALIDATE")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(false),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn server_node(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// SAP Business One Service Layer settings.
#[derive(Debug, Clone)]
pub struct ServiceLayerConfig {
    pub host: String,
    pub port: u16,
    pub use_http: bool,
    /// Credentials from the environment; when absent the `sap_credential`
    /// setting row is consulted.
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_ttl: Duration,
    pub timeout: Duration,
    pub tls: ClientTlsConfig,
}

impl ServiceLayerConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let session_ttl_secs: u64 = lookup("SAP_SESSION_TTL_SECS")
            .unwrap_or_else(|| "300".to_string())
            .parse()
            .context("Invalid SAP_SESSION_TTL_SECS")?;
        let timeout_secs: u64 = lookup("SAP_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("Invalid SAP_TIMEOUT_SECS")?;

        Ok(Self {
            host: lookup("SAP_B1S_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: lookup("SAP_B1S_PORT")
                .unwrap_or_else(|| "50000".to_string())
                .parse()
                .context("Invalid SAP_B1S_PORT")?,
            use_http: lookup("SAP_USE_HTTP").and_then(|v| parse_bool(&v)).unwrap_or(false),
            username: lookup("SAP_USERNAME").filter(|s| !s.is_empty()),
            password: lookup("SAP_PASSWORD").filter(|s| !s.is_empty()),
            session_ttl: Duration::from_secs(session_ttl_secs),
            timeout: Duration::from_secs(timeout_secs),
            tls: ClientTlsConfig::from_lookup(|k| lookup(k))?,
        })
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.use_http { "http" } else { "https" };
        format!("{}://{}:{}/b1s/v1", scheme, self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub hana: HanaConfig,
    pub service_layer: ServiceLayerConfig,
    /// Company key used when a request names none. Empty means the
    /// `HANA_SCHEMA` schema.
    pub default_company_db: String,
    /// How long the `SAP_COMPANY_DB` and `sap_credential` settings are
    /// served from memory before they are read again.
    pub settings_refresh: Duration,
    pub server_host: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let settings_refresh_secs: u64 = lookup("SETTINGS_REFRESH_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("Invalid SETTINGS_REFRESH_SECS")?;

        Ok(Self {
            database: DatabaseConfig::from_lookup(&lookup)?,
            hana: HanaConfig::from_lookup(&lookup)?,
            service_layer: ServiceLayerConfig::from_lookup(&lookup)?,
            default_company_db: lookup("DEFAULT_COMPANY_DB")
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            settings_refresh: Duration::from_secs(settings_refresh_secs),
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: lookup("SERVER_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            cors_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
