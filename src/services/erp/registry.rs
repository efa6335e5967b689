// One Service Layer client per company database, created on first use.
// Credentials can be swapped at runtime; a change drops the cached clients
// so the next call logs in with the new user.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::service_layer::{Result, ServiceLayerClient, ServiceLayerCredentials, ServiceLayerError};
use crate::config::ServiceLayerConfig;

pub struct ServiceLayerRegistry {
    config: ServiceLayerConfig,
    credentials: RwLock<Option<ServiceLayerCredentials>>,
    clients: RwLock<HashMap<String, Arc<ServiceLayerClient>>>,
}

impl ServiceLayerRegistry {
    pub fn new(config: ServiceLayerConfig, credentials: Option<ServiceLayerCredentials>) -> Self {
        Self {
            config,
            credentials: RwLock::new(credentials),
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Replace the credentials. Returns `true` when they changed, in which
    /// case every cached client is dropped.
    pub fn set_credentials(&self, credentials: Option<ServiceLayerCredentials>) -> bool {
        {
            let mut current = self.credentials.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            if *current == credentials {
                return false;
            }
            *current = credentials;
        }

        let dropped = {
            let mut clients = self.clients.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            let count = clients.len();
            clients.clear();
            count
        };
        tracing::info!(
            "🔑 SAP Service Layer credentials changed, {} cached session(s) dropped",
            dropped
        );
        true
    }

    /// Client for `company_db` (a HANA schema name such as `4B-BIO_APP`).
    pub fn client(&self, company_db: &str) -> Result<Arc<ServiceLayerClient>> {
        {
            let clients = self.clients.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(client) = clients.get(company_db) {
                return Ok(Arc::clone(client));
            }
        }

        let credentials = self
            .credentials
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| {
                ServiceLayerError::ConfigError(
                    "no SAP credentials (SAP_USERNAME/SAP_PASSWORD or sap_credential setting)".to_string(),
                )
            })?;

        let mut clients = self.clients.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = clients.get(company_db) {
            return Ok(Arc::clone(client));
        }

        let client = Arc::new(ServiceLayerClient::new(&self.config, credentials, company_db)?);
        clients.insert(company_db.to_string(), Arc::clone(&client));
        tracing::debug!("Service Layer client created for {}", company_db);
        Ok(client)
    }

    /// Log out every cached session.
    pub async fn logout_all(&self) {
        let clients: Vec<Arc<ServiceLayerClient>> = {
            let clients = self.clients.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            clients.values().cloned().collect()
        };

        for client in clients {
            if let Err(e) = client.logout().await {
                tracing::warn!("SAP logout for {} failed: {}", client.company_db(), e);
            }
        }
    }
}
