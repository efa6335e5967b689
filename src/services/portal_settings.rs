// Runtime portal settings
// SAP_COMPANY_DB and sap_credential are edited by operators while the
// portal runs. They are served from a snapshot that is re-read once it is
// older than SETTINGS_REFRESH_SECS; a refresh also pushes the credentials
// into the Service Layer registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;

use super::company_schema::SchemaResolver;
use super::erp::{ServiceLayerCredentials, ServiceLayerRegistry};
use crate::config::AppConfig;
use crate::middleware::error_handling::Result;
use crate::models::setting::{SAP_COMPANY_DB, SAP_CREDENTIAL};
use crate::repositories::SettingsStore;

struct Snapshot {
    loaded_at: Instant,
    schemas: Arc<SchemaResolver>,
}

pub struct PortalSettings {
    store: Arc<dyn SettingsStore>,
    service_layer: Arc<ServiceLayerRegistry>,
    default_schema: Option<String>,
    env_credentials: Option<ServiceLayerCredentials>,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

/// SAP_USERNAME/SAP_PASSWORD win over the `sap_credential` setting.
pub fn credentials_from(
    env_credentials: Option<&ServiceLayerCredentials>,
    setting: Option<&Value>,
) -> Option<ServiceLayerCredentials> {
    if let Some(credentials) = env_credentials {
        return Some(credentials.clone());
    }

    setting.and_then(|value| {
        let parsed = ServiceLayerCredentials::from_setting_value(value);
        if parsed.is_none() {
            tracing::warn!("⚠️  {} setting is malformed, ignoring it", SAP_CREDENTIAL);
        }
        parsed
    })
}

impl PortalSettings {
    pub fn new(config: &AppConfig, store: Arc<dyn SettingsStore>, service_layer: Arc<ServiceLayerRegistry>) -> Self {
        let env_credentials = config.service_layer.username.clone().map(|username| {
            let password = config.service_layer.password.clone().unwrap_or_default();
            ServiceLayerCredentials::new(username, password)
        });

        Self {
            store,
            service_layer,
            default_schema: config.hana.default_schema.clone(),
            env_credentials,
            ttl: config.settings_refresh,
            snapshot: RwLock::new(None),
        }
    }

    /// The current company mapping, re-read from the store when stale.
    pub async fn current(&self) -> Result<Arc<SchemaResolver>> {
        {
            let snapshot = self.snapshot.read().await;
            if let Some(snapshot) = snapshot.as_ref() {
                if snapshot.loaded_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&snapshot.schemas));
                }
            }
        }

        let mut snapshot = self.snapshot.write().await;
        if let Some(fresh) = snapshot.as_ref() {
            if fresh.loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&fresh.schemas));
            }
        }

        match self.load().await {
            Ok(schemas) => {
                *snapshot = Some(Snapshot {
                    loaded_at: Instant::now(),
                    schemas: Arc::clone(&schemas),
                });
                Ok(schemas)
            }
            Err(e) => match snapshot.as_mut() {
                Some(stale) => {
                    tracing::warn!("⚠️  Could not refresh portal settings, keeping previous values: {}", e);
                    stale.loaded_at = Instant::now();
                    Ok(Arc::clone(&stale.schemas))
                }
                None => Err(e),
            },
        }
    }

    async fn load(&self) -> Result<Arc<SchemaResolver>> {
        let (mapping, credential) = tokio::try_join!(
            self.store.get(SAP_COMPANY_DB),
            self.store.get(SAP_CREDENTIAL)
        )?;

        let schemas = SchemaResolver::from_setting(mapping.as_ref(), self.default_schema.clone());
        let credentials = credentials_from(self.env_credentials.as_ref(), credential.as_ref());
        let missing = credentials.is_none();
        if self.service_layer.set_credentials(credentials) && missing {
            tracing::warn!("⚠️  SAP Service Layer credentials were removed; posting to SAP is disabled");
        }

        Ok(Arc::new(schemas))
    }
}
