use async_trait::async_trait;
use serde_json::Value;
use sqlx::{query, PgPool, Row};

use super::SettingsStore;
use crate::middleware::error_handling::Result;

pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn get(&self, slug: &str) -> Result<Option<Value>> {
        let row = query("SELECT value FROM settings WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }
}
