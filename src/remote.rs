//! Remote database client (PostgREST-style insert API).

use crate::config::Config;
use crate::error::{Result, TabloadError};
use crate::record::Record;
use reqwest::Client;
use std::time::Duration;

/// Seam between the loader/watcher and the hosted database.
///
/// The remote side is a black box: it enforces schema, types, and
/// per-request atomicity; this side only ships batches and reads counts.
pub trait RemoteApi {
    /// Insert a batch of records into `table`. One call per batch.
    fn insert_batch(
        &self,
        table: &str,
        rows: &[Record],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Number of rows currently in `table` (0 when the table is missing).
    fn count_rows(&self, table: &str) -> impl std::future::Future<Output = Result<u64>> + Send;
}

/// HTTP client for a hosted PostgREST endpoint (Supabase-style).
///
/// Credentials are a project URL plus service key, sent as `apikey` and
/// bearer-token headers on every request.
pub struct PostgrestClient {
    client: Client,
    base_url: String,
    key: String,
}

impl PostgrestClient {
    /// Create a new client
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// normal operation)
    pub fn new(base_url: String, key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
        }
    }

    /// Create a client from the env vars named in the loader config.
    pub fn from_env(config: &Config) -> Result<Self> {
        let url = std::env::var(&config.loader.api_url_env).map_err(|_| {
            TabloadError::Config(format!(
                "Environment variable {} not set",
                config.loader.api_url_env
            ))
        })?;
        let key = std::env::var(&config.loader.api_key_env).map_err(|_| {
            TabloadError::Config(format!(
                "Environment variable {} not set",
                config.loader.api_key_env
            ))
        })?;
        Ok(Self::new(url, key))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }
}

impl RemoteApi for PostgrestClient {
    async fn insert_batch(&self, table: &str, rows: &[Record]) -> Result<()> {
        let response = self
            .client
            .post(self.table_url(table))
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(|e| TabloadError::RemoteInsert(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(TabloadError::RemoteInsert(format!(
                "Insert into {} failed with {}: {}",
                table, status, body
            )));
        }

        Ok(())
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let response = self
            .client
            .get(format!("{}?select=*&limit=0", self.table_url(table)))
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|e| TabloadError::RemoteInsert(format!("Network error: {}", e)))?;

        // A missing table is not an error here; the insert will create the
        // failure with a usable message if the table really doesn't exist.
        if !response.status().is_success() {
            return Ok(0);
        }

        // content-range looks like "0-0/123" or "*/123"; the total follows the slash
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        Ok(total)
    }
}
