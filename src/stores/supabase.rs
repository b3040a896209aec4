//! Supabase Storage backend
//!
//! Uploads through the storage REST API and returns the bucket's public
//! object URL. Requests are blocking; callers run them off the async runtime.

use crate::store::{content_type_for, BlobStore, StoreError};
use std::time::Duration;
use ureq::Agent;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SupabaseStore {
    agent: Agent,
    url: String,
    key: String,
    bucket: String,
}

impl SupabaseStore {
    pub fn new(url: &str, key: &str, bucket: &str) -> Result<Self, StoreError> {
        let url = url.trim().trim_end_matches('/');
        if url.is_empty() || key.trim().is_empty() {
            return Err(StoreError::Config(
                "Supabase URL and key are required".to_string(),
            ));
        }
        if bucket.trim().is_empty() {
            return Err(StoreError::Config("Supabase bucket is empty".to_string()));
        }

        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(UPLOAD_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();

        tracing::info!("Supabase store using bucket '{}' at {}", bucket, url);

        Ok(Self {
            agent,
            url: url.to_string(),
            key: key.trim().to_string(),
            bucket: bucket.to_string(),
        })
    }

    fn upload_url(&self, destination_path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.url, self.bucket, destination_path
        )
    }

    /// Public URL of an object in the bucket
    pub fn public_url(&self, destination_path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.url, self.bucket, destination_path
        )
    }
}

impl BlobStore for SupabaseStore {
    fn name(&self) -> &'static str {
        "supabase"
    }

    fn store(&self, bytes: &[u8], destination_path: &str) -> Result<String, StoreError> {
        if destination_path.is_empty() || destination_path.starts_with('/') {
            return Err(StoreError::InvalidPath(destination_path.to_string()));
        }

        let response = self
            .agent
            .post(self.upload_url(destination_path))
            .header("Authorization", &format!("Bearer {}", self.key))
            .header("apikey", &self.key)
            .header("Content-Type", content_type_for(destination_path))
            .send(bytes)
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .into_body()
                .read_to_string()
                .unwrap_or_default();
            return Err(StoreError::Rejected(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        Ok(self.public_url(destination_path))
    }
}
