//! Blob store implementations
//!
//! The local store is always available. Remote backends are conditionally
//! compiled based on feature flags.

pub mod local;

#[cfg(feature = "store-supabase")]
pub mod supabase;

use crate::config::{Config, StoreBackend};
use crate::store::{BlobStore, StoreError};
use std::sync::Arc;

/// Build the store selected by the configuration
pub fn build(config: &Config) -> Result<Arc<dyn BlobStore>, StoreError> {
    match config.store {
        StoreBackend::Local => {
            tracing::info!("Initializing local store...");
            let store =
                local::LocalStore::new(&config.store_dir, config.public_base_url.as_deref())?;
            Ok(Arc::new(store))
        }
        StoreBackend::Supabase => build_supabase(config),
    }
}

#[cfg(feature = "store-supabase")]
fn build_supabase(config: &Config) -> Result<Arc<dyn BlobStore>, StoreError> {
    tracing::info!("Initializing supabase store...");
    let store = supabase::SupabaseStore::new(
        config.supabase_url.as_deref().unwrap_or_default(),
        config.supabase_key.as_deref().unwrap_or_default(),
        &config.supabase_bucket,
    )?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "store-supabase"))]
fn build_supabase(_config: &Config) -> Result<Arc<dyn BlobStore>, StoreError> {
    Err(StoreError::Config(
        "Supabase store not compiled in. Build with --features store-supabase".to_string(),
    ))
}
