//! Store and document clients.
//!
//! Handlers talk to the backing store only through the [`KvStore`] and
//! [`DocumentStore`] traits, so the Redis connection and the in-process
//! backend are interchangeable.

pub mod memory;
pub mod path;
pub mod redis;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value as JsonValue;

use crate::config::{Config, StoreBackend};

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors raised by a store call
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),

    /// The store rejected the command
    #[error("{0}")]
    Command(String),

    #[error("store call did not complete within {0:?}")]
    Timeout(Duration),

    #[error("failed to encode JSON value: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn command(message: impl Into<String>) -> Self {
        StoreError::Command(message.into())
    }
}

/// How often the in-memory backend drops keys whose TTL has elapsed
const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Plain key-value operations on raw bytes.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Returns `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Stores `value` under `key`, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()>;

    /// Removes `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Round-trips a PING to verify connectivity
    async fn ping(&self) -> StoreResult<()>;
}

/// JSON document operations addressed by key and path.
///
/// Paths use the store's path syntax (`.` for the root, `.a.b[0]`, `$.a`).
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Returns the serialized JSON at `path`, or `Ok(None)` when the key does not exist.
    async fn json_get(&self, key: &str, path: &str) -> StoreResult<Option<Bytes>>;

    /// Writes `value` at `path`.
    ///
    /// Returns `Ok(false)` when the store accepted the command but did not
    /// write anything, which happens when the target's parent is missing or
    /// is not a container.
    async fn json_set(&self, key: &str, path: &str, value: &JsonValue) -> StoreResult<bool>;

    /// Appends `value` to the array at `path`.
    async fn json_arr_append(&self, key: &str, path: &str, value: &JsonValue) -> StoreResult<()>;

    /// Inserts `value` before the element currently at `index`.
    async fn json_arr_insert(
        &self,
        key: &str,
        path: &str,
        index: i64,
        value: &JsonValue,
    ) -> StoreResult<()>;

    /// Removes and returns the element at `index`, or `Ok(None)` if the array is empty.
    async fn json_arr_pop(&self, key: &str, path: &str, index: i64) -> StoreResult<Option<Bytes>>;
}

/// Runs a store call, failing with [`StoreError::Timeout`] if `deadline` elapses first.
pub async fn with_deadline<T, F>(deadline: Option<Duration>, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StoreError::Timeout(limit))?,
        None => call.await,
    }
}

/// Builds the store and document clients selected by the configuration.
pub async fn connect(config: &Config) -> Result<(Arc<dyn KvStore>, Arc<dyn DocumentStore>)> {
    match config.store_backend {
        StoreBackend::Redis => {
            let store = RedisStore::from_config(config).await?;
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data will not survive a restart");
            let store = MemoryStore::new();
            store.spawn_sweeper(MEMORY_SWEEP_INTERVAL);
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
    }
}
