use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::store::{self, DocumentStore, KvStore, StoreResult};

/// Shared application state
///
/// The store and document clients are created once at startup and injected
/// here; handlers never reach for process-wide globals.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(kv: Arc<dyn KvStore>, documents: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self {
            kv,
            documents,
            config: Arc::new(config),
        }
    }

    /// Runs a store call under the configured per-request deadline
    pub async fn call<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        store::with_deadline(self.config.request_timeout, call).await
    }
}
