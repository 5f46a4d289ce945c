// ABOUTME: Concurrency-safe store of monitored endpoints, keyed by name.
// ABOUTME: One lock guards every operation; reads hand out independent clones.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::RawMessage;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// The single source of truth for the set of monitored endpoints.
///
/// Clones share the underlying map. All five base operations plus the
/// in-place updates run under one mutex, so no caller ever observes a
/// partially applied `setup` or a torn entry. `get` and `snapshot` return
/// clones; mutating a clone never affects stored state.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<HashMap<String, Endpoint>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire set. Used once at startup; duplicate names are a
    /// fatal setup error. Returns the accepted endpoints for the initial
    /// backend sync.
    pub async fn setup(&self, initial: Vec<Endpoint>) -> Result<Vec<Endpoint>> {
        let mut fresh = HashMap::with_capacity(initial.len());
        for endpoint in &initial {
            if fresh.contains_key(endpoint.name()) {
                return Err(Error::DuplicateEndpoint(endpoint.name().to_string()));
            }
            fresh.insert(endpoint.name().to_string(), endpoint.clone());
        }
        *self.inner.lock().await = fresh;
        tracing::info!(count = initial.len(), "state store initialized");
        Ok(initial)
    }

    /// Insert or overwrite by name. Returns the previous entry, if any.
    pub async fn add(&self, endpoint: Endpoint) -> Option<Endpoint> {
        self.inner
            .lock()
            .await
            .insert(endpoint.name().to_string(), endpoint)
    }

    /// Delete by name. Returns the removed entry; `None` if absent.
    pub async fn remove(&self, name: &str) -> Option<Endpoint> {
        self.inner.lock().await.remove(name)
    }

    /// Independent clone of one endpoint.
    pub async fn get(&self, name: &str) -> Option<Endpoint> {
        self.inner.lock().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.inner.lock().await.contains_key(name)
    }

    /// Independent copy of the full set, sorted by name for determinism.
    pub async fn snapshot(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = self.inner.lock().await.values().cloned().collect();
        endpoints.sort_by(|a, b| a.name().cmp(b.name()));
        endpoints
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Mutate one stored endpoint in place, under the store lock.
    pub async fn update<T>(&self, name: &str, f: impl FnOnce(&mut Endpoint) -> T) -> Result<T> {
        let mut map = self.inner.lock().await;
        match map.get_mut(name) {
            Some(endpoint) => Ok(f(endpoint)),
            None => Err(Error::UnknownEndpoint(name.to_string())),
        }
    }

    /// Pause filter/responder processing for one endpoint.
    pub async fn pause(&self, name: &str) -> Result<()> {
        self.update(name, |endpoint| endpoint.pause()).await
    }

    pub async fn resume(&self, name: &str) -> Result<()> {
        self.update(name, |endpoint| endpoint.resume()).await
    }

    /// Append a message to one endpoint's history.
    pub async fn record_message(&self, name: &str, message: RawMessage) -> Result<()> {
        self.update(name, |endpoint| endpoint.record(message)).await
    }

    /// Drop up to `count` oldest messages from one endpoint's history.
    pub async fn clear_history(&self, name: &str, count: Option<usize>) -> Result<usize> {
        self.update(name, |endpoint| endpoint.clear_history(count))
            .await
    }
}
