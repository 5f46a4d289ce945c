// ABOUTME: Restricted control surface handed to command plugins and embedders.
// ABOUTME: Wraps loop transitions, endpoint lifecycle, and plugin toggles.

use std::sync::Arc;

use crate::driver::Driver;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::event_loop::{LoopSignal, LoopState};
use crate::registry::PluginRegistry;
use crate::state::StateStore;

/// A deliberately narrow handle over the running system.
///
/// Plugins receive this instead of the [`crate::event_loop::EventLoop`]
/// itself, so they can steer the bot without reaching its internals.
/// Clones share all underlying state.
#[derive(Clone)]
pub struct Controller {
    signal: LoopSignal,
    store: StateStore,
    driver: Arc<Driver>,
    registry: PluginRegistry,
}

impl Controller {
    pub(crate) fn new(
        signal: LoopSignal,
        store: StateStore,
        driver: Arc<Driver>,
        registry: PluginRegistry,
    ) -> Self {
        Self {
            signal,
            store,
            driver,
            registry,
        }
    }

    // --- loop control ---

    pub fn loop_state(&self) -> LoopState {
        self.signal.state()
    }

    /// Suspend polling globally. Messages keep accumulating at the backend
    /// and are processed after [`Controller::resume_loop`].
    pub fn pause_loop(&self) -> Result<()> {
        self.signal.pause()
    }

    pub fn resume_loop(&self) -> Result<()> {
        self.signal.resume()
    }

    /// Begin graceful shutdown. Idempotent; the event loop finishes its
    /// current cycle, runs shutdown hooks, and drains the action queue.
    pub fn stop_loop(&self) {
        self.signal.stop()
    }

    // --- endpoint lifecycle ---

    /// Register an endpoint and sync it into the client's watch list.
    ///
    /// The store is updated first so messages arriving mid-sync already
    /// resolve; if the sync fails the store change is rolled back and the
    /// error propagated. Re-adding an existing name replaces it (history
    /// included), mirroring a deliberate re-watch.
    pub async fn add_endpoint(&self, endpoint: Endpoint) -> Result<()> {
        let name = endpoint.name().to_string();
        let previous = self.store.add(endpoint.clone()).await;
        if let Err(e) = self.driver.sync_endpoint(&endpoint).await {
            match previous {
                Some(prev) => {
                    self.store.add(prev).await;
                }
                None => {
                    self.store.remove(&name).await;
                }
            }
            tracing::warn!(endpoint = %name, error = %e, "endpoint sync failed, rolled back");
            return Err(e);
        }
        tracing::info!(endpoint = %name, "endpoint added");
        Ok(())
    }

    /// Unregister an endpoint and remove it from the watch list.
    ///
    /// The store entry goes first, so no further messages dispatch to it
    /// even while the unwatch action is still queued. Unknown names error.
    pub async fn remove_endpoint(&self, name: &str) -> Result<Endpoint> {
        let removed = self
            .store
            .remove(name)
            .await
            .ok_or_else(|| Error::UnknownEndpoint(name.to_string()))?;
        if let Err(e) = self.driver.remove_endpoint(name).await {
            // Already gone from dispatch; the stale watch entry is harmless.
            tracing::warn!(endpoint = %name, error = %e, "unwatch failed after removal");
        }
        tracing::info!(endpoint = %name, "endpoint removed");
        Ok(removed)
    }

    pub async fn get_endpoint(&self, name: &str) -> Option<Endpoint> {
        self.store.get(name).await
    }

    /// Snapshot of all registered endpoints, sorted by name.
    pub async fn endpoints(&self) -> Vec<Endpoint> {
        self.store.snapshot().await
    }

    /// Mute one endpoint: its messages still feed commands but skip the
    /// filter/responder pipeline until resumed.
    pub async fn pause_endpoint(&self, name: &str) -> Result<()> {
        self.store.pause(name).await
    }

    pub async fn resume_endpoint(&self, name: &str) -> Result<()> {
        self.store.resume(name).await
    }

    /// Drop up to `count` oldest history entries (all of them when `None`).
    /// Returns how many were removed.
    pub async fn clear_history(&self, name: &str, count: Option<usize>) -> Result<usize> {
        self.store.clear_history(name, count).await
    }

    // --- plugin control ---

    pub fn enable_plugin(&self, name: &str) -> Result<()> {
        self.registry.enable(name)
    }

    pub fn disable_plugin(&self, name: &str) -> Result<()> {
        self.registry.disable(name)
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Shared driver handle, for control paths that need to send directly.
    pub fn driver(&self) -> &Driver {
        &self.driver
    }
}
