// ABOUTME: The polling event loop: run/pause/stop state machine and dispatch.
// ABOUTME: Routes messages through commands, filters, and responders per mode.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::backend::RawMessage;
use crate::config::{BotConfig, DispatchMode};
use crate::controller::Controller;
use crate::driver::Driver;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::metrics;
use crate::plugin::{CommandContext, ShutdownHook, StartupHook};
use crate::registry::PluginRegistry;
use crate::state::StateStore;

/// Lifecycle of the event loop. `Stopped` is terminal and reachable from
/// every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Created,
    Running,
    Paused,
    Stopped,
}

/// Shared state-machine handle for the loop.
///
/// All transitions go through here; the loop itself and the
/// [`Controller`] hold clones. Pausing and resuming are idempotent, and
/// any transition attempted after `Stopped` fails with [`Error::Stopped`].
#[derive(Clone)]
pub struct LoopSignal {
    state: Arc<watch::Sender<LoopState>>,
    cancel: CancellationToken,
}

impl LoopSignal {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(LoopState::Created);
        Self {
            state: Arc::new(tx),
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    pub(crate) fn mark_running(&self) -> Result<()> {
        let mut result = Ok(());
        self.state.send_modify(|state| match *state {
            LoopState::Created => *state = LoopState::Running,
            other => result = Err(Error::AlreadyStarted(other)),
        });
        result
    }

    /// Suspend polling and dispatch. In-flight dispatches finish on their own.
    pub fn pause(&self) -> Result<()> {
        let mut result = Ok(());
        self.state.send_modify(|state| match *state {
            LoopState::Running => {
                *state = LoopState::Paused;
                tracing::info!("event loop paused");
            }
            LoopState::Paused => {}
            LoopState::Stopped => result = Err(Error::Stopped),
            LoopState::Created => {
                result = Err(Error::Invalid("event loop has not started".into()))
            }
        });
        result
    }

    pub fn resume(&self) -> Result<()> {
        let mut result = Ok(());
        self.state.send_modify(|state| match *state {
            LoopState::Paused => {
                *state = LoopState::Running;
                tracing::info!("event loop resumed");
            }
            LoopState::Running => {}
            LoopState::Stopped => result = Err(Error::Stopped),
            LoopState::Created => {
                result = Err(Error::Invalid("event loop has not started".into()))
            }
        });
        result
    }

    /// Request a graceful stop. Irreversible; safe to call repeatedly and
    /// from any state. The loop stops starting new dispatch cycles, but the
    /// plugin currently executing is never forcibly cancelled.
    pub fn stop(&self) {
        self.state.send_modify(|state| {
            if *state != LoopState::Stopped {
                tracing::info!(from = ?*state, "event loop stop requested");
                *state = LoopState::Stopped;
            }
        });
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == LoopState::Stopped
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Polls the driver for new messages and runs the plugin pipeline.
///
/// Cheap to clone; all fields are shared handles. Construct one, hand its
/// [`Controller`] to whoever needs control, and await [`EventLoop::run`].
#[derive(Clone)]
pub struct EventLoop {
    driver: Arc<Driver>,
    store: StateStore,
    registry: PluginRegistry,
    signal: LoopSignal,
    controller: Controller,
    mode: DispatchMode,
    poll_interval: Duration,
}

impl EventLoop {
    /// Assemble the loop from explicitly constructed parts.
    pub fn new(
        driver: Arc<Driver>,
        store: StateStore,
        registry: PluginRegistry,
        config: &BotConfig,
    ) -> Self {
        let signal = LoopSignal::new();
        let controller = Controller::new(
            signal.clone(),
            store.clone(),
            Arc::clone(&driver),
            registry.clone(),
        );
        Self {
            driver,
            store,
            registry,
            signal,
            controller,
            mode: config.dispatch_mode,
            poll_interval: config.poll_interval(),
        }
    }

    /// The restricted control surface for plugins and the embedding app.
    pub fn controller(&self) -> Controller {
        self.controller.clone()
    }

    pub fn state(&self) -> LoopState {
        self.signal.state()
    }

    /// Run until stopped. Only valid once, from the `Created` state.
    ///
    /// Endpoints registered at startup are synced into the client's watch
    /// list first, then startup hooks run; then the poll cycle repeats
    /// until a stop request arrives, at which point in-flight dispatches
    /// finish, shutdown hooks run, and the action queue drains.
    pub async fn run(&self) -> Result<()> {
        self.signal.mark_running()?;
        if let Err(e) = self.sync_initial_endpoints().await {
            self.signal.stop();
            return Err(e);
        }
        self.run_hooks(HookPhase::Startup).await;
        tracing::info!(mode = ?self.mode, "event loop running");

        let mut state_rx = self.signal.subscribe();
        loop {
            match self.signal.state() {
                LoopState::Stopped => break,
                LoopState::Paused => {
                    // No polling while paused: unread messages stay buffered
                    // at the backend and are picked up after resume.
                    if state_rx.changed().await.is_err() {
                        break;
                    }
                    continue;
                }
                _ => {}
            }

            match self.driver.read_new().await {
                Ok(messages) if !messages.is_empty() => {
                    self.dispatch(messages).await;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read new messages");
                }
            }

            self.idle().await;
        }

        self.finish().await;
        Ok(())
    }

    /// Register every endpoint from the initial store contents in the
    /// client's watch list. Each sync is awaited through the queue, so the
    /// loop only starts polling once the watch list is complete. Failure
    /// here is fatal to startup, like a failed connect.
    async fn sync_initial_endpoints(&self) -> Result<()> {
        for endpoint in self.store.snapshot().await {
            self.driver.sync_endpoint(&endpoint).await?;
        }
        Ok(())
    }

    /// Sleep one poll interval, waking early on a stop request.
    async fn idle(&self) {
        tokio::select! {
            _ = self.signal.cancelled() => {}
            _ = tokio::time::sleep(self.poll_interval) => {}
        }
    }

    /// Whether this message's source is a registered endpoint. Unregistered
    /// sources are discarded with a warning.
    async fn check_source(&self, message: &RawMessage) -> bool {
        if self.store.contains(&message.source).await {
            return true;
        }
        tracing::warn!(source = %message.source, "message from unregistered source, discarding");
        metrics::record_unknown_endpoint();
        false
    }

    /// Group messages by source endpoint, preserving first-seen endpoint
    /// order and arrival order within each batch.
    async fn resolve_batches(&self, messages: Vec<RawMessage>) -> Vec<(String, Vec<RawMessage>)> {
        let mut order: Vec<String> = Vec::new();
        let mut batches: HashMap<String, Vec<RawMessage>> = HashMap::new();
        for message in messages {
            if !self.check_source(&message).await {
                continue;
            }
            if !batches.contains_key(&message.source) {
                order.push(message.source.clone());
            }
            batches.entry(message.source.clone()).or_default().push(message);
        }
        order
            .into_iter()
            .map(|name| {
                let batch = batches.remove(&name).unwrap_or_default();
                (name, batch)
            })
            .collect()
    }

    async fn dispatch(&self, messages: Vec<RawMessage>) {
        match self.mode {
            // Strict arrival order across all endpoints; no two plugin
            // invocations ever overlap.
            DispatchMode::Sequential => {
                for message in messages {
                    if !self.check_source(&message).await {
                        continue;
                    }
                    let name = message.source.clone();
                    self.process_message(&name, message).await;
                }
            }
            // One task per endpoint batch; arrival order holds within an
            // endpoint, distinct endpoints overlap freely.
            DispatchMode::Concurrent => {
                let batches = self.resolve_batches(messages).await;
                let mut tasks = JoinSet::new();
                for (name, batch) in batches {
                    let this = self.clone();
                    tasks.spawn(async move { this.process_batch(name, batch).await });
                }
                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "endpoint dispatch task panicked");
                    }
                }
            }
        }
    }

    /// Process one endpoint's messages in arrival order.
    async fn process_batch(&self, name: String, batch: Vec<RawMessage>) {
        for message in batch {
            self.process_message(&name, message).await;
        }
    }

    async fn process_message(&self, name: &str, message: RawMessage) {
        // Fresh snapshot per message so pause flags and manager edits made
        // by an earlier command in the same batch are visible.
        let Some(endpoint) = self.store.get(name).await else {
            tracing::warn!(endpoint = %name, "endpoint removed mid-dispatch, dropping message");
            return;
        };
        metrics::record_message(endpoint.kind());

        let context = CommandContext::for_message(endpoint.clone(), message.clone());
        for (plugin_name, command) in self.registry.commands() {
            if !command.scope().permits(&context) {
                continue;
            }
            if let Err(e) = command
                .execute(&self.controller, &self.driver, &context)
                .await
            {
                tracing::warn!(plugin = %plugin_name, error = %e, "command plugin failed");
                metrics::record_plugin_error("command");
            }
        }

        if endpoint.is_paused() {
            tracing::debug!(endpoint = %name, "endpoint paused, skipping pipeline");
            return;
        }

        for (plugin_name, filter) in self.registry.filters() {
            if !filter.execute(&endpoint, &message) {
                tracing::debug!(
                    endpoint = %name,
                    plugin = %plugin_name,
                    "message vetoed by filter"
                );
                metrics::record_filtered();
                return;
            }
        }

        // Only messages that survived every filter enter the history.
        if let Err(e) = self.store.record_message(name, message.clone()).await {
            tracing::debug!(endpoint = %name, error = %e, "could not record message");
        }

        for (plugin_name, responder) in self.registry.responders() {
            if let Err(e) = responder.execute(&self.driver, &endpoint, &message).await {
                tracing::warn!(
                    plugin = %plugin_name,
                    endpoint = %name,
                    error = %e,
                    "responder plugin failed"
                );
                metrics::record_plugin_error("responder");
            }
        }
    }

    async fn run_hooks(&self, phase: HookPhase) {
        let hooks: Vec<(String, HookPlugin)> = match phase {
            HookPhase::Startup => self
                .registry
                .startup_hooks()
                .into_iter()
                .map(|(name, hook)| (name, HookPlugin::Startup(hook)))
                .collect(),
            HookPhase::Shutdown => self
                .registry
                .shutdown_hooks()
                .into_iter()
                .map(|(name, hook)| (name, HookPlugin::Shutdown(hook)))
                .collect(),
        };
        if hooks.is_empty() {
            return;
        }
        for endpoint in self.store.snapshot().await {
            if endpoint.is_paused() {
                continue;
            }
            for (plugin_name, hook) in &hooks {
                match hook.execute(&endpoint).await {
                    Ok(Some(text)) if !text.is_empty() => {
                        if let Err(e) = self.driver.send_text(endpoint.name(), &text, &[]).await {
                            tracing::warn!(
                                plugin = %plugin_name,
                                endpoint = %endpoint.name(),
                                error = %e,
                                "failed to deliver hook message"
                            );
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(
                            plugin = %plugin_name,
                            endpoint = %endpoint.name(),
                            error = %e,
                            "lifecycle hook failed"
                        );
                        metrics::record_plugin_error("hook");
                    }
                }
            }
        }
    }

    /// Graceful teardown: farewell hooks, then drain every queued action.
    async fn finish(&self) {
        self.signal.stop();
        self.run_hooks(HookPhase::Shutdown).await;
        self.driver.shutdown().await;
        tracing::info!("event loop stopped");
    }
}

enum HookPhase {
    Startup,
    Shutdown,
}

/// Startup and shutdown hooks share one delivery path; this erases the
/// trait difference so `run_hooks` can treat them uniformly.
enum HookPlugin {
    Startup(Arc<dyn StartupHook>),
    Shutdown(Arc<dyn ShutdownHook>),
}

impl HookPlugin {
    async fn execute(&self, endpoint: &Endpoint) -> anyhow::Result<Option<String>> {
        match self {
            HookPlugin::Startup(hook) => hook.execute(endpoint).await,
            HookPlugin::Shutdown(hook) => hook.execute(endpoint).await,
        }
    }
}
