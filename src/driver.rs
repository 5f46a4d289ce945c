// ABOUTME: The only component allowed to invoke the external capability.
// ABOUTME: Reads run directly; every mutation goes through the action queue.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::{timeout, Duration};

use crate::backend::{RawMessage, UiBackend, WriteOp};
use crate::config::BotConfig;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::queue::ActionQueue;

/// Owns the capability handle and mediates all access to it.
///
/// Read operations do not contend with the mutation-ordering guarantee and
/// run directly. Each mutating method submits an action and returns only
/// after the worker resolves it, giving callers synchronous-looking
/// semantics over the serialized resource.
///
/// `connect()` must succeed before any other method; everything else
/// returns [`Error::NotConnected`] until then.
pub struct Driver {
    backend: Arc<dyn UiBackend>,
    queue: ActionQueue,
    connected: AtomicBool,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Driver {
    pub fn new(backend: Arc<dyn UiBackend>, queue: ActionQueue, config: &BotConfig) -> Self {
        Self {
            backend,
            queue,
            connected: AtomicBool::new(false),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
        }
    }

    /// Attach to the running chat client. Fatal to startup on failure;
    /// never retried automatically.
    pub async fn connect(&self) -> Result<()> {
        tracing::info!("connecting to chat client backend");
        match timeout(self.connect_timeout, self.backend.connect()).await {
            Ok(Ok(())) => {
                self.connected.store(true, Ordering::SeqCst);
                tracing::info!("backend connected");
                Ok(())
            }
            Ok(Err(e)) => Err(Error::Connection(e.to_string())),
            Err(_) => Err(Error::Timeout {
                what: "connect",
                after: self.connect_timeout,
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Fetch new messages from every watched conversation. Runs directly,
    /// concurrently with any queued writes.
    pub async fn read_new(&self) -> Result<Vec<RawMessage>> {
        self.ensure_connected()?;
        match timeout(self.read_timeout, self.backend.read_new()).await {
            Ok(Ok(messages)) => Ok(messages),
            Ok(Err(e)) => Err(Error::Connection(e.to_string())),
            Err(_) => Err(Error::Timeout {
                what: "read_new",
                after: self.read_timeout,
            }),
        }
    }

    /// Send a text message, optionally @-mentioning group members.
    pub async fn send_text(&self, to: &str, text: &str, mentions: &[String]) -> Result<()> {
        if to.is_empty() || text.is_empty() {
            return Err(Error::Invalid(
                "send_text requires a receiver and non-empty text".into(),
            ));
        }
        self.submit_and_wait(WriteOp::SendText {
            to: to.to_string(),
            text: text.to_string(),
            mentions: mentions.to_vec(),
        })
        .await
    }

    /// Reply to an earlier message, quoting it in the conversation.
    pub async fn quote(&self, to: &str, message_id: &str, text: &str) -> Result<()> {
        if to.is_empty() || message_id.is_empty() || text.is_empty() {
            return Err(Error::Invalid(
                "quote requires a receiver, a message id, and non-empty text".into(),
            ));
        }
        self.submit_and_wait(WriteOp::Quote {
            to: to.to_string(),
            message_id: message_id.to_string(),
            text: text.to_string(),
        })
        .await
    }

    /// Send a local file. The path is checked before enqueueing so a typo
    /// fails fast instead of failing inside the worker.
    pub async fn send_file(&self, to: &str, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if to.is_empty() || path.as_os_str().is_empty() {
            return Err(Error::Invalid(
                "send_file requires a receiver and a path".into(),
            ));
        }
        if !path.exists() {
            return Err(Error::Invalid(format!(
                "file not found: {}",
                path.display()
            )));
        }
        self.submit_and_wait(WriteOp::SendFile {
            to: to.to_string(),
            path,
        })
        .await
    }

    /// Register an endpoint in the client's watch list.
    pub async fn sync_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        self.submit_and_wait(WriteOp::WatchEndpoint {
            name: endpoint.name().to_string(),
            media: endpoint.media(),
        })
        .await
    }

    /// Drop an endpoint from the client's watch list.
    pub async fn remove_endpoint(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Invalid("endpoint name cannot be empty".into()));
        }
        self.submit_and_wait(WriteOp::UnwatchEndpoint {
            name: name.to_string(),
        })
        .await
    }

    async fn submit_and_wait(&self, op: WriteOp) -> Result<()> {
        self.ensure_connected()?;
        let kind = op.kind();
        let handle = self.queue.submit(op)?;
        tracing::debug!(seq = handle.seq(), kind, "action submitted");
        handle.wait().await
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Drain the action queue; part of controlled shutdown.
    pub async fn shutdown(&self) {
        self.queue.drain().await;
    }
}
