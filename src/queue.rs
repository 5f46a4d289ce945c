// ABOUTME: FIFO action queue with a single worker serializing all UI writes.
// ABOUTME: Submission returns an awaitable handle; the worker paces executions.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{sleep_until, timeout, Duration, Instant};

use crate::backend::{UiBackend, WriteOp};
use crate::config::BotConfig;
use crate::error::{Error, Result};
use crate::metrics;

enum WorkerMsg {
    Run(Action),
    Drain(oneshot::Sender<()>),
}

struct Action {
    seq: u64,
    op: WriteOp,
    reply: oneshot::Sender<Result<()>>,
}

/// Awaitable handle for one submitted action.
///
/// `seq` is the monotonically increasing submission sequence number; the
/// worker completes actions in exactly this order.
pub struct ActionHandle {
    seq: u64,
    rx: oneshot::Receiver<Result<()>>,
}

impl ActionHandle {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Suspend until the worker resolves this action.
    pub async fn wait(self) -> Result<()> {
        self.rx.await.unwrap_or(Err(Error::QueueClosed))
    }
}

struct QueueInner {
    tx: mpsc::UnboundedSender<WorkerMsg>,
    // guards seq allocation together with the channel send, so seq labels
    // always agree with queue order
    next_seq: std::sync::Mutex<u64>,
    depth: Arc<AtomicUsize>,
    capacity: Option<usize>,
    closed: AtomicBool,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Global FIFO queue of pending UI-mutating actions.
///
/// Exactly one worker drains it, so no two writes ever touch the client UI
/// concurrently. Construct one instance per backend and pass it around;
/// clones share the queue.
#[derive(Clone)]
pub struct ActionQueue {
    inner: Arc<QueueInner>,
}

impl ActionQueue {
    /// Start the worker task and return the queue handle.
    pub fn spawn(backend: Arc<dyn UiBackend>, config: &BotConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let worker = Worker {
            rx,
            backend,
            delay: config.sending_delay(),
            action_timeout: config.action_timeout(),
            depth: Arc::clone(&depth),
        };
        let handle = tokio::spawn(worker.run());
        Self {
            inner: Arc::new(QueueInner {
                tx,
                next_seq: std::sync::Mutex::new(0),
                depth,
                capacity: config.queue_capacity,
                closed: AtomicBool::new(false),
                worker: Mutex::new(Some(handle)),
            }),
        }
    }

    /// Enqueue one action at the tail. O(1); never waits for execution.
    pub fn submit(&self, op: WriteOp) -> Result<ActionHandle> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::QueueClosed);
        }
        if let Some(capacity) = self.inner.capacity {
            if self.inner.depth.load(Ordering::SeqCst) >= capacity {
                return Err(Error::QueueFull(capacity));
            }
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        let seq = {
            let mut next = self.inner.next_seq.lock().unwrap();
            let seq = *next;
            let action = Action {
                seq,
                op,
                reply: reply_tx,
            };
            self.inner.depth.fetch_add(1, Ordering::SeqCst);
            if self.inner.tx.send(WorkerMsg::Run(action)).is_err() {
                self.inner.depth.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::QueueClosed);
            }
            *next += 1;
            seq
        };
        tracing::debug!(seq, "action queued");
        Ok(ActionHandle { seq, rx: reply_rx })
    }

    /// Number of submitted actions not yet executed.
    pub fn depth(&self) -> usize {
        self.inner.depth.load(Ordering::SeqCst)
    }

    /// Stop accepting submissions, finish everything already queued, then
    /// return once the worker has exited. Safe to call more than once.
    pub async fn drain(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            let (ack_tx, ack_rx) = oneshot::channel();
            if self.inner.tx.send(WorkerMsg::Drain(ack_tx)).is_ok() {
                let _ = ack_rx.await;
            }
        }
        if let Some(handle) = self.inner.worker.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "action worker task failed");
            }
        }
        tracing::info!("action queue drained");
    }
}

/// The single consumer. Executes actions in strict submission order and
/// enforces the start-to-start minimum gap between consecutive actions.
struct Worker {
    rx: mpsc::UnboundedReceiver<WorkerMsg>,
    backend: Arc<dyn UiBackend>,
    delay: Duration,
    action_timeout: Option<Duration>,
    depth: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(mut self) {
        tracing::info!("action worker started");
        while let Some(msg) = self.rx.recv().await {
            match msg {
                WorkerMsg::Run(action) => self.execute(action).await,
                WorkerMsg::Drain(ack) => {
                    // FIFO channel: everything submitted before the drain
                    // request has already been executed at this point.
                    let _ = ack.send(());
                    break;
                }
            }
        }
        tracing::info!("action worker stopped");
    }

    async fn execute(&mut self, action: Action) {
        let started = Instant::now();
        let result = match self.action_timeout {
            Some(limit) => match timeout(limit, self.backend.perform(&action.op)).await {
                Ok(outcome) => outcome.map_err(|e| Error::ActionFailed(e.to_string())),
                Err(_) => Err(Error::Timeout {
                    what: "action execution",
                    after: limit,
                }),
            },
            None => self
                .backend
                .perform(&action.op)
                .await
                .map_err(|e| Error::ActionFailed(e.to_string())),
        };
        self.depth.fetch_sub(1, Ordering::SeqCst);

        match &result {
            Ok(()) => {
                tracing::debug!(seq = action.seq, kind = action.op.kind(), "action completed");
                metrics::record_action(action.op.kind());
            }
            Err(e) => {
                // Failure stays with this action's submitter; the queue moves on.
                tracing::warn!(
                    seq = action.seq,
                    kind = action.op.kind(),
                    error = %e,
                    "action failed"
                );
                metrics::record_action_error();
            }
        }
        let _ = action.reply.send(result);

        // Pace the next action relative to this one's start, not its end.
        sleep_until(started + self.delay).await;
    }
}
