// ABOUTME: Mock UI backend for deterministic tests without a real chat client.
// ABOUTME: Scripts incoming messages, records performed writes, injects failures.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::{Duration, Instant};

use super::{RawMessage, UiBackend, WriteOp};

/// One recorded `perform` call with the tokio-clock instant it started.
///
/// The instant uses the tokio clock so tests running under a paused clock
/// (`#[tokio::test(start_paused = true)]`) can assert exact gaps.
#[derive(Debug, Clone)]
pub struct PerformedOp {
    pub op: WriteOp,
    pub started: Instant,
    pub ok: bool,
}

#[derive(Default)]
struct State {
    incoming: VecDeque<RawMessage>,
    performed: Vec<PerformedOp>,
    fail_substrings: Vec<String>,
    connect_error: Option<String>,
    perform_latency: Option<Duration>,
}

/// In-memory [`UiBackend`] test double.
///
/// Clones share state, so a test can hold one copy for assertions while the
/// driver owns another.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<State>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script one incoming message for the next `read_new`.
    pub fn queue_incoming(&self, message: RawMessage) {
        self.state.lock().unwrap().incoming.push_back(message);
    }

    /// Script several incoming messages, preserving order.
    pub fn queue_many(&self, messages: impl IntoIterator<Item = RawMessage>) {
        let mut state = self.state.lock().unwrap();
        state.incoming.extend(messages);
    }

    /// Every recorded `perform` call, in execution order.
    pub fn performed(&self) -> Vec<PerformedOp> {
        self.state.lock().unwrap().performed.clone()
    }

    /// Just the operations, in execution order.
    pub fn performed_ops(&self) -> Vec<WriteOp> {
        self.performed().into_iter().map(|p| p.op).collect()
    }

    /// Make `SendText` operations whose text contains `pattern` fail.
    pub fn fail_sends_containing(&self, pattern: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_substrings
            .push(pattern.to_string());
    }

    /// Make the next `connect` fail with this message (until cleared).
    pub fn set_connect_error(&self, message: Option<&str>) {
        self.state.lock().unwrap().connect_error = message.map(str::to_string);
    }

    /// Simulate slow UI automation: every `perform` takes this long.
    pub fn set_perform_latency(&self, latency: Option<Duration>) {
        self.state.lock().unwrap().perform_latency = latency;
    }

    fn should_fail(&self, op: &WriteOp) -> bool {
        let state = self.state.lock().unwrap();
        match op {
            WriteOp::SendText { text, .. } | WriteOp::Quote { text, .. } => state
                .fail_substrings
                .iter()
                .any(|pattern| text.contains(pattern)),
            _ => false,
        }
    }
}

#[async_trait]
impl UiBackend for MockBackend {
    async fn connect(&self) -> anyhow::Result<()> {
        let error = self.state.lock().unwrap().connect_error.clone();
        match error {
            Some(message) => anyhow::bail!(message),
            None => Ok(()),
        }
    }

    async fn read_new(&self) -> anyhow::Result<Vec<RawMessage>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.incoming.drain(..).collect())
    }

    async fn perform(&self, op: &WriteOp) -> anyhow::Result<()> {
        let started = Instant::now();
        let latency = self.state.lock().unwrap().perform_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let fail = self.should_fail(op);
        self.state.lock().unwrap().performed.push(PerformedOp {
            op: op.clone(),
            started,
            ok: !fail,
        });
        if fail {
            anyhow::bail!("scripted failure for {:?}", op.kind());
        }
        Ok(())
    }
}
