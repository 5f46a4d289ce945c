// ABOUTME: External UI-automation capability surface the core depends on.
// ABOUTME: Defines RawMessage, WriteOp, and the three-method UiBackend trait.

pub mod mock;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::endpoint::MediaPolicy;

/// Message kinds surfaced by the chat client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// System notice in the conversation (joins, recalls banner, etc.)
    System,
    /// Timestamp divider row.
    Time,
    /// A message the counterpart recalled.
    Recall,
    /// A message the bot account itself sent.
    SelfSent,
    /// A regular message from the counterpart.
    Friend,
}

/// One message read from a monitored conversation.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Backend-assigned event id, unique per message.
    pub id: String,
    /// Name of the conversation (endpoint) the message arrived in.
    pub source: String,
    /// Display name of the sender inside that conversation.
    pub sender: String,
    pub kind: MessageKind,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl RawMessage {
    /// Build a regular counterpart message with a fresh id.
    pub fn friend(source: impl Into<String>, sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(source, sender, MessageKind::Friend, body)
    }

    pub fn new(
        source: impl Into<String>,
        sender: impl Into<String>,
        kind: MessageKind,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            sender: sender.into(),
            kind,
            body: body.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One UI-mutating operation, executed exactly once by the queue worker.
///
/// These are the only calls that touch shared automation state (simulated
/// focus, clipboard), so they must never run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Send a text message, optionally @-mentioning group members.
    SendText {
        to: String,
        text: String,
        mentions: Vec<String>,
    },
    /// Send a file from the local filesystem.
    SendFile { to: String, path: PathBuf },
    /// Reply to an earlier message, quoting it in the conversation.
    Quote {
        to: String,
        message_id: String,
        text: String,
    },
    /// Register a conversation in the client's watch list.
    WatchEndpoint { name: String, media: MediaPolicy },
    /// Drop a conversation from the client's watch list.
    UnwatchEndpoint { name: String },
}

impl WriteOp {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::SendText { .. } => "send_text",
            WriteOp::SendFile { .. } => "send_file",
            WriteOp::Quote { .. } => "quote",
            WriteOp::WatchEndpoint { .. } => "watch_endpoint",
            WriteOp::UnwatchEndpoint { .. } => "unwatch_endpoint",
        }
    }
}

/// The capability this core drives but does not implement.
///
/// `connect` must succeed before anything else is called. `read_new` is
/// safe to run concurrently with writes; `perform` is not reentrant and is
/// only ever invoked by the single queue worker.
#[async_trait]
pub trait UiBackend: Send + Sync {
    /// Attach to the running chat client.
    async fn connect(&self) -> anyhow::Result<()>;

    /// Drain new messages from every watched conversation.
    async fn read_new(&self) -> anyhow::Result<Vec<RawMessage>>;

    /// Execute one mutating operation against the client UI.
    async fn perform(&self, op: &WriteOp) -> anyhow::Result<()>;
}
