// ABOUTME: Concurrency core for a desktop chat-client bot framework.
// ABOUTME: Serializes UI mutations and dispatches messages to plugins.

pub mod backend;
pub mod config;
pub mod controller;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod event_loop;
pub mod history;
pub mod metrics;
pub mod plugin;
pub mod queue;
pub mod registry;
pub mod state;

pub use backend::{MessageKind, RawMessage, UiBackend, WriteOp};
pub use config::{BotConfig, DispatchMode};
pub use controller::Controller;
pub use driver::Driver;
pub use endpoint::{Endpoint, EndpointDetail, EndpointKind, MediaPolicy};
pub use error::{Error, Result};
pub use event_loop::{EventLoop, LoopState};
pub use history::MessageHistory;
pub use plugin::{
    Command, CommandContext, CommandScope, MsgFilter, Responder, ShutdownHook, StartupHook,
};
pub use queue::{ActionHandle, ActionQueue};
pub use registry::{PluginKind, PluginRegistry};
pub use state::StateStore;
