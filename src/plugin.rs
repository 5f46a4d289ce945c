// ABOUTME: Plugin contract surface: filters, responders, commands, hooks.
// ABOUTME: CommandScope pre-filters who may trigger a command, and where.

use async_trait::async_trait;

use crate::backend::RawMessage;
use crate::controller::Controller;
use crate::driver::Driver;
use crate::endpoint::{Endpoint, EndpointKind};

/// Where a command may be triggered, and by whom.
///
/// The event loop evaluates the scope against the [`CommandContext`] before
/// calling `execute`, so command implementations only see invocations they
/// are allowed to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandScope {
    /// Only an admin, in the admin's direct chat.
    AdminDirect,
    /// Only a registered group manager, inside the group they manage.
    GroupManager,
    /// Union of the two above. Suits generic management commands.
    AdminOrManager,
    /// Any member of a monitored group.
    AnyoneInGroup,
    /// Any direct chat (a friend, or the admin acting as one).
    AnyFriendDirect,
    /// No pre-filtering at all; the command sees every message.
    Anyone,
}

impl CommandScope {
    /// Whether this scope admits the given invocation.
    pub fn permits(&self, context: &CommandContext) -> bool {
        match self {
            CommandScope::AdminDirect => context.is_admin,
            CommandScope::GroupManager => context.is_group_manager,
            CommandScope::AdminOrManager => context.is_admin || context.is_group_manager,
            CommandScope::AnyoneInGroup => context.endpoint.kind() == EndpointKind::Group,
            CommandScope::AnyFriendDirect => matches!(
                context.endpoint.kind(),
                EndpointKind::Friend | EndpointKind::Admin
            ),
            CommandScope::Anyone => true,
        }
    }
}

/// Immutable snapshot handed to command plugins.
///
/// Constructed fresh per dispatch; the endpoint is a clone taken at
/// dispatch time, not a live reference into the store.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Whether the source conversation is an admin's direct chat.
    pub is_admin: bool,
    /// The admin's privilege level, when `is_admin`.
    pub admin_level: Option<i32>,
    /// Whether the sender manages the source group.
    pub is_group_manager: bool,
    /// The sender's manager level, when `is_group_manager`.
    pub group_manager_level: Option<i32>,
    /// The resolved source endpoint.
    pub endpoint: Endpoint,
    /// The triggering message.
    pub message: RawMessage,
}

impl CommandContext {
    /// Resolve admin/manager standing for one message.
    pub fn for_message(endpoint: Endpoint, message: RawMessage) -> Self {
        let admin_level = endpoint.admin_level();
        let group_manager_level = endpoint.manager_level(&message.sender);
        Self {
            is_admin: admin_level.is_some(),
            admin_level,
            is_group_manager: group_manager_level.is_some(),
            group_manager_level,
            endpoint,
            message,
        }
    }
}

/// Vets messages before any responder runs.
///
/// Filters run in registration order; the first one returning `false`
/// drops the message. Vetoed messages never reach the endpoint's history
/// or any responder, but command plugins have already seen them.
pub trait MsgFilter: Send + Sync {
    fn execute(&self, endpoint: &Endpoint, message: &RawMessage) -> bool;
}

/// Reacts to messages that survived every filter.
///
/// All side effects go through the supplied driver so they inherit the
/// queue's ordering and pacing guarantees. Errors are contained per
/// invocation and logged; siblings still run.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn execute(
        &self,
        driver: &Driver,
        endpoint: &Endpoint,
        message: &RawMessage,
    ) -> anyhow::Result<()>;
}

/// Handles control commands. Runs before the filter pipeline and even for
/// paused endpoints, so administrators can always reach the bot.
#[async_trait]
pub trait Command: Send + Sync {
    fn scope(&self) -> CommandScope {
        CommandScope::AdminDirect
    }

    async fn execute(
        &self,
        controller: &Controller,
        driver: &Driver,
        context: &CommandContext,
    ) -> anyhow::Result<()>;
}

/// Produces an opening line per endpoint when the loop starts.
/// Returning `Ok(None)` or an empty string sends nothing.
#[async_trait]
pub trait StartupHook: Send + Sync {
    async fn execute(&self, endpoint: &Endpoint) -> anyhow::Result<Option<String>>;
}

/// Produces a closing line per endpoint during graceful shutdown.
#[async_trait]
pub trait ShutdownHook: Send + Sync {
    async fn execute(&self, endpoint: &Endpoint) -> anyhow::Result<Option<String>>;
}
