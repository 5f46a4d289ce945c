// ABOUTME: Monitored conversation endpoints: Admin, Group, and Friend variants.
// ABOUTME: Each owns its bounded history, media policy, and pause flag.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::RawMessage;
use crate::error::{Error, Result};
use crate::history::MessageHistory;

/// Default history capacities per variant.
pub const DEFAULT_ADMIN_HISTORY: usize = 50;
pub const DEFAULT_GROUP_HISTORY: usize = 200;
pub const DEFAULT_FRIEND_HISTORY: usize = 100;

/// Variant tag for a monitored endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Admin,
    Group,
    Friend,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::Admin => write!(f, "admin"),
            EndpointKind::Group => write!(f, "group"),
            EndpointKind::Friend => write!(f, "friend"),
        }
    }
}

/// Which incoming media the client should retain for this conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPolicy {
    pub save_images: bool,
    pub save_voice: bool,
    pub save_files: bool,
}

/// Variant-specific data. A closed set: no open-ended trait objects here.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointDetail {
    /// A bot administrator in a direct chat.
    Admin { level: i32 },
    /// A monitored group chat with named managers and their levels.
    ///
    /// Manager names must be the members' stable remark names, never their
    /// changeable in-group nicknames.
    Group { managers: HashMap<String, i32> },
    /// A regular direct-chat counterpart.
    Friend,
}

/// A monitored conversation participant.
///
/// Names are unique across the [`StateStore`](crate::state::StateStore);
/// the store hands out clones, so mutation of a stored endpoint always goes
/// through store methods.
#[derive(Debug, Clone)]
pub struct Endpoint {
    name: String,
    detail: EndpointDetail,
    media: MediaPolicy,
    history: MessageHistory,
    paused: bool,
}

impl Endpoint {
    fn new(name: &str, detail: EndpointDetail, history_capacity: usize) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Invalid("endpoint name cannot be empty".into()));
        }
        Ok(Self {
            name: name.to_string(),
            detail,
            media: MediaPolicy::default(),
            history: MessageHistory::new(history_capacity)?,
            paused: false,
        })
    }

    /// A bot administrator with the given privilege level.
    pub fn admin(name: &str, level: i32) -> Result<Self> {
        Self::new(name, EndpointDetail::Admin { level }, DEFAULT_ADMIN_HISTORY)
    }

    /// A monitored group with its manager-name-to-level map.
    pub fn group(name: &str, managers: HashMap<String, i32>) -> Result<Self> {
        Self::new(name, EndpointDetail::Group { managers }, DEFAULT_GROUP_HISTORY)
    }

    /// A monitored direct-chat friend.
    pub fn friend(name: &str) -> Result<Self> {
        Self::new(name, EndpointDetail::Friend, DEFAULT_FRIEND_HISTORY)
    }

    pub fn with_media(mut self, media: MediaPolicy) -> Self {
        self.media = media;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Result<Self> {
        self.history = MessageHistory::new(capacity)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EndpointKind {
        match self.detail {
            EndpointDetail::Admin { .. } => EndpointKind::Admin,
            EndpointDetail::Group { .. } => EndpointKind::Group,
            EndpointDetail::Friend => EndpointKind::Friend,
        }
    }

    pub fn detail(&self) -> &EndpointDetail {
        &self.detail
    }

    pub fn media(&self) -> MediaPolicy {
        self.media
    }

    /// Admin privilege level, if this endpoint is an admin.
    pub fn admin_level(&self) -> Option<i32> {
        match &self.detail {
            EndpointDetail::Admin { level } => Some(*level),
            _ => None,
        }
    }

    /// Whether `name` is a registered manager of this group.
    pub fn is_manager(&self, name: &str) -> bool {
        self.manager_level(name).is_some()
    }

    /// The manager level of `name`, if this is a group and `name` manages it.
    pub fn manager_level(&self, name: &str) -> Option<i32> {
        match &self.detail {
            EndpointDetail::Group { managers } => managers.get(name).copied(),
            _ => None,
        }
    }

    /// Add or update a group manager. Returns `true` when the manager is
    /// new, `false` when only the level changed. No-op on non-groups.
    pub fn add_manager(&mut self, name: &str, level: i32) -> bool {
        match &mut self.detail {
            EndpointDetail::Group { managers } => {
                managers.insert(name.to_string(), level).is_none()
            }
            _ => false,
        }
    }

    /// Remove a group manager. Returns whether one was removed.
    pub fn remove_manager(&mut self, name: &str) -> bool {
        match &mut self.detail {
            EndpointDetail::Group { managers } => managers.remove(name).is_some(),
            _ => false,
        }
    }

    /// Stop filter/responder processing for this endpoint. Commands still run.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn record(&mut self, message: RawMessage) {
        self.history.push(message);
    }

    pub fn clear_history(&mut self, count: Option<usize>) -> usize {
        self.history.clear(count)
    }

    pub fn set_history_capacity(&mut self, capacity: usize) -> Result<()> {
        self.history.set_capacity(capacity)
    }
}
