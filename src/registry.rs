// ABOUTME: Name-keyed plugin registry with enable flags and stable ordering.
// ABOUTME: The event loop consults enabled, ordered accessors per dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::plugin::{Command, MsgFilter, Responder, ShutdownHook, StartupHook};

/// The five plugin kinds the core dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Filter,
    Responder,
    Command,
    Startup,
    Shutdown,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Filter => write!(f, "filter"),
            PluginKind::Responder => write!(f, "responder"),
            PluginKind::Command => write!(f, "command"),
            PluginKind::Startup => write!(f, "startup"),
            PluginKind::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[derive(Clone)]
enum PluginEntry {
    Filter(Arc<dyn MsgFilter>),
    Responder(Arc<dyn Responder>),
    Command(Arc<dyn Command>),
    Startup(Arc<dyn StartupHook>),
    Shutdown(Arc<dyn ShutdownHook>),
}

impl PluginEntry {
    fn kind(&self) -> PluginKind {
        match self {
            PluginEntry::Filter(_) => PluginKind::Filter,
            PluginEntry::Responder(_) => PluginKind::Responder,
            PluginEntry::Command(_) => PluginKind::Command,
            PluginEntry::Startup(_) => PluginKind::Startup,
            PluginEntry::Shutdown(_) => PluginKind::Shutdown,
        }
    }
}

struct Entry {
    plugin: PluginEntry,
    enabled: bool,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    // registration order across all kinds; accessors filter by kind
    order: Vec<String>,
}

/// Holds named plugin instances with per-plugin enable flags.
///
/// Registration order is preserved per kind; filters in particular run in
/// the order they were registered. Clones share the registry.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, name: &str, plugin: PluginEntry) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.contains_key(name) {
            return Err(Error::DuplicatePlugin(name.to_string()));
        }
        let kind = plugin.kind();
        inner.entries.insert(
            name.to_string(),
            Entry {
                plugin,
                enabled: true,
            },
        );
        inner.order.push(name.to_string());
        tracing::info!(plugin = %name, kind = %kind, "plugin registered");
        Ok(())
    }

    pub fn register_filter(&self, name: &str, filter: Arc<dyn MsgFilter>) -> Result<()> {
        self.register(name, PluginEntry::Filter(filter))
    }

    pub fn register_responder(&self, name: &str, responder: Arc<dyn Responder>) -> Result<()> {
        self.register(name, PluginEntry::Responder(responder))
    }

    pub fn register_command(&self, name: &str, command: Arc<dyn Command>) -> Result<()> {
        self.register(name, PluginEntry::Command(command))
    }

    pub fn register_startup_hook(&self, name: &str, hook: Arc<dyn StartupHook>) -> Result<()> {
        self.register(name, PluginEntry::Startup(hook))
    }

    pub fn register_shutdown_hook(&self, name: &str, hook: Arc<dyn ShutdownHook>) -> Result<()> {
        self.register(name, PluginEntry::Shutdown(hook))
    }

    /// Remove a plugin by name. Returns whether one was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let removed = inner.entries.remove(name).is_some();
        if removed {
            inner.order.retain(|n| n != name);
            tracing::info!(plugin = %name, "plugin unregistered");
        }
        removed
    }

    /// Re-enable a plugin so the event loop dispatches to it again.
    pub fn enable(&self, name: &str) -> Result<()> {
        self.set_enabled(name, true)
    }

    /// Disable a plugin without unregistering it.
    pub fn disable(&self, name: &str) -> Result<()> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.entries.get_mut(name) {
            Some(entry) => {
                entry.enabled = enabled;
                tracing::info!(plugin = %name, enabled, "plugin toggled");
                Ok(())
            }
            None => Err(Error::UnknownPlugin(name.to_string())),
        }
    }

    pub fn is_enabled(&self, name: &str) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .get(name)
            .map(|entry| entry.enabled)
            .ok_or_else(|| Error::UnknownPlugin(name.to_string()))
    }

    pub fn kind_of(&self, name: &str) -> Option<PluginKind> {
        let inner = self.inner.lock().unwrap();
        inner.entries.get(name).map(|entry| entry.plugin.kind())
    }

    /// All plugin names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.inner.lock().unwrap().order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().entries.is_empty()
    }

    fn collect<T>(&self, pick: impl Fn(&PluginEntry) -> Option<T>) -> Vec<(String, T)> {
        let inner = self.inner.lock().unwrap();
        inner
            .order
            .iter()
            .filter_map(|name| {
                let entry = inner.entries.get(name)?;
                if !entry.enabled {
                    return None;
                }
                pick(&entry.plugin).map(|plugin| (name.clone(), plugin))
            })
            .collect()
    }

    /// Enabled filters, registration order.
    pub fn filters(&self) -> Vec<(String, Arc<dyn MsgFilter>)> {
        self.collect(|entry| match entry {
            PluginEntry::Filter(f) => Some(Arc::clone(f)),
            _ => None,
        })
    }

    /// Enabled responders, registration order.
    pub fn responders(&self) -> Vec<(String, Arc<dyn Responder>)> {
        self.collect(|entry| match entry {
            PluginEntry::Responder(r) => Some(Arc::clone(r)),
            _ => None,
        })
    }

    /// Enabled commands, registration order.
    pub fn commands(&self) -> Vec<(String, Arc<dyn Command>)> {
        self.collect(|entry| match entry {
            PluginEntry::Command(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    pub fn startup_hooks(&self) -> Vec<(String, Arc<dyn StartupHook>)> {
        self.collect(|entry| match entry {
            PluginEntry::Startup(h) => Some(Arc::clone(h)),
            _ => None,
        })
    }

    pub fn shutdown_hooks(&self) -> Vec<(String, Arc<dyn ShutdownHook>)> {
        self.collect(|entry| match entry {
            PluginEntry::Shutdown(h) => Some(Arc::clone(h)),
            _ => None,
        })
    }
}
