//! Lifecycle dispatcher.
//!
//! A command declaring events `[E1, .., En]` at path `P` expands to
//! `before:P:E1, P:E1, after:P:E1, .., before:P:En, P:En, after:P:En`.
//! For each event, every plugin bound to it runs in load order. Each hook is
//! awaited before the next one starts; the first failure stops the sequence
//! and nothing already done is rolled back.

use crate::command::CommandNode;
use crate::error::{FrameworkError, Result};
use crate::execution_context::ExecutionContext;
use crate::plugin::PluginLoader;
use std::fmt;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    During,
    After,
}

impl Phase {
    const ALL: [Phase; 3] = [Phase::Before, Phase::During, Phase::After];

    fn prefix(self) -> Option<&'static str> {
        match self {
            Phase::Before => Some("before"),
            Phase::During => None,
            Phase::After => Some("after"),
        }
    }
}

/// One schedulable point of a command execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LifecycleEvent {
    pub phase: Phase,
    pub path: Vec<String>,
    pub event: String,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.phase.prefix() {
            write!(f, "{}:", prefix)?;
        }
        for segment in &self.path {
            write!(f, "{}:", segment)?;
        }
        write!(f, "{}", self.event)
    }
}

/// Expands a command's declared events into the full before/during/after order.
pub fn event_sequence<P, E>(path: &[P], events: &[E]) -> Vec<LifecycleEvent>
where
    P: AsRef<str>,
    E: AsRef<str>,
{
    let path: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
    events
        .iter()
        .flat_map(|event| {
            let path = path.clone();
            Phase::ALL.into_iter().map(move |phase| LifecycleEvent {
                phase,
                path: path.clone(),
                event: event.as_ref().to_string(),
            })
        })
        .collect()
}

pub struct Dispatcher<'a> {
    loader: &'a PluginLoader,
}

impl<'a> Dispatcher<'a> {
    pub fn new(loader: &'a PluginLoader) -> Self {
        Self { loader }
    }

    /// Fires every event of `node` at `path`, in order.
    pub async fn dispatch(&self, path: &[String], node: &CommandNode, ctx: &mut ExecutionContext) -> Result<()> {
        let sequence = event_sequence(path, node.lifecycle_events.as_slice());
        debug!("Dispatching {} event(s) for '{}'", sequence.len(), path.join(" "));

        for event in &sequence {
            self.fire(&event.to_string(), ctx).await?;
        }
        Ok(())
    }

    /// Runs every hook bound to `event`, in plugin load order.
    pub async fn fire(&self, event: &str, ctx: &mut ExecutionContext) -> Result<()> {
        for loaded in self.loader.plugins().iter().filter(|p| p.binds(event)) {
            debug!("{} -> {}", event, loaded.name());
            if let Err(source) = loaded.plugin().run_hook(event, ctx).await {
                error!("Hook '{}' of plugin '{}' failed: {:#}", event, loaded.name(), source);
                return Err(FrameworkError::HookExecution {
                    plugin: loaded.name().to_string(),
                    event: event.to_string(),
                    source,
                });
            }
        }
        Ok(())
    }
}
