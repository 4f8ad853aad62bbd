//! Plugin capability contract and loader.
//!
//! A plugin may contribute command declarations, hooks, or both. Hooks are
//! registered under free-form lifecycle event names such as
//! `before:deploy:deploy`; the dispatcher calls [`Plugin::run_hook`] with the
//! exact name when that event fires.

use crate::command::{CommandNode, CommandRegistry};
use crate::error::{FrameworkError, Result};
use crate::execution_context::ExecutionContext;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info};

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Top-level commands this plugin declares or extends.
    fn commands(&self) -> Vec<CommandNode> {
        Vec::new()
    }

    /// Lifecycle event names this plugin has hooks for.
    fn hooks(&self) -> Vec<String> {
        Vec::new()
    }

    /// Runs the hook bound to `event`. Only called for names in [`Plugin::hooks`].
    async fn run_hook(&self, event: &str, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let _ = ctx;
        anyhow::bail!("plugin '{}' has no hook for '{}'", self.name(), event)
    }
}

/// Constructor for a plugin instance.
pub type PluginFactory = Box<dyn Fn() -> anyhow::Result<Box<dyn Plugin>> + Send + Sync>;

/// A constructed plugin together with its hook bindings.
pub struct LoadedPlugin {
    plugin: Box<dyn Plugin>,
    hooks: HashSet<String>,
}

impl LoadedPlugin {
    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    pub fn binds(&self, event: &str) -> bool {
        self.hooks.contains(event)
    }
}

/// Owns the loaded plugins, in load order.
#[derive(Default)]
pub struct PluginLoader {
    plugins: Vec<LoadedPlugin>,
}

impl PluginLoader {
    /// Instantiates every factory in order.
    ///
    /// The first constructor failure aborts loading and is returned as is.
    pub fn load(factories: &[PluginFactory]) -> Result<Self> {
        let mut plugins = Vec::with_capacity(factories.len());
        for (index, factory) in factories.iter().enumerate() {
            let plugin = factory().map_err(|source| FrameworkError::PluginLoad { index, source })?;
            let hooks: HashSet<String> = plugin.hooks().into_iter().collect();
            debug!("Loaded plugin '{}' with {} hook(s)", plugin.name(), hooks.len());
            plugins.push(LoadedPlugin { plugin, hooks });
        }
        info!("Loaded {} plugin(s)", plugins.len());
        Ok(Self { plugins })
    }

    pub fn plugins(&self) -> &[LoadedPlugin] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Merges every plugin's command contributions, in load order.
    pub fn collect_commands(&self) -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        for loaded in &self.plugins {
            registry.register(loaded.plugin.commands());
        }
        registry
    }
}
