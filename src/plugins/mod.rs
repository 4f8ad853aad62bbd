//! Plugins shipped with the binary.

pub mod aws;
pub mod core;

use crate::plugin::{Plugin, PluginFactory};

/// Built-in plugins, in load order: command declarations first, then the
/// provider hooks that act on them.
pub fn builtin() -> Vec<PluginFactory> {
    let commands: PluginFactory = Box::new(|| -> anyhow::Result<Box<dyn Plugin>> { Ok(Box::new(self::core::CorePlugin)) });
    let provider_hooks: PluginFactory = Box::new(|| -> anyhow::Result<Box<dyn Plugin>> { Ok(Box::new(self::aws::AwsPlugin)) });
    vec![commands, provider_hooks]
}
