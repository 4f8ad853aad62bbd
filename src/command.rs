//! Command registry.
//!
//! Plugins contribute command declarations; the registry merges them into a
//! single tree and resolves command-line paths against it.
//!
//! Merging is an explicit recursive overlay:
//! - leaf fields (`usage`, `lifecycle_events`, each option definition) are
//!   last-write-wins, where an empty value in the later declaration leaves
//!   the earlier one in place;
//! - child command maps are unioned, so two plugins can extend the same
//!   command without clobbering each other's subcommands.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Child commands keyed by name.
pub type CommandMap = BTreeMap<String, CommandNode>;

/// Declaration of a single command option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub usage: String,
    /// Single-dash alias (`f` for `-f`).
    #[serde(default)]
    pub shortcut: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl OptionSpec {
    pub fn new(usage: impl Into<String>) -> Self {
        Self {
            usage: usage.into(),
            ..Self::default()
        }
    }

    pub fn shortcut(mut self, shortcut: impl Into<String>) -> Self {
        self.shortcut = Some(shortcut.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A node of the command tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandNode {
    pub name: String,
    #[serde(default)]
    pub usage: String,
    #[serde(default)]
    pub lifecycle_events: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, OptionSpec>,
    #[serde(default)]
    pub commands: CommandMap,
}

impl CommandNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn lifecycle_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lifecycle_events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn option(mut self, name: impl Into<String>, spec: OptionSpec) -> Self {
        self.options.insert(name.into(), spec);
        self
    }

    pub fn command(mut self, child: CommandNode) -> Self {
        self.commands.insert(child.name.clone(), child);
        self
    }

    /// Overlays `other` onto `self`.
    pub fn merge(&mut self, other: CommandNode) {
        if !other.usage.is_empty() {
            self.usage = other.usage;
        }
        if !other.lifecycle_events.is_empty() {
            self.lifecycle_events = other.lifecycle_events;
        }
        for (name, spec) in other.options {
            self.options.insert(name, spec);
        }
        merge_maps(&mut self.commands, other.commands);
    }

    /// Maps an option key given on the command line to its declared name.
    ///
    /// Accepts either the full name or the shortcut.
    pub fn option_name_for(&self, key: &str) -> Option<&str> {
        if let Some((name, _)) = self.options.get_key_value(key) {
            return Some(name.as_str());
        }
        self.options
            .iter()
            .find(|(_, spec)| spec.shortcut.as_deref() == Some(key))
            .map(|(name, _)| name.as_str())
    }
}

fn merge_maps(target: &mut CommandMap, overlay: CommandMap) {
    for (name, node) in overlay {
        match target.get_mut(&name) {
            Some(existing) => existing.merge(node),
            None => {
                target.insert(name, node);
            }
        }
    }
}

/// Result of walking a command path through the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Deepest node matched by the path.
    pub node: &'a CommandNode,
    /// Segments that matched, from the root down to `node`.
    pub path: Vec<String>,
    /// Trailing segments that matched nothing below `node`.
    pub remaining: Vec<String>,
}

impl Resolution<'_> {
    pub fn is_exact(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// The merged command tree contributed by all loaded plugins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRegistry {
    roots: CommandMap,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one plugin's top-level contributions into the tree.
    pub fn register<I>(&mut self, commands: I)
    where
        I: IntoIterator<Item = CommandNode>,
    {
        let overlay: CommandMap = commands
            .into_iter()
            .map(|node| (node.name.clone(), node))
            .collect();
        merge_maps(&mut self.roots, overlay);
    }

    pub fn roots(&self) -> &CommandMap {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Walks `path` segment by segment and returns the deepest match.
    ///
    /// Returns `None` when the path is empty or its first segment names no
    /// top-level command.
    pub fn resolve<'a, S: AsRef<str>>(&'a self, path: &[S]) -> Option<Resolution<'a>> {
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get(first.as_ref())?;
        let mut matched = vec![first.as_ref().to_string()];

        let mut consumed = 0;
        for segment in rest {
            match node.commands.get(segment.as_ref()) {
                Some(child) => {
                    node = child;
                    matched.push(segment.as_ref().to_string());
                    consumed += 1;
                }
                None => break,
            }
        }

        Some(Resolution {
            node,
            path: matched,
            remaining: rest[consumed..]
                .iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
        })
    }
}
