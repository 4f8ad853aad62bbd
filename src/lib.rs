//! Nimbus - plugin-driven infrastructure deployment CLI.
//!
//! Commands, their options and their lifecycle events are declared by
//! plugins; other plugins hook into those events. A single invocation is
//! resolved against the merged command tree and then driven through its
//! `before:` / during / `after:` events, one hook at a time.
//!
//! # Architecture
//!
//! - [`command`] - Command tree, merging and path resolution
//! - [`plugin`] - Plugin capability trait and loader
//! - [`lifecycle`] - Event sequencing and hook dispatch
//! - [`execution_context`] - State shared by the hooks of one command
//! - [`cli`] - Input processing, help and version rendering
//! - [`framework`] - Ties the above together for one invocation
//! - [`provider`] - Provider request pipeline (credentials, retries)
//! - [`plugins`] - Built-in `core` and `aws` plugins
//! - [`config`] - Configuration (`~/.nimbus/config.toml` plus environment)
//! - [`service`] - Service descriptor (`service.toml`)
//! - [`providers`] - Shared dependency injection traits
//! - [`http_client`] - HTTP client abstraction
//! - [`error`] - Error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use nimbus::framework::{Backend, Framework};
//! use nimbus::{plugins, providers::SystemEnvProvider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let framework = Framework::new(&plugins::builtin())?;
//!     let dir = std::env::current_dir()?;
//!
//!     framework
//!         .run(&["deploy", "--stage", "prod"], &mut std::io::stdout(), || {
//!             Backend::load(&dir, Arc::new(SystemEnvProvider))
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod execution_context;
pub mod framework;
pub mod http_client;
pub mod lifecycle;
pub mod plugin;
pub mod plugins;
pub mod provider;
pub mod providers;
pub mod service;

#[cfg(test)]
mod test_support;
