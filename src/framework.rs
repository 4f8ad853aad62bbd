//! Top-level orchestration of one command-line invocation.
//!
//! `raw tokens -> processed input -> help/version -> resolve -> connect ->
//! validate -> dispatch`. Help and version short-circuit before anything is
//! resolved or loaded; resolution problems and missing options surface as
//! usage errors carrying the help text of the closest command.

use crate::cli::{Cli, ProcessedInput, process_input};
use crate::command::CommandNode;
use crate::config::Config;
use crate::error::{FrameworkError, Result};
use crate::execution_context::ExecutionContext;
use crate::http_client::ReqwestHttpClient;
use crate::lifecycle::Dispatcher;
use crate::plugin::{PluginFactory, PluginLoader};
use crate::provider::Provider;
use crate::providers::EnvProvider;
use crate::service::Service;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const PROGRAM: &str = "nimbus";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What a run ended with, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Help or version text was written; nothing was dispatched.
    Help,
    /// The command's lifecycle ran to completion.
    Dispatched { command: Vec<String>, template: Value },
}

/// Service descriptor and provider a dispatched command runs against.
#[derive(Clone)]
pub struct Backend {
    service: Arc<Service>,
    provider: Arc<Provider>,
}

impl Backend {
    pub fn new(service: Arc<Service>, provider: Arc<Provider>) -> Self {
        Self { service, provider }
    }

    /// Wires the provider to the real HTTP transport described by `config`.
    pub fn bootstrap(config: &Config, service: Service, env: Arc<dyn EnvProvider>) -> Result<Self> {
        let http = ReqwestHttpClient::from_config(config).map_err(config_error)?;
        let service = Arc::new(service);
        let provider = Arc::new(Provider::from_config(config, Arc::clone(&service), env, Arc::new(http)));
        Ok(Self::new(service, provider))
    }

    /// Reads `~/.nimbus/config.toml` and the `service.toml` in `dir`.
    pub fn load(dir: &Path, env: Arc<dyn EnvProvider>) -> Result<Self> {
        let config = Config::load_with_env(env.as_ref()).map_err(config_error)?;
        let service = Service::load(dir).map_err(config_error)?;
        Self::bootstrap(&config, service, env)
    }
}

fn config_error(err: anyhow::Error) -> FrameworkError {
    FrameworkError::Config(format!("{:#}", err))
}

pub struct Framework {
    loader: PluginLoader,
    cli: Cli,
}

impl Framework {
    /// Loads the plugins and merges their commands.
    pub fn new(factories: &[PluginFactory]) -> Result<Self> {
        let loader = PluginLoader::load(factories)?;
        let cli = Cli::new(PROGRAM, VERSION, loader.collect_commands());
        Ok(Self { loader, cli })
    }

    /// Runs one invocation. Help and version text go to `out`.
    ///
    /// `connect` is only called once a command is resolved, so help and
    /// usage errors never depend on the service or provider setup.
    pub async fn run<S, F>(&self, tokens: &[S], out: &mut dyn Write, connect: F) -> Result<Outcome>
    where
        S: AsRef<str>,
        F: FnOnce() -> Result<Backend>,
    {
        let processed = process_input(tokens);
        if self.cli.display_help(tokens, &processed, out)? {
            return Ok(Outcome::Help);
        }

        let Some(resolution) = self.cli.registry().resolve(processed.commands.as_slice()) else {
            return Err(FrameworkError::Usage {
                message: format!("Command \"{}\" not found", processed.commands.join(" ")),
                help: self.cli.render_general_help(),
            });
        };
        if !resolution.is_exact() {
            return Err(FrameworkError::Usage {
                message: format!(
                    "Unknown arguments for \"{}\": {}",
                    resolution.path.join(" "),
                    resolution.remaining.join(" ")
                ),
                help: self.cli.render_command_help(&resolution.path, resolution.node),
            });
        }

        let backend = connect()?;
        let options = execution_options(resolution.node, &processed, &backend.service);
        if let Some(missing) = missing_required(resolution.node, &options) {
            return Err(FrameworkError::Usage {
                message: format!("Missing required option \"--{}\"", missing),
                help: self.cli.render_command_help(&resolution.path, resolution.node),
            });
        }

        info!("Running '{}'", resolution.path.join(" "));
        let mut ctx = ExecutionContext::new(resolution.path.clone(), options, backend.service, backend.provider);
        Dispatcher::new(&self.loader)
            .dispatch(&resolution.path, resolution.node, &mut ctx)
            .await?;

        Ok(Outcome::Dispatched {
            command: resolution.path,
            template: ctx.template,
        })
    }
}

/// Options as hooks see them: the raw pairs, long-name copies of any
/// shortcuts, and the service's stage and region when none were given.
fn execution_options(node: &CommandNode, processed: &ProcessedInput, service: &Service) -> BTreeMap<String, String> {
    let mut options = processed.options.clone();
    for (key, value) in &processed.options {
        if let Some(name) = node.option_name_for(key) {
            if name != key.as_str() && !processed.options.contains_key(name) {
                options.insert(name.to_string(), value.clone());
            }
        }
    }

    let settings = &service.provider;
    options
        .entry("stage".to_string())
        .or_insert_with(|| settings.stage.clone());
    options
        .entry("region".to_string())
        .or_insert_with(|| settings.region.clone());
    options
}

fn missing_required<'a>(node: &'a CommandNode, options: &BTreeMap<String, String>) -> Option<&'a str> {
    node.options
        .iter()
        .find(|(name, spec)| spec.required && !options.contains_key(name.as_str()))
        .map(|(name, _)| name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::OptionSpec;
    use crate::plugin::Plugin;
    use crate::test_support::{ScriptedClients, test_provider};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<(String, BTreeMap<String, String>)>>>;

    /// Declares `deploy` and `deploy function`, and records what its hooks see.
    struct Recorder {
        seen: Seen,
        fail: bool,
    }

    #[async_trait]
    impl Plugin for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn commands(&self) -> Vec<CommandNode> {
            vec![
                CommandNode::new("deploy")
                    .usage("Deploy the service")
                    .lifecycle_events(["deploy"])
                    .option("stage", OptionSpec::new("Stage").shortcut("s"))
                    .command(
                        CommandNode::new("function")
                            .usage("Deploy a single function")
                            .lifecycle_events(["deploy"])
                            .option("function", OptionSpec::new("Function name").shortcut("f").required()),
                    ),
            ]
        }

        fn hooks(&self) -> Vec<String> {
            vec!["deploy:deploy".to_string(), "deploy:function:deploy".to_string()]
        }

        async fn run_hook(&self, event: &str, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push((event.to_string(), ctx.options.clone()));
            if self.fail {
                return Err(anyhow!("Stack update failed"));
            }
            ctx.template = json!({ "Resources": { "Marker": event } });
            Ok(())
        }
    }

    fn framework(fail: bool) -> (Framework, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&seen);
        let factory: PluginFactory = Box::new(move || -> anyhow::Result<Box<dyn Plugin>> {
            Ok(Box::new(Recorder {
                seen: Arc::clone(&recorded),
                fail,
            }))
        });
        (Framework::new(&[factory]).unwrap(), seen)
    }

    fn backend() -> Backend {
        let mut service = Service::new("svc");
        service.provider.stage = "qa".to_string();
        let service = Arc::new(service);
        let provider = test_provider(Arc::clone(&service), ScriptedClients::with_responses(vec![]));
        Backend::new(service, provider)
    }

    async fn run(framework: &Framework, tokens: &[&str]) -> (Result<Outcome>, String) {
        let mut out = Vec::new();
        let result = framework.run(tokens, &mut out, || Ok(backend())).await;
        (result, String::from_utf8(out).unwrap())
    }

    /// Runs with a backend that cannot be set up, counting connect attempts.
    async fn run_unconnected(framework: &Framework, tokens: &[&str]) -> (Result<Outcome>, String, usize) {
        let mut out = Vec::new();
        let mut attempts = 0;
        let result = framework
            .run(tokens, &mut out, || {
                attempts += 1;
                Err(FrameworkError::Config("Failed to parse service.toml".to_string()))
            })
            .await;
        (result, String::from_utf8(out).unwrap(), attempts)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    #[tokio::test]
    async fn test_dispatches_resolved_command() {
        let (framework, seen) = framework(false);
        let (result, out) = run(&framework, &["deploy", "--stage", "prod"]).await;

        assert!(out.is_empty());
        match result.unwrap() {
            Outcome::Dispatched { command, template } => {
                assert_eq!(command, vec!["deploy"]);
                assert_eq!(template["Resources"]["Marker"], "deploy:deploy");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1["stage"], "prod");
        assert_eq!(seen[0].1["region"], "us-east-1");
    }

    #[tokio::test]
    async fn test_shortcut_copied_to_long_name() {
        let (framework, seen) = framework(false);
        let (result, _) = run(&framework, &["deploy", "function", "-f", "hello"]).await;
        assert!(result.is_ok());

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "deploy:function:deploy");
        assert_eq!(seen[0].1["function"], "hello");
        assert_eq!(seen[0].1["f"], "hello");
        // Stage falls back to the service descriptor.
        assert_eq!(seen[0].1["stage"], "qa");
    }

    #[tokio::test]
    async fn test_missing_required_option_is_usage_error() {
        let (framework, seen) = framework(false);
        let (result, _) = run(&framework, &["deploy", "function"]).await;

        match result.unwrap_err() {
            FrameworkError::Usage { message, help } => {
                assert!(message.contains("--function"));
                assert!(help.contains("nimbus deploy function"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_is_usage_error() {
        let (framework, _) = framework(false);
        let (result, _) = run(&framework, &["destroy"]).await;

        let err = result.unwrap_err();
        assert!(err.is_usage());
        assert_eq!(err.to_string(), "Command \"destroy\" not found");
    }

    #[tokio::test]
    async fn test_trailing_segments_are_usage_error() {
        let (framework, seen) = framework(false);
        let (result, _) = run(&framework, &["deploy", "everything"]).await;

        let err = result.unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("everything"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_help_short_circuits_dispatch() {
        let (framework, seen) = framework(false);
        let (result, out) = run(&framework, &["deploy", "--help"]).await;

        assert_eq!(result.unwrap(), Outcome::Help);
        assert!(out.contains("--stage"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hook_failure_message_is_verbatim() {
        let (framework, _) = framework(true);
        let (result, _) = run(&framework, &["deploy"]).await;

        let err = result.unwrap_err();
        assert!(!err.is_usage());
        assert_eq!(err.to_string(), "Stack update failed");
    }

    // =========================================================================
    // Backend setup
    // =========================================================================

    #[tokio::test]
    async fn test_version_does_not_connect() {
        let (framework, _) = framework(false);
        let (result, out, attempts) = run_unconnected(&framework, &["--version"]).await;

        assert_eq!(result.unwrap(), Outcome::Help);
        assert!(out.starts_with("nimbus "));
        assert_eq!(attempts, 0);
    }

    #[tokio::test]
    async fn test_help_does_not_connect() {
        let (framework, _) = framework(false);
        let (result, out, attempts) = run_unconnected(&framework, &["deploy", "--help"]).await;

        assert_eq!(result.unwrap(), Outcome::Help);
        assert!(out.contains("--stage"));
        assert_eq!(attempts, 0);
    }

    #[tokio::test]
    async fn test_usage_errors_do_not_connect() {
        let (framework, _) = framework(false);
        let (result, _, attempts) = run_unconnected(&framework, &["destroy"]).await;

        assert!(result.unwrap_err().is_usage());
        assert_eq!(attempts, 0);
    }

    #[tokio::test]
    async fn test_setup_failure_is_config_error() {
        let (framework, seen) = framework(false);
        let (result, _, attempts) = run_unconnected(&framework, &["deploy"]).await;

        let err = result.unwrap_err();
        assert!(matches!(err, FrameworkError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: Failed to parse service.toml");
        assert_eq!(attempts, 1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_load_reports_malformed_service_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("service.toml"), "service = [\n").unwrap();
        let env = Arc::new(crate::providers::MapEnvProvider::new());

        let Err(err) = Backend::load(dir.path(), env) else {
            panic!("expected a configuration error");
        };
        assert!(matches!(err, FrameworkError::Config(_)));
        assert!(err.to_string().contains("Failed to parse"));
    }
}
