//! Core command declarations.
//!
//! Declares the commands and their lifecycle events; binds no hooks.

use crate::command::{CommandNode, OptionSpec};
use crate::plugin::Plugin;
use async_trait::async_trait;

pub struct CorePlugin;

fn stage_and_region(node: CommandNode) -> CommandNode {
    node.option("stage", OptionSpec::new("Stage of the service").shortcut("s"))
        .option("region", OptionSpec::new("Region of the service").shortcut("r"))
}

#[async_trait]
impl Plugin for CorePlugin {
    fn name(&self) -> &str {
        "core"
    }

    fn commands(&self) -> Vec<CommandNode> {
        let function = stage_and_region(
            CommandNode::new("function")
                .usage("Deploy a single function from the service")
                .lifecycle_events(["deploy"])
                .option(
                    "function",
                    OptionSpec::new("Name of the function").shortcut("f").required(),
                ),
        );

        let deploy = stage_and_region(
            CommandNode::new("deploy")
                .usage("Deploy the service")
                .lifecycle_events([
                    "cleanup",
                    "initialize",
                    "setupProviderConfiguration",
                    "createDeploymentArtifacts",
                    "compileFunctions",
                    "compileEvents",
                    "deploy",
                ])
                .option("noDeploy", OptionSpec::new("Build the template without deploying it").shortcut("n")),
        )
        .command(function);

        let info = stage_and_region(
            CommandNode::new("info")
                .usage("Display information about the service")
                .lifecycle_events(["info"]),
        );

        vec![deploy, info]
    }
}
