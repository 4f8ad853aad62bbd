//! Command-line front-end.
//!
//! Raw tokens are split into command-path segments and `-k v` option pairs,
//! then checked for help and version requests before anything is dispatched.

use crate::command::{CommandNode, CommandRegistry};
use crate::lifecycle::event_sequence;
use clap::{Arg, ArgAction, Command};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use tracing::debug;

pub const VERSION_TOKENS: [&str; 3] = ["version", "--version", "--v"];
pub const HELP_TOKENS: [&str; 3] = ["help", "--help", "--h"];

/// Command-line input after the first pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedInput {
    pub commands: Vec<String>,
    pub options: BTreeMap<String, String>,
}

fn is_flag(token: &str) -> bool {
    token.starts_with('-')
}

/// Splits raw tokens into command segments and options.
///
/// A flag takes the next token as its value unless that token is a flag
/// too; a flag without a value is left out of the options entirely.
pub fn process_input<S: AsRef<str>>(tokens: &[S]) -> ProcessedInput {
    let mut processed = ProcessedInput::default();
    let mut iter = tokens.iter().map(AsRef::as_ref).peekable();

    while let Some(token) = iter.next() {
        if !is_flag(token) {
            processed.commands.push(token.to_string());
            continue;
        }

        let name = token.trim_start_matches('-');
        match iter.next_if(|next| !is_flag(next)) {
            Some(value) if !name.is_empty() => {
                processed.options.insert(name.to_string(), value.to_string());
            }
            _ => {}
        }
    }

    processed
}

fn contains_any<S: AsRef<str>>(raw: &[S], reserved: &[&str]) -> bool {
    raw.iter().any(|token| reserved.contains(&token.as_ref()))
}

pub struct Cli {
    program: String,
    version: String,
    registry: CommandRegistry,
}

impl Cli {
    pub fn new(program: impl Into<String>, version: impl Into<String>, registry: CommandRegistry) -> Self {
        Self {
            program: program.into(),
            version: version.into(),
            registry,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Renders version or help when the input asks for it.
    ///
    /// Returns `true` when something was rendered and dispatch must not
    /// happen. A version token anywhere beats every help request.
    pub fn display_help<S: AsRef<str>>(
        &self,
        raw: &[S],
        processed: &ProcessedInput,
        out: &mut dyn Write,
    ) -> io::Result<bool> {
        if contains_any(raw, &VERSION_TOKENS) {
            writeln!(out, "{} {}", self.program, self.version)?;
            return Ok(true);
        }

        if !processed.commands.is_empty() && !contains_any(raw, &HELP_TOKENS) {
            return Ok(false);
        }

        let path: Vec<&str> = processed
            .commands
            .iter()
            .map(String::as_str)
            .filter(|segment| !HELP_TOKENS.contains(segment))
            .collect();
        let text = match self.registry.resolve(&path) {
            Some(resolution) => {
                debug!("Rendering help for '{}'", resolution.path.join(" "));
                self.render_command_help(&resolution.path, resolution.node)
            }
            None => self.render_general_help(),
        };
        write!(out, "{}", text)?;
        Ok(true)
    }

    /// Top-level help listing every registered command.
    pub fn render_general_help(&self) -> String {
        let mut root = bare_command(self.program.clone())
            .bin_name(self.program.clone())
            .about(format!("{} {}", self.program, self.version))
            .after_help(format!(
                "Run \"{} [command] --help\" for contextual help on a command.",
                self.program
            ));
        for node in self.registry.roots().values() {
            root = root.subcommand(to_clap(node));
        }
        root.render_help().to_string()
    }

    /// Help for the command at `path`, including the events it fires.
    pub fn render_command_help(&self, path: &[String], node: &CommandNode) -> String {
        let mut command = to_clap(node).bin_name(format!("{} {}", self.program, path.join(" ")));

        let events = event_sequence(path, node.lifecycle_events.as_slice());
        if !events.is_empty() {
            let listed: Vec<String> = events.iter().map(|event| format!("  {}", event)).collect();
            command = command.after_help(format!("Lifecycle events:\n{}", listed.join("\n")));
        }
        command.render_help().to_string()
    }
}

fn bare_command(name: String) -> Command {
    Command::new(name)
        .disable_help_flag(true)
        .disable_help_subcommand(true)
        .disable_version_flag(true)
}

/// Builds the clap view of a command subtree, for rendering only.
fn to_clap(node: &CommandNode) -> Command {
    let mut command = bare_command(node.name.clone()).about(node.usage.clone());

    let mut shorts = HashSet::new();
    for (name, spec) in &node.options {
        let mut arg = Arg::new(name.clone())
            .long(name.clone())
            .help(spec.usage.clone())
            .value_name("VALUE")
            .action(ArgAction::Set)
            .required(spec.required);

        let short = spec.shortcut.as_deref().and_then(single_char);
        if let Some(short) = short.filter(|c| shorts.insert(*c)) {
            arg = arg.short(short);
        }
        command = command.arg(arg);
    }

    for child in node.commands.values() {
        command = command.subcommand(to_clap(child));
    }
    command
}

fn single_char(value: &str) -> Option<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Some(c),
        _ => None,
    }
}
