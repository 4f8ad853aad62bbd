use nimbus::error::FrameworkError;
use nimbus::framework::{Backend, Framework, Outcome};
use nimbus::plugins;
use nimbus::providers::SystemEnvProvider;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_env("NIMBUS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(err: &FrameworkError) {
    match err {
        FrameworkError::Usage { message, help } => {
            eprintln!("{}", message);
            eprintln!();
            eprint!("{}", help);
        }
        other => eprintln!("Error: {}", other),
    }
}

async fn run(tokens: &[String]) -> Result<Outcome, FrameworkError> {
    let framework = Framework::new(&plugins::builtin())?;
    let mut stdout = std::io::stdout();
    framework
        .run(tokens, &mut stdout, || {
            let dir = std::env::current_dir()?;
            Backend::load(&dir, Arc::new(SystemEnvProvider))
        })
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let tokens: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    debug!("Processing input: {:?}", tokens);

    match run(&tokens).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}
