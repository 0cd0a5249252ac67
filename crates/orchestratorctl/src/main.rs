//! orchestratorctl entry point.

use std::process::ExitCode;

use clap::Parser;
use orchestratorctl::{execute, init_logging, load_config, Cli};
use sdn_orchestrators::OrchestratorService;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_level.as_deref()) {
        eprintln!("orchestratorctl: {e:#}");
        return ExitCode::from(2);
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("orchestratorctl: {e:#}");
            return ExitCode::from(2);
        }
    };
    debug!(
        registry = %config.registry.path.display(),
        lock = %config.lock_path().display(),
        "Using orchestrator registry"
    );

    let service = OrchestratorService::from_config(&config);
    match execute(&service, &cli.command, config.lock.retries).await {
        Ok(Some(output)) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("orchestratorctl: failed to render output: {e}");
                ExitCode::FAILURE
            }
        },
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = e.kind(), "{}", e);
            eprintln!("orchestratorctl: {}", e.public_message());
            ExitCode::FAILURE
        }
    }
}
