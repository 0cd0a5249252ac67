//! Command-line front end for the SDN orchestrator registry
//!
//! Maps the five registry operations 1:1 to subcommands. Results go to
//! stdout as JSON, logs go to stderr.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sdn_orchestrators::{
    codec, config::DEFAULT_CONFIG_PATH, Fields, OrchestratorService, RegistryConfig,
    RegistryResult, UpdateRequest,
};
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Manage SDN orchestrator integrations
#[derive(Parser, Debug)]
#[command(name = "orchestratorctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Service configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Registry file, overriding the configuration
    #[arg(short = 'r', long)]
    pub registry: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG when unset
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List all orchestrators, sorted by id
    List,

    /// Show one orchestrator
    Get { id: String },

    /// Create an orchestrator
    Create {
        id: String,

        /// Orchestrator type (psm, afc)
        #[arg(short = 't', long = "type")]
        kind: String,

        /// Field assignment, repeatable
        #[arg(short = 's', long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },

    /// Change fields of an orchestrator
    Update {
        id: String,

        /// Field assignment, repeatable
        #[arg(short = 's', long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,

        /// Field to remove, repeatable
        #[arg(short = 'd', long = "delete")]
        delete: Vec<String>,

        /// Fingerprint the registry must still have
        #[arg(long)]
        digest: Option<String>,
    },

    /// Remove an orchestrator
    Delete {
        id: String,

        /// Fingerprint the registry must still have
        #[arg(long)]
        digest: Option<String>,
    },
}

/// Parses `key=value`. The value may be empty or contain `=`.
pub fn parse_assignment(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{arg}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field name in '{arg}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Coerces assignments the same way the registry file is read.
pub fn assignments_to_fields(assignments: &[(String, String)]) -> Fields {
    assignments
        .iter()
        .map(|(key, value)| (key.clone(), codec::coerce_value(key, value)))
        .collect()
}

/// Install the stderr `fmt` subscriber
pub fn init_logging(level: Option<&str>) -> anyhow::Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{level}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set logger: {e}"))
}

/// Effective configuration for this invocation
pub fn load_config(cli: &Cli) -> anyhow::Result<RegistryConfig> {
    let mut config = RegistryConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(path) = &cli.registry {
        config.registry.path = path.clone();
        config.registry.lock_path = None;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Runs `op`, retrying lock timeouts up to `retries` more times.
pub async fn retrying<T, F, Fut>(retries: u32, mut op: F) -> RegistryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RegistryResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!(attempt, retries, "{}, retrying", e);
            }
            result => return result,
        }
    }
}

/// Executes one subcommand. Returns the JSON to print, if any.
pub async fn execute(
    service: &OrchestratorService,
    command: &Command,
    retries: u32,
) -> RegistryResult<Option<Value>> {
    match command {
        Command::List => {
            let summaries = service.list().await?;
            Ok(Some(to_json(&summaries)))
        }
        Command::Get { id } => {
            let record = service.get(id).await?;
            Ok(Some(to_json(&record)))
        }
        Command::Create { id, kind, set } => {
            let fields = assignments_to_fields(set);
            retrying(retries, || service.create(id, kind, fields.clone())).await?;
            Ok(None)
        }
        Command::Update {
            id,
            set,
            delete,
            digest,
        } => {
            let request = UpdateRequest {
                set: assignments_to_fields(set),
                delete: delete.clone(),
                digest: digest.clone(),
            };
            retrying(retries, || service.update(id, request.clone())).await?;
            Ok(None)
        }
        Command::Delete { id, digest } => {
            retrying(retries, || service.delete(id, digest.as_deref())).await?;
            Ok(None)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
