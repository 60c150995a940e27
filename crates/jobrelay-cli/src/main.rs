//! # JobRelay CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Start a coordinator
//! jobrelay coordinator --config coordinator.properties
//!
//! # Start a worker serving built-in tools and scripts from ./tools
//! jobrelay worker --worker-config alpha.properties \
//!   --coordinator-config coordinator.properties --scripts ./tools
//!
//! # Submit a job (outputs raw JSON)
//! jobrelay submit --config coordinator.properties Fibonacci 10
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use argh::FromArgs;
use jobrelay_cli::{code_source, coordinator_config, coordinator_endpoint, parse_parameter, worker_config};
use jobrelay_client::JobRelayClient;
use jobrelay_common::config::{Properties, Role};
use jobrelay_coordinator::{CoordinatorServer, RotationPolicy};
use jobrelay_worker::{CodeLoader, WorkerServer};

#[derive(FromArgs)]
/// JobRelay - distributed job execution
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Coordinator(CoordinatorArgs),
    Worker(WorkerArgs),
    Submit(SubmitArgs),
}

/// Arguments for starting a coordinator.
///
/// The properties file holds `PORT` and optionally the bind `HOST`.
#[derive(FromArgs)]
#[argh(subcommand, name = "coordinator")]
/// start a coordinator
struct CoordinatorArgs {
    /// coordinator properties file
    #[argh(option, short = 'c')]
    config: PathBuf,

    /// how re-registered worker names enter the rotation: dedupe or append
    #[argh(option)]
    rotation: Option<RotationPolicy>,

    /// give up on a forwarded job after this many milliseconds
    ///
    /// Unbounded when omitted.
    #[argh(option, long = "forward-timeout-ms")]
    forward_timeout_ms: Option<u64>,
}

/// Arguments for starting a worker.
///
/// Tools are looked up among the built-ins, then in `--scripts`, then on
/// the code server named by `--code-source-config`.
#[derive(FromArgs)]
#[argh(subcommand, name = "worker")]
/// start a worker
struct WorkerArgs {
    /// worker properties file (NAME, PORT, optional advertised HOST)
    #[argh(option, long = "worker-config")]
    worker_config: PathBuf,

    /// coordinator properties file (HOST, PORT)
    #[argh(option, long = "coordinator-config")]
    coordinator_config: PathBuf,

    /// code server properties file (HOST, PORT)
    #[argh(option, long = "code-source-config")]
    code_source_config: Option<PathBuf>,

    /// directory of `<tool>.js` scripts
    #[argh(option)]
    scripts: Option<PathBuf>,

    /// registration attempts before giving up
    #[argh(option, long = "register-attempts")]
    register_attempts: Option<u32>,
}

/// Arguments for submitting a single job.
///
/// Prints the raw JSON result to stdout, so the output can be piped to
/// other tools. Failures go to stderr with a non-zero exit code.
#[derive(FromArgs)]
#[argh(subcommand, name = "submit")]
/// submit a job and print its result
struct SubmitArgs {
    /// coordinator properties file (HOST, PORT)
    #[argh(option, short = 'c')]
    config: PathBuf,

    /// tool to run
    #[argh(positional)]
    tool: String,

    /// JSON parameter for the tool
    #[argh(positional, default = "String::from(\"null\")")]
    parameter: String,

    /// give up after this many milliseconds
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // submit keeps stdout clean for piping
    if !matches!(cli.command, Commands::Submit(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Coordinator(args) => run_coordinator(args).await,
        Commands::Worker(args) => run_worker(args).await,
        Commands::Submit(args) => run_submit(args).await,
    }
}

async fn run_coordinator(args: CoordinatorArgs) -> Result<()> {
    let props = Properties::load_for(&args.config, Role::Coordinator)?;
    let config = coordinator_config(&props, args.rotation, args.forward_timeout_ms)?;

    tracing::info!(
        rotation = %config.rotation,
        forward_timeout_ms = ?config.forward_timeout.map(|t| t.as_millis()),
        "Starting coordinator"
    );

    let server = CoordinatorServer::bind(&config)
        .await
        .with_context(|| format!("cannot bind coordinator on {}", config.bind_addr()))?;
    server.run().await?;
    Ok(())
}

async fn run_worker(args: WorkerArgs) -> Result<()> {
    let worker_props = Properties::load_for(&args.worker_config, Role::Worker)?;
    let coordinator_props = Properties::load_for(&args.coordinator_config, Role::Coordinator)?;
    let code_props = args
        .code_source_config
        .as_ref()
        .map(|path| Properties::load_for(path, Role::CodeSource))
        .transpose()?;

    let config = worker_config(&worker_props, &coordinator_props, args.register_attempts)?;
    let source = code_source(args.scripts.as_deref(), code_props.as_ref())?;
    let loader = Arc::new(CodeLoader::new(Arc::new(source)));

    let server = WorkerServer::bind(config, loader).await?;
    server
        .run()
        .await
        .context("worker stopped")?;
    Ok(())
}

async fn run_submit(args: SubmitArgs) -> Result<()> {
    let props = Properties::load_for(&args.config, Role::Coordinator)?;
    let endpoint = coordinator_endpoint(&props)?;
    let parameter = parse_parameter(&args.parameter)?;

    let mut client = JobRelayClient::new(endpoint.addr());
    if let Some(ms) = args.timeout_ms {
        client = client.with_timeout(Duration::from_millis(ms));
    }

    let result = client.submit(args.tool, parameter).await?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests;
