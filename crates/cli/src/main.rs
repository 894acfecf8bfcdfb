//! Operational CLI (§6 CLI surface): `serve`, `drain`, `replay`,
//! `config validate`/`config set-active`, `dedup purge`. Grounded on
//! the `stupid-cli` for the local-vs-remote split and on
//! `examples/DaRealYungBidness-decision-gate`'s `clap::Subcommand` +
//! `ExitCode`-returning `main()` shape, since neither of
//! `stupid-cli`'s own binaries (`rules-worker`, `cli::cli`) use
//! subcommands.

mod server_client;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use broker_batcher::{BatcherConfig, SmartBatcher};
use broker_config::ownership::OwnershipRegistry;
use broker_config::types::TeamConfig;
use broker_config::{validation, ConfigLoader};
use broker_core::ownership::NullOwnershipResolver;
use broker_dedup::DedupStore;
use broker_dispatch::{DispatchConfig, Dispatcher};
use broker_engine::{Pipeline, PipelineIngestor, PipelineSettings, SharedQuietGate};
use broker_execlog::ExecutionLog;
use broker_notify::{StdoutTransport, Transport, WebhookTransport};
use broker_scheduler::{InMemoryScheduleStore, Scheduler};
use broker_server::{build_router, AppState};
use broker_storage::InMemoryTabularStore;
use broker_threading::{ThreadManager, ThreadingConfig};
use broker_workload::{NullWorkloadSource, WorkloadAnalyzer};

use server_client::ServerClient;

/// Developer-workflow event broker: ingests webhooks, classifies,
/// dedupes, routes, batches, schedules, and dispatches them.
#[derive(Parser, Debug)]
#[command(name = "broker-cli", about = "Operational CLI for the event broker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server in-process: ingestion, control plane, and
    /// background tick tasks.
    Serve(ServeArgs),
    /// Flush every open batch on a running server immediately.
    Drain(RemoteArgs),
    /// List execution records started within a time window on a
    /// running server.
    Replay(ReplayArgs),
    /// Team configuration utilities.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Dedup store utilities.
    Dedup {
        #[command(subcommand)]
        command: DedupCommand,
    },
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Directory of per-team YAML configuration documents.
    #[arg(long, env = "BROKER_TEAMS_DIR", default_value = "./teams")]
    teams_dir: PathBuf,
    /// Address to bind the HTTP server to.
    #[arg(long, env = "BROKER_BIND", default_value = "0.0.0.0:8080")]
    bind: String,
    /// Optional YAML file of project/component/label ownership, loaded
    /// into an `OwnershipRegistry`. Without it, every event affects no
    /// team and is only reachable through the default channel mapping.
    #[arg(long, env = "BROKER_OWNERSHIP_FILE")]
    ownership_file: Option<PathBuf>,
    /// Destination URL for the generic webhook transport. Without it,
    /// only the stdout reference transport is registered.
    #[arg(long, env = "BROKER_WEBHOOK_URL")]
    webhook_url: Option<String>,
    /// Bounded channel capacity between the HTTP ingress and the
    /// pipeline consumer loop.
    #[arg(long, default_value = "1024")]
    ingest_capacity: usize,
}

#[derive(clap::Args, Debug)]
struct RemoteArgs {
    #[arg(long, env = "BROKER_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server: String,
}

#[derive(clap::Args, Debug)]
struct ReplayArgs {
    #[arg(long, env = "BROKER_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server: String,
    /// Inclusive start of the execution window, RFC 3339.
    #[arg(long)]
    from: DateTime<Utc>,
    /// Inclusive end of the execution window, RFC 3339.
    #[arg(long)]
    to: DateTime<Utc>,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a team configuration document without loading it.
    Validate {
        /// Path to a YAML `TeamConfig` document.
        file: PathBuf,
    },
    /// Roll an already-loaded team back to a prior snapshot version.
    SetActive {
        #[arg(long, env = "BROKER_SERVER_URL", default_value = "http://127.0.0.1:8080")]
        server: String,
        team: String,
        version: u64,
    },
}

#[derive(Subcommand, Debug)]
enum DedupCommand {
    /// Drop every held dedup entry of a given kind category.
    Purge {
        #[arg(long, env = "BROKER_SERVER_URL", default_value = "http://127.0.0.1:8080")]
        server: String,
        #[arg(long)]
        kind: String,
    },
}

/// Exit codes per §6 CLI surface: 0 success, 2 invalid arguments
/// (handled by clap itself before we ever see `Commands`), 3
/// validation failure, 4 backend unavailable.
enum CliError {
    Validation(String),
    BackendUnavailable(anyhow::Error),
    Internal(anyhow::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Validation(_) => 3,
            CliError::BackendUnavailable(_) => 4,
            CliError::Internal(_) => 1,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Validation(msg) => write!(f, "{msg}"),
            CliError::BackendUnavailable(err) => write!(f, "backend unavailable: {err:#}"),
            CliError::Internal(err) => write!(f, "{err:#}"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Serve(args) => serve(args).await,
        Commands::Drain(args) => drain(args).await,
        Commands::Replay(args) => replay(args).await,
        Commands::Config { command } => match command {
            ConfigCommand::Validate { file } => validate(file).await,
            ConfigCommand::SetActive { server, team, version } => set_active(server, team, version).await,
        },
        Commands::Dedup { command } => match command {
            DedupCommand::Purge { server, kind } => purge_dedup(server, kind).await,
        },
    }
}

/// Constructs every `Pipeline` collaborator and runs the HTTP server
/// in-process, grounded on the `server::main`'s `serve`
/// startup sequence: bind, spawn background loops, then
/// `axum::serve`.
async fn serve(args: ServeArgs) -> Result<(), CliError> {
    let config = Arc::new(ConfigLoader::new(args.teams_dir.clone()));
    let loaded = config.load_all().map_err(|e| CliError::Internal(e.into()))?;
    tracing::info!(count = loaded, dir = %args.teams_dir.display(), "loaded team configs");
    config.watch().map_err(|e| CliError::Internal(e.into()))?;

    let ownership: Arc<dyn broker_core::ownership::OwnershipResolver> = match &args.ownership_file {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| CliError::Internal(e.into()))?;
            let registry: OwnershipRegistry = serde_yaml::from_str(&text).map_err(|e| CliError::Internal(e.into()))?;
            Arc::new(registry)
        }
        None => Arc::new(NullOwnershipResolver),
    };

    let dedup = DedupStore::new(100_000, 7 * 24 * 3600);
    let workload = WorkloadAnalyzer::new(Box::new(NullWorkloadSource));
    let quiet_gate = Arc::new(broker_engine::ConfigQuietHoursGate::new(config.clone()));
    let batcher = SmartBatcher::new(BatcherConfig::default(), Box::new(SharedQuietGate(quiet_gate.clone())));
    let scheduler = Scheduler::new(Arc::new(InMemoryScheduleStore::new()));
    let threading = ThreadManager::new(ThreadingConfig::default());

    let mut transports: Vec<Arc<dyn Transport>> = vec![Arc::new(StdoutTransport)];
    if let Some(url) = &args.webhook_url {
        let webhook = WebhookTransport::new(url.clone(), None, Default::default()).map_err(|e| CliError::Internal(e.into()))?;
        transports.push(Arc::new(webhook));
    }
    let dispatcher = Arc::new(Dispatcher::new(transports, DispatchConfig::default(), 16));
    let execlog = Arc::new(ExecutionLog::new(Arc::new(InMemoryTabularStore::new())));

    let pipeline = Arc::new(Pipeline::new(PipelineSettings {
        config: config.clone(),
        ownership,
        dedup,
        workload,
        batcher,
        quiet_gate,
        scheduler,
        threading,
        dispatcher,
        execlog,
    }));

    let handles = broker_engine::background::spawn_all(pipeline.clone());
    let ingestor = Arc::new(PipelineIngestor::spawn(pipeline.clone(), args.ingest_capacity));

    let state = Arc::new(AppState::new(config, ingestor, pipeline, Default::default()));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind).await.map_err(|e| CliError::Internal(e.into()))?;
    tracing::info!(addr = %args.bind, "broker server listening");
    axum::serve(listener, app).await.map_err(|e| CliError::Internal(e.into()))?;

    for handle in handles {
        handle.abort();
    }
    Ok(())
}

async fn drain(args: RemoteArgs) -> Result<(), CliError> {
    let client = ServerClient::new(&args.server);
    let response = client.drain().await.map_err(CliError::BackendUnavailable)?;
    println!("flushed {} batches", response.batches_flushed);
    Ok(())
}

async fn replay(args: ReplayArgs) -> Result<(), CliError> {
    let client = ServerClient::new(&args.server);
    let records = client.replay(args.from, args.to).await.map_err(CliError::BackendUnavailable)?;
    for record in &records {
        println!(
            "{} {} {} -> {:?} delivered={}",
            record.execution_id, record.hook_id, record.started_at, record.status, record.delivered
        );
    }
    println!("{} execution records", records.len());
    Ok(())
}

async fn validate(file: PathBuf) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&file).map_err(|e| CliError::Internal(e.into()))?;
    let config: TeamConfig = serde_yaml::from_str(&text).map_err(|e| CliError::Validation(format!("failed to parse {}: {e}", file.display())))?;

    let result = validation::validate(&config);
    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    if result.valid() {
        println!("{} is valid", file.display());
        return Ok(());
    }

    for error in &result.errors {
        let suggestion = error.suggestion.as_deref().map(|s| format!(" (suggestion: {s})")).unwrap_or_default();
        println!("error: {}: {}{}", error.path, error.message, suggestion);
    }
    Err(CliError::Validation(format!("{} failed validation", file.display())))
}

async fn set_active(server: String, team: String, version: u64) -> Result<(), CliError> {
    let client = ServerClient::new(&server);
    let config = client.set_active_snapshot(&team, version).await.map_err(CliError::BackendUnavailable)?;
    println!("{} is now active at version {}", config.team_id, version);
    Ok(())
}

async fn purge_dedup(server: String, kind: String) -> Result<(), CliError> {
    let client = ServerClient::new(&server);
    let response = client.purge_dedup(&kind).await.map_err(CliError::BackendUnavailable)?;
    println!("purged {} dedup entries of kind '{}'", response.purged, kind);
    Ok(())
}
