use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::types::{ExecutionStatus, InvocationId, InvocationResult};
use crate::config::validator::validate_config;
use crate::config::worker::WorkerConfig;
use crate::dispatch::{RedisBroker, Worker};
use crate::exec::SandboxExecutor;
use crate::judge::registry;
use crate::kernel::signal::{self, SignalHandler};
use crate::safety::workspace::WorkspaceManager;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CliMode {
    /// `invokebox`: every command
    Full,
    /// `invokebox-worker`: the worker loop only
    Worker,
}

impl CliMode {
    fn primary_binary(self) -> &'static str {
        match self {
            Self::Full => "invokebox",
            Self::Worker => "invokebox-worker",
        }
    }

    fn allows(self, command: &Commands) -> bool {
        match self {
            Self::Full => true,
            Self::Worker => matches!(command, Commands::Worker { .. }),
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file; flags and environment override its values
    #[arg(long, global = true, env = "INVOKEBOX_CONFIG")]
    config: Option<PathBuf>,
    /// Queue/store host
    #[arg(long, global = true, env = "REDIS_HOST")]
    redis_host: Option<String>,
    /// Queue/store port
    #[arg(long, global = true, env = "REDIS_PORT")]
    redis_port: Option<u16>,
    /// Directory per-invocation workspaces are created under
    #[arg(long, global = true, env = "SANDBOX_ROOT")]
    sandbox_root: Option<PathBuf>,
    /// CPU-time ceiling in seconds
    #[arg(long, global = true, env = "CPU_TIME_LIMIT")]
    cpu_time_limit: Option<u64>,
    /// Address-space ceiling in MB
    #[arg(long, global = true, env = "MEMORY_LIMIT_MB")]
    memory_limit_mb: Option<u64>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume the execution queue for one language until signalled
    Worker {
        /// Runtime id to serve (see `languages`)
        #[arg(long, env = "WORKER_LANGUAGE")]
        language: Option<String>,
    },
    /// Execute one invocation locally and print its result record
    Run {
        #[arg(long)]
        language: String,
        /// File holding the user's handler source
        #[arg(long)]
        code_file: PathBuf,
        /// Event as JSON text (default `{}`)
        #[arg(long)]
        input: Option<String>,
    },
    /// List supported runtime ids
    Languages,
    /// Remove stale workspaces under the sandbox root
    Sweep {
        /// Minimum age in seconds (default: stale_workspace_secs from config)
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

impl Commands {
    fn command_name(&self) -> &'static str {
        match self {
            Self::Worker { .. } => "worker",
            Self::Run { .. } => "run",
            Self::Languages => "languages",
            Self::Sweep { .. } => "sweep",
        }
    }
}

impl Cli {
    /// File config first, then flag/environment overrides
    fn load_config(&self) -> Result<WorkerConfig> {
        let mut config = match &self.config {
            Some(path) => WorkerConfig::load(path)?,
            None => WorkerConfig::default(),
        };
        if let Some(host) = &self.redis_host {
            config.redis_host = host.clone();
        }
        if let Some(port) = self.redis_port {
            config.redis_port = port;
        }
        if let Some(root) = &self.sandbox_root {
            config.sandbox_root = root.clone();
        }
        if let Some(cpu) = self.cpu_time_limit {
            config.cpu_time_limit_secs = cpu;
        }
        if let Some(mem) = self.memory_limit_mb {
            config.memory_limit_mb = mem;
        }
        Ok(config)
    }
}

pub fn run(mode: CliMode) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut cli = Cli::parse();
    let command = match (cli.command.take(), mode) {
        (Some(command), _) => command,
        // Bare `invokebox-worker`: the language comes from the environment
        // or the config file.
        (None, CliMode::Worker) => Commands::Worker {
            language: std::env::var("WORKER_LANGUAGE").ok(),
        },
        (None, CliMode::Full) => {
            return Err(anyhow::anyhow!(
                "missing command; see '{} --help'",
                mode.primary_binary()
            ))
        }
    };

    if !mode.allows(&command) {
        eprintln!(
            "Error: command '{}' is not available in {}; use '{}'",
            command.command_name(),
            mode.primary_binary(),
            CliMode::Full.primary_binary()
        );
        std::process::exit(2);
    }

    let config = cli.load_config()?;
    match command {
        Commands::Worker { language } => run_worker(config, language),
        Commands::Run {
            language,
            code_file,
            input,
        } => run_local(config, &language, &code_file, input.as_deref()),
        Commands::Languages => {
            list_languages();
            Ok(())
        }
        Commands::Sweep { max_age_secs } => sweep(&config, max_age_secs),
    }
}

fn run_worker(mut config: WorkerConfig, language: Option<String>) -> Result<()> {
    if language.is_some() {
        config.language = language;
    }
    validate_config(&config)?;
    let language = config
        .language
        .clone()
        .context("worker language is not set")?;
    let adapter = registry::adapter_for(&language)?;

    // Before any helper thread exists.
    let signals = SignalHandler::init()?;

    let executor = SandboxExecutor::from_config(&config)
        .with_context(|| format!("preparing sandbox root {}", config.sandbox_root.display()))?;
    match executor
        .workspaces()
        .sweep_stale(config.stale_workspace_age())
    {
        Ok(0) => {}
        Ok(n) => log::info!("Swept {} stale workspaces", n),
        Err(e) => log::warn!("Stale workspace sweep failed: {}", e),
    }

    log::info!(
        "{} worker started. Connecting to Redis at {}:{}",
        adapter.language(),
        config.redis_host,
        config.redis_port
    );
    let mut broker = RedisBroker::open(&config.redis_url())?;
    if let Err(e) = broker.connect() {
        log::warn!("Initial Redis connection failed, will retry: {}", e);
    }

    let mut worker = Worker::new(broker, executor, adapter)
        .with_poll_timeout(config.poll_timeout())
        .with_result_ttl(config.result_ttl());
    worker.run_while(signal::should_continue);

    if signals.get_signal() != 0 {
        log::info!("Shut down after signal {}", signals.get_signal());
    }
    Ok(())
}

fn run_local(
    mut config: WorkerConfig,
    language: &str,
    code_file: &Path,
    input: Option<&str>,
) -> Result<()> {
    config.language = Some(language.to_string());
    validate_config(&config)?;
    let adapter = registry::adapter_for(language)?;

    let code = std::fs::read_to_string(code_file)
        .with_context(|| format!("reading {}", code_file.display()))?;
    let event: serde_json::Value = match input {
        Some(text) => serde_json::from_str(text).context("--input is not valid JSON")?,
        None => serde_json::json!({}),
    };

    let executor = SandboxExecutor::from_config(&config)?;
    let started_at = chrono::Utc::now();
    let outcome = executor.execute(adapter.as_ref(), &code, &event);
    let finished_at = chrono::Utc::now();

    let invocation_id = InvocationId::Str(format!("local-{}", started_at.timestamp_millis()));
    let record = InvocationResult::from_outcome(invocation_id, &outcome);
    let mut report = serde_json::to_value(&record)?;
    if let Some(fields) = report.as_object_mut() {
        fields.insert("language".to_string(), adapter.language().into());
        fields.insert("startedAt".to_string(), started_at.to_rfc3339().into());
        fields.insert("finishedAt".to_string(), finished_at.to_rfc3339().into());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    if record.status != ExecutionStatus::Success {
        std::process::exit(1);
    }
    Ok(())
}

fn list_languages() {
    for id in registry::supported_languages() {
        let kind = match registry::adapter_for(id) {
            Ok(adapter) => adapter.kind().as_str(),
            Err(_) => continue,
        };
        println!("{:<12} {}", id, kind);
    }
}

fn sweep(config: &WorkerConfig, max_age_secs: Option<u64>) -> Result<()> {
    let max_age = max_age_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.stale_workspace_age());
    let manager = WorkspaceManager::new(config.sandbox_root.clone())?;
    let removed = manager.sweep_stale(max_age)?;
    println!(
        "Removed {} stale workspace(s) under {}",
        removed,
        manager.base_dir().display()
    );
    Ok(())
}
