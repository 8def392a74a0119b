use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snowpost::config::{default_config_path, Config};
use snowpost::scheduler::run_schedule;
use snowpost::{app, Pipeline};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "snowpost")]
#[command(about = "Autonomous Nostr posting agent with long-term memory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (default: ~/.snowpost/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run on the randomised schedule until interrupted
    Run,
    /// Run a single cycle and exit
    Once,
    /// Seed long-term memory from a file, one memory per line
    Seed {
        /// Text file to read
        file: PathBuf,
    },
    /// Validate the configuration and exit
    CheckConfig,
    /// Print the configuration JSON schema
    ConfigSchema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    if let Commands::ConfigSchema = command {
        let schema = schemars::schema_for!(Config);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let mut config = load_config(cli.config)?;
    config.expand_paths();

    init_logging(&config.logging.level)?;

    config
        .validate()
        .with_context(|| "Configuration validation failed")?;

    match command {
        Commands::Run => run(config).await,
        Commands::Once => once(config).await,
        Commands::Seed { file } => seed(config, file).await,
        Commands::CheckConfig => check_config(&config),
        Commands::ConfigSchema => Ok(()),
    }
}

/// An explicit path must exist; the default path may be absent.
fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let path = default_config_path();
            if path.exists() {
                Config::load_from_file(&path)
            } else {
                let mut config = Config::default();
                config.apply_env_fallbacks();
                Ok(config)
            }
        }
    }
}

async fn run(config: Config) -> Result<()> {
    tracing::info!("Starting snowpost v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = Arc::new(app::build_pipeline(&config).await?);
    if config.agent.announce_wallet {
        if let Err(e) = pipeline.announce_wallet().await {
            tracing::warn!("Wallet announcement failed: {e:#}");
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let schedule = tokio::spawn(run_schedule(
        config.scheduler.bounds(),
        shutdown_rx,
        move || {
            let pipeline = pipeline.clone();
            async move { run_logged(&pipeline).await }
        },
    ));

    wait_for_shutdown().await?;
    tracing::info!("Received shutdown signal, stopping...");
    let _ = shutdown_tx.send(true);

    let cycles = schedule.await.context("Scheduler task panicked")?;
    tracing::info!(cycles, "Stopped");
    Ok(())
}

async fn run_logged(pipeline: &Pipeline) {
    match pipeline.run_cycle().await {
        Ok(report) => tracing::info!(
            novel = report.novel_notifications,
            score = report.score,
            memory_id = ?report.memory_id,
            external_id = ?report.external_id,
            "Cycle finished"
        ),
        Err(e) => tracing::error!(kind = e.kind(), "Cycle failed: {e}"),
    }
}

async fn once(config: Config) -> Result<()> {
    let pipeline = app::build_pipeline(&config).await?;
    let report = pipeline.run_cycle().await?;
    println!("{}", report.post);
    println!(
        "score: {}  stored: {}  published: {}",
        report.score,
        report.memory_id.is_some(),
        report.external_id.as_deref().unwrap_or("no")
    );
    Ok(())
}

async fn seed(config: Config, file: PathBuf) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read seed file {}", file.display()))?;
    let pipeline = app::build_pipeline(&config).await?;
    let stored = pipeline.seed(content.lines()).await;
    println!("Stored {stored} memories");
    Ok(())
}

fn check_config(config: &Config) -> Result<()> {
    println!("✓ Configuration is valid");
    let keys = app::load_keys(config)?;
    println!("✓ Nostr key is valid");
    println!("  Public key: {}", keys.public_key());
    let stores = app::open_stores(config, &config.data_dir())?;
    println!("✓ Data directory ready: {}", config.data_dir().display());
    println!("  Long-term memories: {}", stores.memory.count()?);
    if config.llm.api_key.is_none() {
        println!("⚠ No LLM API key configured");
    }
    if config.embedding.api_key.is_none() {
        println!("⚠ No embedding API key configured");
    }
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .context("Failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        },
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        },
        _ = signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C");
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter.to_string())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .init();

    Ok(())
}
