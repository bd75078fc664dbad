//! spz-planner - SPZ strategy planner service
//!
//! Serves the questionnaire API, or provisions a curriculum file into the
//! database and exits.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spz_common::config::{LoggingConfig, RootFolderInitializer, RootFolderResolver, TomlConfig};
use spz_common::db::init_database;
use spz_common::EventBus;
use spz_planner::analysis::OpenAiGenerator;
use spz_planner::identity::spawn_session_sweeper;
use spz_planner::provision::{self, Curriculum};
use spz_planner::{build_router, AppState, PlannerConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MODULE_NAME: &str = "spz-planner";
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(name = "spz-planner")]
#[command(about = "SPZ strategy planner service")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, env = "SPZ_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to bind (overrides server.host)
    #[arg(long, env = "SPZ_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long, env = "SPZ_PORT")]
    port: Option<u16>,

    /// API key for the text-generation gateway (overrides openai.api_key)
    #[arg(long, env = "SPZ_OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Load modules and questions from a curriculum TOML file, then exit
    Provision {
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match &logging.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_for_module(MODULE_NAME);

    init_tracing(&toml_config.logging)?;

    // Build identification first, before any database delay
    info!(
        "Starting SPZ Planner (spz-planner) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    if let Some(Command::Provision { file }) = &args.command {
        let curriculum = Curriculum::load(file)
            .with_context(|| format!("Failed to read curriculum {}", file.display()))?;
        let report = provision::provision(&pool, &curriculum)
            .await
            .context("Failed to provision curriculum")?;
        info!(
            "Provisioned {} modules ({} questions), {} already present",
            report.modules_created, report.questions_created, report.modules_skipped
        );
        return Ok(());
    }

    let api_key = args
        .openai_api_key
        .clone()
        .or_else(|| toml_config.openai.api_key.clone());
    let generator = OpenAiGenerator::new(&toml_config.openai, api_key)
        .context("Failed to build text-generation client")?;
    if !generator.is_configured() {
        warn!("No OpenAI API key configured; analysis requests will fail until one is set");
    }

    let config = PlannerConfig::from_toml(&toml_config);
    let events = EventBus::new(toml_config.realtime.event_capacity);
    let state = AppState::new(pool, Arc::new(generator), events, config);
    let sweeper = spawn_session_sweeper(state.clone(), SESSION_SWEEP_INTERVAL);
    let app = build_router(state);

    let host = args.host.unwrap_or(toml_config.server.host);
    let port = args.port.unwrap_or(toml_config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("spz-planner listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
