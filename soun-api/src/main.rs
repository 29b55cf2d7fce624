//! soun-api - Study assistant HTTP service
//!
//! Startup order: arguments, bootstrap config, logging, database, data
//! folder, housekeeping, language model, then the HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use soun_common::config::{
    load_toml_config, resolve_database_url, write_toml_config, CompiledDefaults,
    DataFolderInitializer, DataFolderResolver, TomlConfig,
};
use soun_common::db::init_database;
use soun_api::config::{build_language_model, resolve_openai_api_key};
use soun_api::db::{quizzes, settings, tokens};
use soun_api::sessions::store::DEFAULT_SWEEP_INTERVAL;
use soun_api::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default age after which unfinished quiz sessions are abandoned at startup
const DEFAULT_STALE_SESSION_HOURS: i64 = 24;

#[derive(Parser, Debug)]
#[command(name = "soun-api")]
#[command(about = "Study assistant API: courses, documents, tutoring, quizzes and flashcards")]
#[command(version)]
struct Args {
    /// Path to the TOML bootstrap config
    #[arg(short, long, env = "SOUN_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value = "5780", env = "SOUN_PORT")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "SOUN_BIND")]
    bind: std::net::IpAddr,

    /// Postgres connection string (overrides DATABASE_URL and the config file)
    #[arg(long)]
    database_url: Option<String>,

    /// Folder holding uploads (overrides SOUN_DATA_FOLDER and the config file)
    #[arg(long)]
    data_folder: Option<PathBuf>,

    /// Write a config file with default values to the config path and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| CompiledDefaults::for_current_platform().config_file);

    if args.init_config {
        return init_config(&config_path, &args);
    }

    let toml_config = load_toml_config(&config_path);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting soun-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Config file: {}", config_path.display());

    let database_url = resolve_database_url(args.database_url.as_deref(), &toml_config)?;
    let pool = init_database(&database_url, &toml_config.database)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let data_folder = DataFolderResolver::new()
        .with_cli_arg(args.data_folder.clone())
        .with_toml(&toml_config)
        .resolve();
    let initializer = DataFolderInitializer::new(data_folder);
    initializer.ensure_directories_exist()?;
    info!("Data folder: {}", initializer.data_folder().display());

    housekeeping(&pool).await;

    let api_key = resolve_openai_api_key(&pool, &toml_config).await?;
    let llm = build_language_model(api_key, &toml_config.llm);

    let state = AppState::new(pool, llm, initializer.uploads_path())
        .with_max_upload_bytes(toml_config.uploads.max_bytes)
        .with_db_retry_attempts(toml_config.database.retry_attempts);

    let sweeper = state.flashcard_sessions.clone().spawn_sweeper(DEFAULT_SWEEP_INTERVAL);
    let app = build_router(state);

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("soun-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Write a starter config file, refusing to overwrite an existing one
fn init_config(path: &std::path::Path, args: &Args) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists: {}", path.display());
    }

    let config = TomlConfig {
        data_folder: Some(
            args.data_folder
                .clone()
                .unwrap_or_else(|| CompiledDefaults::for_current_platform().data_folder),
        ),
        database_url: args.database_url.clone(),
        ..TomlConfig::default()
    };

    write_toml_config(&config, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Expire old tokens and abandon quiz sessions left running
async fn housekeeping(pool: &sqlx::PgPool) {
    match tokens::purge_expired(pool).await {
        Ok(0) => {}
        Ok(n) => info!(removed = n, "Purged expired auth tokens"),
        Err(e) => warn!(error = %e, "Failed to purge expired auth tokens"),
    }

    let hours = match settings::get_setting_or(pool, "quiz_stale_session_hours", DEFAULT_STALE_SESSION_HOURS).await {
        Ok(hours) => hours,
        Err(e) => {
            warn!(error = %e, "Failed to read quiz_stale_session_hours, using default");
            DEFAULT_STALE_SESSION_HOURS
        }
    };

    match quizzes::abandon_stale_sessions(pool, hours).await {
        Ok(0) => {}
        Ok(n) => info!(abandoned = n, hours, "Abandoned stale quiz sessions"),
        Err(e) => warn!(error = %e, "Failed to abandon stale quiz sessions"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
