//! HTTP API server for teamsgate.

mod routes;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use log::{info, warn};

use teamsgate_core::{
    APP_NAME, AppConfig, AppPaths, GraphClient, LoggingConfig, generate_example_config,
    generate_schema,
};

use crate::routes::AppState;

/// Repository URL used as the schema `$id`.
const REPO_URL: &str = "https://github.com/byteowlz/teamsgate";

fn main() -> anyhow::Result<()> {
    try_main()
}

#[tokio::main]
async fn try_main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_schema {
        println!("{}", generate_schema(APP_NAME, REPO_URL)?);
        return Ok(());
    }
    if cli.print_config {
        print!("{}", generate_example_config(APP_NAME)?);
        return Ok(());
    }

    let paths = AppPaths::discover(cli.common.config.as_deref())?;
    let mut config = AppConfig::load(&paths)?;
    if let Some(port) = cli.common.port {
        config.server.port = port;
    }
    if let Some(bind) = cli.common.bind {
        config.server.bind = bind;
    }

    init_logging(&config.logging)?;
    info!("using {paths}");
    if !paths.config_file.exists() {
        info!("no config file found, using defaults and environment");
    }

    let graph = GraphClient::from_config(&config)?;
    if let Err(e) = graph.warm_up().await {
        warn!("could not fetch initial Teams token, will retry on first request: {e}");
    }

    let state = AppState {
        graph: Arc::new(graph),
    };
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind((config.server.bind.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "binding {}:{}",
                config.server.bind, config.server.port
            )
        })?;
    info!("Starting API server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Bridges internal services to Microsoft Teams")]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,

    /// Print the JSON schema for the config file and exit
    #[arg(long)]
    print_schema: bool,

    /// Print an example config file and exit
    #[arg(long, conflicts_with = "print_schema")]
    print_config: bool,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", env = "TEAMSGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind to (overrides server.bind)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

/// Set up `env_logger` from the config. `RUST_LOG` wins over `logging.level`.
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or(logging.level.to_string());
    let mut builder = env_logger::Builder::from_env(env);

    if let Some(ref file) = logging.file {
        let target = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .with_context(|| format!("opening log file {file}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(target)));
    }

    builder.init();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("shutdown signal received");
}
