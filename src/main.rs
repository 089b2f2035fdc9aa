//! API Rotation
//!
//! Serves the credential status report, Prometheus metrics, and admin
//! operations for the rotation pools loaded from the environment.

use anyhow::Result;
use api_rotation::{
    config::{Environment, ProviderCatalog, Settings},
    logging::init_tracing,
    server::{App, AppState},
};
use clap::Parser;

/// API Rotation
///
/// Round-robin rotation of provider API keys with health tracking.
#[derive(Parser, Debug)]
#[command(name = "api-rotation")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides PORT env var)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST env var)
    #[arg(long)]
    host: Option<String>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Environment: dev, staging, prod (overrides ENVIRONMENT env var)
    #[arg(short, long)]
    env: Option<Environment>,

    /// Print the status report as JSON and exit
    #[arg(long)]
    print_status: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(env) = args.env {
        settings.environment = env;
    }

    init_tracing(&settings.log_level, settings.log_format);
    for warning in settings.warnings() {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        host = %settings.host,
        port = %settings.port,
        "Starting application"
    );

    let catalog = ProviderCatalog::from_env();
    let state = AppState::from_catalog(settings, catalog)?;

    if args.print_status {
        let report = state.manager.status_report();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    App::new(state).run_with_graceful_shutdown().await?;

    tracing::info!("Application shutdown complete");

    Ok(())
}
