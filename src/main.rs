//! Guardian - In-Process Privacy Mediation
//!
//! Serves the admin surface with every other route mediated, and offers
//! offline ledger verification and report generation from the CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};
use guardian::{
    adapter::{mediate, MediationState},
    admin::admin_router,
    config::GuardianConfig,
    inspector::Inspector,
    ledger::Ledger,
    service::GuardianService,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "guardian")]
#[command(version)]
#[command(about = "In-process privacy mediation with an auditable ledger")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GUARDIAN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the guardian server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Verify a user's ledger chain
    Verify {
        /// User whose ledger to check
        user: String,
    },

    /// Generate a trust report for a user
    Report {
        /// User to report on
        user: String,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("guardian={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &cli.config {
        Some(path) => GuardianConfig::load(path)?,
        None => {
            let mut config = GuardianConfig::default();
            config.apply_env_overrides();
            config
        }
    };

    match cli.command {
        Commands::Serve { host, port } => {
            run_serve(config, host, port).await?;
        }
        Commands::Verify { user } => {
            run_verify(&config, &user).await?;
        }
        Commands::Report { user } => {
            run_report(&config, &user).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

async fn run_serve(
    config: GuardianConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let service = GuardianService::new(&config).await?;
    let state = MediationState::new(service.clone(), config.mediation.skip_paths.clone());

    let app = admin_router(service)
        .route("/health", axum::routing::get(|| async { "ok" }))
        .layer(axum::middleware::from_fn_with_state(state, mediate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", host, port);
    tracing::info!("Guardian listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}

async fn run_verify(config: &GuardianConfig, user: &str) -> Result<()> {
    let ledger = Ledger::new(&config.storage.ledger_dir);
    let report = ledger.verify(user).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_report(config: &GuardianConfig, user: &str) -> Result<()> {
    let ledger = Arc::new(Ledger::new(&config.storage.ledger_dir));
    let inspector = Inspector::new(ledger, &config.storage.reports_dir);
    let report = inspector.trust_report(user).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn show_config(config: Option<&GuardianConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
