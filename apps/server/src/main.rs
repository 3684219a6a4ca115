use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use matchmaker_backend_runtime::{telemetry, BackendServices};
use matchmaker_config::{load as load_config, AppConfig};
use matchmaker_gateway::{build_router, GatewayState, RateLimiter};
use matchmaker_matching::PriorityService;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "matchmaker-backend")]
#[command(about = "Matchmaker backend (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Recompute and store priority scores for every candidate
    RecalculatePriorities,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::RecalculatePriorities => recalculate_priorities(config).await,
    }
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    info!("starting Matchmaker backend");

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::new(
        services.db_pool.clone(),
        &config,
        services.dispatcher.clone(),
        services.completion.clone(),
        RateLimiter::with_redis(services.redis_conn.clone()),
    );
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(matchmaker_backend_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn recalculate_priorities(config: AppConfig) -> anyhow::Result<()> {
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let counts = PriorityService::new(services.db_pool.clone())
        .update_all_in_db()
        .await
        .context("failed to recalculate priorities")?;

    println!("Priority scores updated: {} ok, {} failed", counts.updated, counts.failed);
    Ok(())
}
