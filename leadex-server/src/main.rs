//! # Leadex Server
//!
//! Lead-distribution service.
//!
//! ## Overview
//!
//! Leadex accepts inbound sales leads from a conversational intake channel,
//! invites every available agent to claim each one, and guarantees that
//! exactly one agent wins even when claims race, including races against
//! the expiry sweeper that closes out unclaimed leads.
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL for persistent storage; the conditional update on the lead
//!   row is the single synchronization point for claim resolution
//! - An external send API for claim-invitation fanout
//! - A periodic sweeper that expires leads past their deadline

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leadex_core::sweeper::ExpirySweeper;
use leadex_server::{AppState, Config, routes};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "leadex-server")]
#[command(about = "Distributes inbound sales leads to agents with first-responder-wins claims")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Bind host override
    #[arg(long)]
    host: Option<String>,

    /// Bind port override
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve(ServeArgs),
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,sqlx=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Some(Command::Migrate) => migrate(&config).await,
        Some(Command::Serve(args)) => {
            apply_overrides(&mut config, &args);
            serve(config).await
        }
        None => {
            apply_overrides(&mut config, &cli.serve);
            serve(config).await
        }
    }
}

fn apply_overrides(config: &mut Config, args: &ServeArgs) {
    if let Some(host) = &args.host {
        config.server_host = host.clone();
    }
    if let Some(port) = args.port {
        config.server_port = port;
    }
}

async fn connect(config: &Config) -> anyhow::Result<sqlx::PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;

    PgPoolOptions::new()
        .max_connections(16)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn migrate(config: &Config) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .context("migration failed")?;
    info!("migrations applied");
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = connect(&config).await?;
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .context("migration failed")?;

    let config = Arc::new(config);
    let state = AppState::with_postgres(pool, config.clone())?;

    // The sweeper converts lapsed deadlines into terminal state. It shares
    // the conditional-transition primitive with the claim resolver, so it is
    // safe alongside any number of concurrent claims (and other instances).
    let escalation = state.escalation_sink()?;
    let sweeper = Arc::new(ExpirySweeper::new(
        state.leads.clone(),
        escalation,
        &config.distribution.claim,
    ));
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let sweeper_task = tokio::spawn(sweeper.run(shutdown_rx));

    let app = routes::create_router(state);
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("leadex-server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(()).await;
    let _ = sweeper_task.await;
    info!("leadex-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install ctrl-c handler: {e}");
    }
}
