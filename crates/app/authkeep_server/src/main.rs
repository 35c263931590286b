//! Authkeep REST API server binary.
//!
//! Connects to PostgreSQL, runs migrations, starts the token purge task and
//! serves the API until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use authkeep_api::config::ApiConfig;
use authkeep_core::auth::service::AuthService;
use authkeep_core::purge::spawn_purge_task;
use authkeep_core::store::Stores;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,authkeep_api=debug,authkeep_core=debug";

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "authkeep_server", about = "Authkeep REST API server")]
struct Args {
    /// Host to bind. Overrides the host part of `BIND_ADDR`.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (0 = ephemeral). Overrides the port part of `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/authkeep"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Seconds between expired-token purges.
    #[arg(long, default_value_t = 300)]
    purge_interval_secs: u64,
}

fn bind_addr(configured: &str, host: Option<String>, port: Option<u16>) -> String {
    let (default_host, default_port) = configured
        .rsplit_once(':')
        .unwrap_or((configured, "3100"));
    let host = host.unwrap_or_else(|| default_host.to_string());
    let port = port.map_or_else(|| default_port.to_string(), |p| p.to_string());
    format!("{host}:{port}")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.bind_addr = bind_addr(&config.bind_addr, args.host, args.port);
    config.pg_connection_url = args.database_url;

    info!(
        max_connections = args.max_connections,
        "configuring connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    authkeep_api::migrate(&pool).await?;

    let mailer = config.mail.build_mailer()?;
    let stores = Stores::postgres(pool, &config.auth);
    let auth = Arc::new(AuthService::new(config.auth.clone(), stores, mailer));

    let shutdown = CancellationToken::new();
    let purge = spawn_purge_task(
        auth.clone(),
        Duration::from_secs(args.purge_interval_secs.max(1)),
        shutdown.clone(),
    );

    let state = authkeep_api::AppState { auth };
    let app = authkeep_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutting down");
            shutdown.cancel();
        }
    });

    let api_result = axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await;

    // The purge task stops with the server.
    shutdown.cancel();
    let _ = purge.await;

    api_result?;

    Ok(())
}
