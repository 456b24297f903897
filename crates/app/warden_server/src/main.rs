//! Warden API server binary.
//!
//! Loads configuration from the environment (and `.env`), runs migrations,
//! optionally seeds a demo user and serves the session routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use warden_api::AppState;
use warden_api::config::ApiConfig;
use warden_core::auth::seed::seed_user;
use warden_core::geofence::IpApiClient;
use warden_core::store::PgSessionStore;

/// CLI arguments for the API server. Unset values fall back to the
/// environment configuration.
#[derive(Parser, Debug)]
#[command(name = "warden_server", about = "Warden session API server")]
struct Args {
    /// Address to listen on, e.g. `0.0.0.0:3000`.
    #[arg(long)]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Create the demo user at startup if it does not exist.
    #[arg(long, default_value_t = false)]
    seed_user: bool,

    #[arg(long, env = "SEED_USERNAME", default_value = "demo")]
    seed_username: String,

    #[arg(long, env = "SEED_PASSWORD", default_value = "password")]
    seed_password: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warden_api=debug,warden_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(database_url) = args.database_url {
        config.pg_connection_url = database_url;
    }

    info!(
        bind_addr = %config.bind_addr,
        max_connections = args.max_connections,
        "starting warden_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    warden_core::migrate::migrate(&pool).await?;

    let store = Arc::new(PgSessionStore::new(pool));

    if args.seed_user {
        seed_user(store.as_ref(), &args.seed_username, &args.seed_password).await?;
        warn!(username = %args.seed_username, "demo user seeding is enabled");
    }

    let lookup = Arc::new(IpApiClient::new(&config.ip_lookup_url)?);
    let state = AppState::new(config.clone(), store, lookup)?;
    let app = warden_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
