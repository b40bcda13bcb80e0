//! Waypoint server binary.
//!
//! Loads a TOML config, mounts the configured static directories behind a
//! header-stamping middleware and a health route, and serves until SIGINT/SIGTERM.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use waypoint::config::{self, ServerConfig};
use waypoint::lifecycle::{signals, Shutdown};
use waypoint::observability::{self, metrics};
use waypoint::{HttpServer, RouteError, Router};

#[derive(Debug, Parser)]
#[command(name = "waypoint", version, about = "Ordered HTTP router and static file server")]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

fn build_router(config: &ServerConfig) -> Result<Router, RouteError> {
    let mut router = Router::with_pool_size(config.pool.max_idle);
    router
        .middleware(|ctx| {
            ctx.set("server", concat!("waypoint/", env!("CARGO_PKG_VERSION")));
            ctx.next();
        })?
        .get("/health", |ctx| {
            if let Err(e) = ctx.json(&serde_json::json!({ "status": "ok" })) {
                tracing::error!(error = %e, "Failed to encode health response");
            }
        })?;

    for mount in &config.static_files {
        router.serve_dir(&mount.mount, &mount.dir)?;
    }
    Ok(router)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
    }

    observability::init_logging(&config.observability)?;
    tracing::info!("waypoint v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_in_flight = config.listener.max_in_flight,
        request_timeout_secs = config.timeouts.request_secs,
        static_mounts = config.static_files.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let router = build_router(&config)?;
    tracing::info!(routes = router.len(), "Route table built");

    // Bind last: traffic only once the route table is complete.
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    signals::spawn_listener(shutdown);

    HttpServer::new(config, router).run(listener, signal).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
