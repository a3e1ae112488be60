//! Awesome Web - Main entry point.
//!
//! Opens the connection pool and serves the HTTP front end until SIGINT or
//! SIGTERM.

use awesome_web::config::Config;
use awesome_web::db::Pool;
use awesome_web::server::HttpServer;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

// All operations interleave on one thread and suspend only on I/O.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    info!(
        addr = %config.http_addr(),
        "Starting Awesome Web v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool_config = match config.pool_config() {
        Ok(pool_config) => pool_config,
        Err(e) => {
            error!(error = %e, "Invalid database configuration");
            return Err(e.into());
        }
    };

    let pool = match Pool::initialize(pool_config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, suggestion = ?e.suggestion(), "Failed to create connection pool");
            return Err(e.into());
        }
    };

    let server = HttpServer::new(pool, &config.http_host, config.http_port);
    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
