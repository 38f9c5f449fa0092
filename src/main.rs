//! Fulcrum load balancer.
//!
//! ```text
//!     Client ──▶ listener ──▶ access log ──▶ dispatcher ──▶ ServerPool ──▶ Backend
//!                                                │   ▲                        │
//!                                                │   └── retry on failure ◀───┘
//!                                                ▼
//!                                         503 when exhausted
//!
//!     HealthChecker (background): every interval, TCP-probe each backend
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use fulcrum::config::{load_config, LogFormat};
use fulcrum::lifecycle::signals::wait_for_signal;
use fulcrum::observability::{logging, metrics};
use fulcrum::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "fulcrum", version, about = "Reverse-proxy load balancer")]
struct Cli {
    /// Path to the configuration file (JSON, or TOML with a .toml extension).
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override the configured listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(LogFormat::default());
            tracing::error!(path = ?cli.config, error = %e, "Error loading config");
            return Err(e.into());
        }
    };
    if let Some(port) = cli.port {
        config.lb_port = port;
    }

    logging::init_logging(config.observability.log_format);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "Fulcrum starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.bind_address();
    let server = HttpServer::new(config)?;
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Fulcrum load balancer listening");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
