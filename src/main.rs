mod config;
mod error;
mod metrics;
mod models;
mod routes;
mod services;

use crate::config::Config;
use crate::metrics::MetricCatalog;
use crate::routes::{health_check_route, metrics_route};
use crate::services::helpers::consul_helper::ConsulClient;
use crate::services::helpers::docker_helper::DockerSource;
use crate::services::registration::{build_registration, RegistrationAgent};
use crate::services::scrape_loop::ScrapeLoop;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use warp::Filter;

/// Entry point for the exporter.
///
/// Startup runs in a fixed order and any failure aborts the process:
/// - connect to the docker daemon,
/// - bind the HTTP listener for `/health` and `/metrics`,
/// - register the service in Consul (unless `--no-register`),
/// - start serving,
/// - run the scrape loop until listing containers fails.
///
/// # Example
///
/// ```sh
/// docker-metrics-exporter --server-addr :8000 --consul-address 127.0.0.1:8500
///
/// curl http://127.0.0.1:8000/health
/// curl http://127.0.0.1:8000/metrics
/// ```
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::parse();
    init_tracing(config.debug);

    info!("Starting docker-metrics-exporter v{}", env!("CARGO_PKG_VERSION"));

    let source = DockerSource::connect().context("Failed to connect to Docker")?;
    let catalog = Arc::new(MetricCatalog::new().context("Failed to build metric catalog")?);

    let listen_addr = config.listen_addr()?;
    let routes = health_check_route().or(metrics_route(catalog.clone()));
    let (addr, server) = warp::serve(routes)
        .try_bind_ephemeral(listen_addr)
        .with_context(|| format!("HTTP Server Listen failed on {}", listen_addr))?;

    if config.register_enabled() {
        let client =
            ConsulClient::new(config.consul_config()).context("Init Consul client error")?;
        let registration = build_registration(&config.registration_settings());
        RegistrationAgent::new(client, config.retry_policy())
            .register(&registration)
            .await
            .context("Register Consul service error")?;
    } else {
        info!("Consul registration disabled");
    }

    info!("Serving metrics on http://{}/metrics", addr);
    tokio::spawn(server);

    ScrapeLoop::new(Arc::new(source), catalog, config.scrape_interval())
        .run()
        .await
        .context("Scrape loop stopped")?;

    Ok(())
}

/// `RUST_LOG` wins when set; otherwise debug or info depending on `--debug`.
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
