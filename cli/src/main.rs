//! splunk_exporter: expose Splunk metrics and health as Prometheus gauges.
//!
//! # Usage
//! ```text
//! splunk_exporter --config.file splunk_exporter.yml --web.listen-address 0.0.0.0:9115
//! splunk_exporter --config.file splunk_exporter.yml --config.check
//! ```
//!
//! Send `SIGHUP` or `POST /-/reload` to re-read the configuration file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use splunk_exporter_core::{Config, ConfigCell, SplunkTransport, TransportError};
use splunk_exporter_http::HttpSplunkClient;
use splunk_exporter_observability::{init_tracing, LogConfig, LogFormat};

mod server;

use server::Exporter;

#[derive(Parser)]
#[command(
    name = "splunk_exporter",
    about = "Prometheus exporter for Splunk metrics indexes and health endpoints",
    version
)]
struct Cli {
    /// Splunk exporter configuration file
    #[arg(long = "config.file", default_value = "splunk_exporter.yml")]
    config_file: PathBuf,

    /// Validate the configuration file and exit
    #[arg(long = "config.check")]
    config_check: bool,

    /// Address to listen on for the web interface and telemetry
    #[arg(long = "web.listen-address", default_value = "0.0.0.0:9115")]
    web_listen_address: String,

    /// The URL under which the exporter is externally reachable, e.g. behind
    /// a reverse proxy. Derived from the hostname and listen port if omitted
    #[arg(long = "web.external-url", value_name = "URL")]
    web_external_url: Option<String>,

    /// Prefix for the internal routes of web endpoints. Defaults to the path
    /// of --web.external-url
    #[arg(long = "web.route-prefix", value_name = "PATH")]
    web_route_prefix: Option<String>,

    /// Only log messages with the given severity or above: debug, info, warn, error
    #[arg(long = "log.level", default_value = "info")]
    log_level: String,

    /// Output format of log messages: logfmt or json
    #[arg(long = "log.format", default_value_t = LogFormat::Logfmt)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        format: cli.log_format,
        ..Default::default()
    })
    .map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting splunk_exporter");

    if cli.config_check {
        Config::from_file(&cli.config_file)
            .with_context(|| format!("error loading config file {}", cli.config_file.display()))?;
        tracing::info!(path = %cli.config_file.display(), "config file is ok, exiting");
        return Ok(());
    }

    let config = ConfigCell::load(&cli.config_file)
        .with_context(|| format!("error loading config file {}", cli.config_file.display()))?;
    tracing::info!(path = %cli.config_file.display(), "loaded config file");

    let exporter = Arc::new(
        Exporter::new(cli.config_file.clone(), config, Box::new(connect)).context("could not create exporter")?,
    );

    reload_on_hangup(exporter.clone());

    let external_url = server::external_url(cli.web_external_url.as_deref(), &cli.web_listen_address)
        .context("failed to determine external URL")?;
    tracing::debug!(external_url = %external_url, "computed external URL");
    let route_prefix = cli
        .web_route_prefix
        .clone()
        .unwrap_or_else(|| external_url.path().to_string());

    let app = server::router(exporter, &route_prefix, &external_url);
    let listener = tokio::net::TcpListener::bind(&cli.web_listen_address)
        .await
        .with_context(|| format!("failed to bind {}", cli.web_listen_address))?;
    tracing::info!(
        address = %cli.web_listen_address,
        route_prefix = %route_prefix,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("shut down");
    Ok(())
}

fn connect(config: &Config) -> Result<Arc<dyn SplunkTransport>, TransportError> {
    Ok(Arc::new(HttpSplunkClient::from_config(config)?))
}

#[cfg(unix)]
fn reload_on_hangup(exporter: Arc<Exporter>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hup = match signal(SignalKind::hangup()) {
            Ok(hup) => hup,
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGHUP");
                return;
            }
        };
        while hup.recv().await.is_some() {
            if let Err(e) = exporter.reload() {
                let message = format!("{e:#}");
                tracing::error!(error = %message, "error reloading config");
            }
        }
    });
}

#[cfg(not(unix))]
fn reload_on_hangup(_exporter: Arc<Exporter>) {}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for interrupt");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("received termination signal, exiting gracefully");
}
