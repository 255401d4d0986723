//! HTTP surface of the exporter.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, bail, Context, Result};
use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use url::Url;

use splunk_exporter_core::{Collector, Config, ConfigCell, Scrape, SplunkTransport, TransportError, NAMESPACE};
use splunk_exporter_observability::{render, CONTENT_TYPE};

/// Builds a transport from connection parameters.
pub type Connector = Box<dyn Fn(&Config) -> Result<Arc<dyn SplunkTransport>, TransportError> + Send + Sync>;

/// A configuration and the transport built from it. Scrapes read both from
/// one snapshot.
pub struct Session {
    pub config: Arc<Config>,
    pub transport: Arc<dyn SplunkTransport>,
}

/// Live exporter state shared by every request.
///
/// The descriptor registry inside `collector` lives as long as the process;
/// only the session is swapped on reload.
pub struct Exporter {
    config_path: PathBuf,
    config: ConfigCell,
    session: RwLock<Arc<Session>>,
    reloads: Mutex<()>,
    connect: Connector,
    collector: Collector,
}

impl Exporter {
    pub fn new(config_path: PathBuf, config: ConfigCell, connect: Connector) -> Result<Self, TransportError> {
        let snapshot = config.snapshot();
        let transport = connect(&snapshot)?;
        tracing::info!(instance = transport.url(), "started exporter");
        Ok(Self {
            config_path,
            config,
            session: RwLock::new(Arc::new(Session {
                config: snapshot,
                transport,
            })),
            reloads: Mutex::new(()),
            connect,
            collector: Collector::new(NAMESPACE),
        })
    }

    pub fn session(&self) -> Arc<Session> {
        self.session.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Poll Splunk with the current session.
    pub async fn scrape(&self) -> Scrape {
        let session = self.session();
        self.collector
            .collect(session.transport.as_ref(), &session.config.metrics)
            .await
    }

    /// Re-read the config file and reconnect with its parameters.
    ///
    /// Nothing is swapped unless both steps succeed. Concurrent reloads run
    /// one at a time.
    pub fn reload(&self) -> Result<()> {
        let _serial = self.reloads.lock().unwrap_or_else(|e| e.into_inner());
        let (config, transport) = match self.prepare() {
            Ok(next) => next,
            Err(e) => {
                self.config.mark_failed();
                return Err(e);
            }
        };
        let config = self.config.commit(config);
        tracing::info!(
            path = %self.config_path.display(),
            instance = transport.url(),
            metrics = config.metrics.len(),
            "reloaded config file"
        );
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(Session { config, transport });
        Ok(())
    }

    fn prepare(&self) -> Result<(Config, Arc<dyn SplunkTransport>)> {
        let config = Config::from_file(&self.config_path)
            .with_context(|| format!("error reloading config file {}", self.config_path.display()))?;
        let transport = (self.connect)(&config).context("error rebuilding splunk client")?;
        Ok((config, transport))
    }

    pub fn config(&self) -> &ConfigCell {
        &self.config
    }
}

/// The URL the exporter is reachable under. Without `--web.external-url` it
/// is derived from the hostname and the listen port. The path never keeps a
/// trailing `/`.
pub fn external_url(flag: Option<&str>, listen_address: &str) -> Result<Url> {
    let raw = match flag {
        Some(url) => url.to_string(),
        None => {
            let host = hostname::get()
                .context("cannot read hostname")?
                .into_string()
                .map_err(|_| anyhow!("hostname is not valid UTF-8"))?;
            let (_, port) = listen_address
                .rsplit_once(':')
                .ok_or_else(|| anyhow!("listen address {listen_address} has no port"))?;
            format!("http://{host}:{port}/")
        }
    };
    if raw.starts_with(['"', '\'']) || raw.ends_with(['"', '\'']) {
        bail!("URL must not begin or end with quotes");
    }
    let mut url = Url::parse(&raw).with_context(|| format!("invalid external URL {raw}"))?;
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    Ok(url)
}

/// All routes, nested under `prefix` unless it is `/`. With a prefix, `/`
/// itself redirects to `external_url`.
pub fn router(exporter: Arc<Exporter>, prefix: &str, external_url: &Url) -> Router {
    let prefix = normalize_prefix(prefix);
    let landing = landing_page(&prefix);

    let routes = Router::new()
        .route("/", get(move || async move { Html(landing) }))
        .route("/metrics", get(metrics))
        .route("/-/healthy", get(|| async { "Healthy" }))
        .route("/-/reload", any(reload))
        .route("/config", get(config))
        .with_state(exporter);

    if prefix == "/" {
        return routes;
    }
    let location = external_url.to_string();
    Router::new()
        .route(
            "/",
            get(move || async move { (StatusCode::FOUND, [(header::LOCATION, location)]) }),
        )
        .nest(&prefix, routes)
}

/// `"metrics/"` → `"/metrics"`, `""` → `"/"`.
fn normalize_prefix(prefix: &str) -> String {
    format!("/{}", prefix.trim_matches('/'))
}

fn landing_page(prefix: &str) -> String {
    let base = prefix.trim_end_matches('/');
    format!(
        r#"<html>
    <head><title>Splunk Exporter</title></head>
    <body>
    <h1>Splunk Exporter</h1>
    <p><a href="{base}/metrics">Metrics</a></p>
    <p><a href="{base}/config">Configuration</a></p>
    </body>
</html>
"#
    )
}

async fn metrics(State(exporter): State<Arc<Exporter>>) -> Response {
    let scrape = exporter.scrape().await;
    match render(&scrape, exporter.config.reload_status(), NAMESPACE) {
        Ok(text) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], text).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to encode metrics: {e}")).into_response()
        }
    }
}

async fn reload(method: Method, State(exporter): State<Arc<Exporter>>) -> Response {
    if method != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, "This endpoint requires a POST request.\n").into_response();
    }
    match exporter.reload() {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(error = %message, "error reloading config");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to reload config: {message}\n")).into_response()
        }
    }
}

async fn config(State(exporter): State<Arc<Exporter>>) -> Response {
    match exporter.session().config.to_yaml() {
        Ok(yaml) => ([(header::CONTENT_TYPE, "text/plain")], yaml).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "error marshalling configuration");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
