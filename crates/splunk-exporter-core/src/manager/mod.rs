//! Per-poll orchestration.
//!
//! ```text
//! config snapshot → query → transport → decode → labels | tree walk → observations
//! ```

pub mod health;
pub mod metrics;

pub use health::HealthManager;
pub use metrics::MetricsManager;

use crate::config::MetricSpec;
use crate::observation::{Observation, WalkReport};
use crate::transport::SplunkTransport;

/// Prometheus namespace of every exported metric.
pub const NAMESPACE: &str = "splunk_exporter";

/// Everything one scrape produced.
#[derive(Debug, Clone, Default)]
pub struct Scrape {
    pub observations: Vec<Observation>,
    pub report: WalkReport,
    /// `true` only if every configured fetch succeeded.
    pub up: bool,
}

/// Runs the metrics and health managers side by side.
pub struct Collector {
    metrics: MetricsManager,
    health: HealthManager,
}

impl Collector {
    pub fn new(namespace: &str) -> Self {
        Self {
            metrics: MetricsManager::new(namespace),
            health: HealthManager::new(namespace),
        }
    }

    pub fn metrics(&self) -> &MetricsManager {
        &self.metrics
    }

    pub fn health(&self) -> &HealthManager {
        &self.health
    }

    /// Poll Splunk once.
    pub async fn collect(&self, transport: &dyn SplunkTransport, specs: &[MetricSpec]) -> Scrape {
        let (mut outcome, health) = futures::join!(
            self.metrics.collect(transport, specs),
            self.health.collect(transport)
        );
        outcome.extend(health);

        let up = outcome.success();
        if !up {
            tracing::warn!(
                errors = outcome.report.errors,
                url = transport.url(),
                "scrape completed with errors"
            );
        }
        Scrape {
            observations: outcome.observations,
            report: outcome.report,
            up,
        }
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(NAMESPACE)
    }
}
