//! Deployment health tree (`server/health/deployment/details`).
//!
//! Nodes are plain JSON mappings where a few reserved keys carry node
//! metadata and every other mapping-valued key is a child. The mapping is
//! classified once when decoded, so the walk itself is plain recursion.
//!
//! Per-instance measurements hang below a container node:
//! `/splunkd/resource_usage/iowait/sum_top3_cpu_percs__max_last_3m/instances/<id>`.
//! The container is never measured; each instance is measured under the
//! container's parent path with the id as a separate label.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::health::{display_path, health_to_value};
use crate::observation::{MetricDescriptor, Observation, PollOutcome};

const ACL_KEY: &str = "eai:acl";
const INSTANCES_SEGMENT: &str = "instances";

/// A key that is neither node metadata nor a child subtree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Anomaly {
    #[error("unrecognized key {key:?}: {reason}")]
    UnrecognizedKey { key: String, reason: String },
}

/// Node-local metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeStatus {
    pub health: Option<String>,
    /// Informational only.
    pub num_red: Option<f64>,
    /// Informational only.
    pub num_yellow: Option<f64>,
    pub disabled: bool,
}

/// A classified deployment health node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct DeploymentNode {
    pub status: NodeStatus,
    pub children: BTreeMap<String, DeploymentNode>,
    pub anomalies: Vec<Anomaly>,
}

impl From<Map<String, Value>> for DeploymentNode {
    fn from(map: Map<String, Value>) -> Self {
        let mut node = DeploymentNode::default();
        for (key, value) in map {
            node.classify(key, value);
        }
        node
    }
}

impl DeploymentNode {
    fn classify(&mut self, key: String, value: Value) {
        match key.as_str() {
            ACL_KEY => {}
            "health" => match value {
                Value::String(s) => self.status.health = Some(s),
                _ => self.unrecognized(key, "a string"),
            },
            "num_red" => match value.as_f64() {
                Some(n) => self.status.num_red = Some(n),
                None => self.unrecognized(key, "a number"),
            },
            "num_yellow" => match value.as_f64() {
                Some(n) => self.status.num_yellow = Some(n),
                None => self.unrecognized(key, "a number"),
            },
            "disabled" => match value {
                Value::Bool(b) => self.status.disabled = b,
                _ => self.unrecognized(key, "a boolean"),
            },
            _ => match value {
                Value::Object(child) => {
                    self.children.insert(key, DeploymentNode::from(child));
                }
                _ => self.unrecognized(key, "a mapping"),
            },
        }
    }

    fn unrecognized(&mut self, key: String, expected: &str) {
        self.anomalies.push(Anomaly::UnrecognizedKey {
            key,
            reason: format!("expected {expected}"),
        });
    }

    /// Whether this node carries no measurement of its own.
    fn is_unmeasured(&self, path: &str) -> bool {
        self.status.disabled
            || self.status.health.as_deref().map_or(true, str::is_empty)
            || path.ends_with(&format!("/{INSTANCES_SEGMENT}"))
    }
}

/// Split `<base>/instances/<id>` into `(<base>, <id>)`; other paths have no
/// instance id.
fn split_instance(path: &str) -> (&str, &str) {
    if let Some((parent, id)) = path.rsplit_once('/') {
        if let Some(base) = parent.strip_suffix(&format!("/{INSTANCES_SEGMENT}")) {
            return (base, id);
        }
    }
    (path, "")
}

/// Flatten a deployment health tree into observations against
/// `descriptor`, labelled `[name, instance_id]`.
///
/// Unrecognized keys are logged and ignored. An unknown health state is
/// measured as `0.0` and counted as an error.
pub fn walk_deployment_health(
    root: &DeploymentNode,
    descriptor: &Arc<MetricDescriptor>,
) -> PollOutcome {
    let mut out = PollOutcome::default();
    visit(root, "", descriptor, &mut out);
    out
}

fn visit(node: &DeploymentNode, path: &str, descriptor: &Arc<MetricDescriptor>, out: &mut PollOutcome) {
    tracing::trace!(path = display_path(path), "visiting deployment health node");

    for anomaly in &node.anomalies {
        tracing::warn!(path = display_path(path), %anomaly, "ignoring deployment health key");
    }
    tracing::trace!(
        path = display_path(path),
        num_red = ?node.status.num_red,
        num_yellow = ?node.status.num_yellow,
        "deployment health counters"
    );

    if !node.is_unmeasured(path) {
        let health = node.status.health.as_deref().unwrap_or_default();
        let value = health_to_value(health).unwrap_or_else(|e| {
            tracing::error!(path = display_path(path), error = %e, "cannot measure deployment health");
            out.report.record_error();
            0.0
        });

        let (base, instance_id) = split_instance(path);
        let labels = vec![display_path(base).to_string(), instance_id.to_string()];
        match Observation::new(descriptor.clone(), value, labels) {
            Ok(obs) => out.push(obs),
            Err(e) => {
                tracing::error!(path = display_path(path), error = %e, "dropping deployment health observation");
                out.report.record_error();
            }
        }
    }

    for (key, child) in &node.children {
        visit(child, &format!("{path}/{key}"), descriptor, out);
    }
}
