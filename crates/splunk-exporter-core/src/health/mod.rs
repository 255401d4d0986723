//! Health tree flattening.
//!
//! Splunk exposes two nested health trees:
//!
//! - [`feature`]: `server/health/splunkd/details`, a uniform tree where
//!   every node has `health`, `disabled` and `features`;
//! - [`deployment`]: `server/health/deployment/details`, where node
//!   metadata and child subtrees share one mapping.
//!
//! Both are flattened into one observation per measured node, labelled with
//! the node's `/`-joined path. Health states map to `green → 1.0`,
//! `yellow → 0.5`, `red → 0.0`.

pub mod deployment;
pub mod feature;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{DecodeError, HealthError};

pub use deployment::{walk_deployment_health, Anomaly, DeploymentNode, NodeStatus};
pub use feature::{walk_feature_health, FeatureHealth};

/// Numeric value of a health state.
pub fn health_to_value(health: &str) -> Result<f64, HealthError> {
    match health {
        "green" => Ok(1.0),
        "yellow" => Ok(0.5),
        "red" => Ok(0.0),
        other => Err(HealthError::UnknownHealthValue(other.to_string())),
    }
}

/// Path label of a node; the root's empty path shows as `/`.
pub(crate) fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

#[derive(Debug, Deserialize)]
struct RestEntries<T> {
    #[serde(default = "Vec::new")]
    entry: Vec<RestEntry<T>>,
}

#[derive(Debug, Deserialize)]
struct RestEntry<T> {
    content: T,
}

/// Decode the `content` of the first entry of a Splunk REST response.
pub fn decode_entry_content<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    let entries: RestEntries<T> = serde_json::from_str(raw)?;
    entries
        .entry
        .into_iter()
        .next()
        .map(|e| e.content)
        .ok_or(DecodeError::MissingEntry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_scale() {
        assert_eq!(health_to_value("green").unwrap(), 1.0);
        assert_eq!(health_to_value("yellow").unwrap(), 0.5);
        assert_eq!(health_to_value("red").unwrap(), 0.0);
        assert!(matches!(
            health_to_value("purple"),
            Err(HealthError::UnknownHealthValue(v)) if v == "purple"
        ));
        assert!(health_to_value("Green").is_err());
    }

    #[test]
    fn root_path_display() {
        assert_eq!(display_path(""), "/");
        assert_eq!(display_path("/a/b"), "/a/b");
    }

    #[test]
    fn entry_content_decoding() {
        let raw = r#"{"entry": [{"name": "details", "content": {"health": "green"}}]}"#;
        let content: FeatureHealth = decode_entry_content(raw).unwrap();
        assert_eq!(content.health, "green");

        let err = decode_entry_content::<FeatureHealth>(r#"{"entry": []}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingEntry));
    }
}
