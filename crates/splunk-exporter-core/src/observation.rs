//! Descriptors, observations and the per-poll accounting that travels with
//! them.

use std::sync::Arc;

use crate::error::ExporterError;

/// Immutable declaration of an exported metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Fully-qualified Prometheus name.
    pub name: String,
    pub help: String,
    /// Label names, in the order observations must supply values.
    pub label_names: Vec<String>,
}

impl MetricDescriptor {
    pub fn new(name: impl Into<String>, help: impl Into<String>, label_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            label_names,
        }
    }
}

/// One scalar measurement against a descriptor.
#[derive(Debug, Clone)]
pub struct Observation {
    pub descriptor: Arc<MetricDescriptor>,
    pub value: f64,
    pub label_values: Vec<String>,
}

impl Observation {
    /// Build an observation, refusing label value lists that do not line up
    /// with the descriptor.
    pub fn new(
        descriptor: Arc<MetricDescriptor>,
        value: f64,
        label_values: Vec<String>,
    ) -> Result<Self, ExporterError> {
        if label_values.len() != descriptor.label_names.len() {
            return Err(ExporterError::LabelCount {
                metric: descriptor.name.clone(),
                expected: descriptor.label_names.len(),
                got: label_values.len(),
            });
        }
        Ok(Self {
            descriptor,
            value,
            label_values,
        })
    }

    /// Label value by label name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.descriptor
            .label_names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// Counts folded through a walk or a poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub emitted: usize,
    pub errors: usize,
}

impl WalkReport {
    pub fn success(&self) -> bool {
        self.errors == 0
    }

    pub fn merge(&mut self, other: WalkReport) {
        self.emitted += other.emitted;
        self.errors += other.errors;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }
}

/// Observations gathered by one manager during one poll.
#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    pub observations: Vec<Observation>,
    pub report: WalkReport,
}

impl PollOutcome {
    pub fn success(&self) -> bool {
        self.report.success()
    }

    /// Record an observation and count it as emitted.
    pub fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
        self.report.emitted += 1;
    }

    pub fn extend(&mut self, other: PollOutcome) {
        self.observations.extend(other.observations);
        self.report.merge(other.report);
    }

    /// An outcome that only records a failure.
    pub fn failed() -> Self {
        Self {
            observations: Vec::new(),
            report: WalkReport { emitted: 0, errors: 1 },
        }
    }
}
