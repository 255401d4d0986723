//! Prometheus text exposition of one scrape.
//!
//! Every scrape renders into a fresh [`Registry`]: observations are grouped
//! by descriptor into one `GaugeVec` each, so series that disappear from
//! Splunk disappear from the output too.

use std::collections::HashMap;
use std::sync::Arc;

use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use splunk_exporter_core::config::ReloadStatus;
use splunk_exporter_core::normalize::fq_name;
use splunk_exporter_core::observation::MetricDescriptor;
use splunk_exporter_core::Scrape;

/// `Content-Type` of the rendered text.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Error)]
pub enum ExpositionError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("exposition is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Render `scrape` plus the exporter's own gauges under `namespace`.
///
/// A descriptor Prometheus refuses (invalid label name) is logged and left
/// out; the rest of the scrape is still rendered. A second descriptor
/// claiming a name already rendered is refused too, and `up` reports 0.
pub fn render(scrape: &Scrape, reload: ReloadStatus, namespace: &str) -> Result<String, ExpositionError> {
    let registry = Registry::new();

    let mut families: HashMap<&str, Family> = HashMap::new();
    let mut refused: Vec<&Arc<MetricDescriptor>> = Vec::new();
    for obs in &scrape.observations {
        let family = families
            .entry(obs.descriptor.name.as_str())
            .or_insert_with(|| Family {
                descriptor: obs.descriptor.clone(),
                vec: register_family(&registry, &obs.descriptor),
            });
        if !Arc::ptr_eq(&family.descriptor, &obs.descriptor) {
            if !refused.iter().any(|d| Arc::ptr_eq(d, &obs.descriptor)) {
                tracing::error!(
                    metric = %obs.descriptor.name,
                    kept = %family.descriptor.help,
                    refused = %obs.descriptor.help,
                    "two descriptors share one metric name"
                );
                refused.push(&obs.descriptor);
            }
            continue;
        }
        if let Some(vec) = &family.vec {
            let values: Vec<&str> = obs.label_values.iter().map(String::as_str).collect();
            match vec.get_metric_with_label_values(&values) {
                Ok(gauge) => gauge.set(obs.value),
                Err(e) => tracing::warn!(metric = %obs.descriptor.name, error = %e, "dropping observation"),
            }
        }
    }

    let up = gauge(
        &registry,
        fq_name(namespace, "", "up"),
        "Was the last query of Splunk successful.",
    )?;
    up.set(if scrape.up && refused.is_empty() { 1.0 } else { 0.0 });

    let reload_ok = gauge(
        &registry,
        fq_name(namespace, "config", "last_reload_successful"),
        "Splunk exporter config loaded successfully.",
    )?;
    reload_ok.set(if reload.successful { 1.0 } else { 0.0 });

    let reload_ts = gauge(
        &registry,
        fq_name(namespace, "config", "last_reload_success_timestamp_seconds"),
        "Timestamp of the last successful configuration reload.",
    )?;
    reload_ts.set(reload.last_success_unix.unwrap_or_default() as f64);

    build_info(&registry, namespace)?;

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

struct Family {
    descriptor: Arc<MetricDescriptor>,
    vec: Option<GaugeVec>,
}

/// Constant 1, labelled with the version and target the binary was built for.
fn build_info(registry: &Registry, namespace: &str) -> Result<(), ExpositionError> {
    let info = GaugeVec::new(
        Opts::new(
            fq_name(namespace, "", "build_info"),
            format!("A metric with a constant '1' value labeled by version, os and arch from which {namespace} was built."),
        ),
        &["version", "os", "arch"],
    )?;
    registry.register(Box::new(info.clone()))?;
    info.with_label_values(&[env!("CARGO_PKG_VERSION"), std::env::consts::OS, std::env::consts::ARCH])
        .set(1.0);
    Ok(())
}

fn register_family(registry: &Registry, descriptor: &Arc<MetricDescriptor>) -> Option<GaugeVec> {
    let labels: Vec<&str> = descriptor.label_names.iter().map(String::as_str).collect();
    let vec = GaugeVec::new(Opts::new(descriptor.name.clone(), descriptor.help.clone()), &labels)
        .and_then(|vec| registry.register(Box::new(vec.clone())).map(|()| vec));
    match vec {
        Ok(vec) => Some(vec),
        Err(e) => {
            tracing::error!(metric = %descriptor.name, error = %e, "cannot expose metric family");
            None
        }
    }
}

fn gauge(registry: &Registry, name: String, help: &str) -> Result<Gauge, ExpositionError> {
    let gauge = Gauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use splunk_exporter_core::{Observation, WalkReport, NAMESPACE};

    fn descriptor(name: &str, labels: &[&str]) -> Arc<MetricDescriptor> {
        Arc::new(MetricDescriptor::new(
            name,
            format!("help for {name}"),
            labels.iter().map(|l| l.to_string()).collect(),
        ))
    }

    fn obs(d: &Arc<MetricDescriptor>, value: f64, labels: &[&str]) -> Observation {
        Observation::new(d.clone(), value, labels.iter().map(|l| l.to_string()).collect()).unwrap()
    }

    fn series(text: &str, name: &str) -> Vec<String> {
        text.lines()
            .filter(|l| l.starts_with(&format!("{name}{{")) || l.starts_with(&format!("{name} ")))
            .map(str::to_string)
            .collect()
    }

    fn value_of(line: &str) -> f64 {
        line.rsplit(' ').next().unwrap().parse().unwrap()
    }

    fn single(text: &str, name: &str) -> f64 {
        let lines = series(text, name);
        assert_eq!(lines.len(), 1, "{name}: {lines:?}");
        value_of(&lines[0])
    }

    #[test]
    fn groups_observations_by_descriptor() {
        let deployment = descriptor("splunk_exporter_health_deployment", &["name", "instance_id"]);
        let scrape = Scrape {
            observations: vec![
                obs(&deployment, 1.0, &["/", ""]),
                obs(&deployment, 0.5, &["/splunkd", "abc-123"]),
            ],
            report: WalkReport::default(),
            up: true,
        };
        let text = render(&scrape, ReloadStatus::default(), NAMESPACE).unwrap();

        assert!(text.contains("# HELP splunk_exporter_health_deployment help for splunk_exporter_health_deployment"));
        assert!(text.contains("# TYPE splunk_exporter_health_deployment gauge"));
        let lines = series(&text, "splunk_exporter_health_deployment");
        assert_eq!(lines.len(), 2);
        let instance = lines.iter().find(|l| l.contains("abc-123")).unwrap();
        assert!(instance.contains(r#"name="/splunkd""#));
        assert!(instance.contains(r#"instance_id="abc-123""#));
        assert_eq!(value_of(instance), 0.5);
    }

    #[test]
    fn label_values_stay_with_their_names() {
        let d = descriptor("splunk_exporter_queue_size", &["component", "data_name", "log_level"]);
        let scrape = Scrape {
            observations: vec![obs(&d, 42.0, &["Metrics", "main", "INFO"])],
            report: WalkReport::default(),
            up: true,
        };
        let text = render(&scrape, ReloadStatus::default(), NAMESPACE).unwrap();
        let line = &series(&text, "splunk_exporter_queue_size")[0];
        assert!(line.contains(r#"component="Metrics""#));
        assert!(line.contains(r#"data_name="main""#));
        assert!(line.contains(r#"log_level="INFO""#));
    }

    #[test]
    fn exporter_gauges_always_present() {
        let scrape = Scrape::default();
        let reload = ReloadStatus {
            successful: true,
            last_success_unix: Some(1_700_000_000),
        };
        let text = render(&scrape, reload, NAMESPACE).unwrap();
        assert_eq!(single(&text, "splunk_exporter_up"), 0.0);
        assert_eq!(single(&text, "splunk_exporter_config_last_reload_successful"), 1.0);
        assert_eq!(
            single(&text, "splunk_exporter_config_last_reload_success_timestamp_seconds"),
            1_700_000_000.0
        );
    }

    #[test]
    fn build_info_carries_the_version() {
        let text = render(&Scrape::default(), ReloadStatus::default(), NAMESPACE).unwrap();
        let line = &series(&text, "splunk_exporter_build_info")[0];
        assert!(line.contains(&format!(r#"version="{}""#, env!("CARGO_PKG_VERSION"))));
        assert_eq!(value_of(line), 1.0);
    }

    #[test]
    fn distinct_descriptors_with_one_name_are_not_merged() {
        let a = Arc::new(MetricDescriptor::new("splunk_exporter_cpu_load", "from index idx_a", vec!["host".into()]));
        let b = Arc::new(MetricDescriptor::new("splunk_exporter_cpu_load", "from index idx_b", vec!["host".into()]));
        let c = Arc::new(MetricDescriptor::new(
            "splunk_exporter_cpu_load",
            "from index idx_c",
            vec!["host".into(), "region".into()],
        ));
        let scrape = Scrape {
            observations: vec![obs(&a, 1.0, &["h1"]), obs(&b, 2.0, &["h1"]), obs(&c, 3.0, &["h1", "eu"])],
            report: WalkReport::default(),
            up: true,
        };
        let text = render(&scrape, ReloadStatus::default(), NAMESPACE).unwrap();

        assert!(text.contains("# HELP splunk_exporter_cpu_load from index idx_a"));
        let lines = series(&text, "splunk_exporter_cpu_load");
        assert_eq!(lines.len(), 1, "{lines:?}");
        assert_eq!(value_of(&lines[0]), 1.0);
        assert_eq!(single(&text, "splunk_exporter_up"), 0.0);
    }

    #[test]
    fn invalid_family_is_skipped() {
        let bad = descriptor("splunk_exporter_bad", &["1st"]);
        let good = descriptor("splunk_exporter_good", &[]);
        let scrape = Scrape {
            observations: vec![obs(&bad, 1.0, &["x"]), obs(&good, 2.0, &[])],
            report: WalkReport::default(),
            up: true,
        };
        let text = render(&scrape, ReloadStatus::default(), NAMESPACE).unwrap();
        assert!(series(&text, "splunk_exporter_bad").is_empty());
        assert_eq!(single(&text, "splunk_exporter_good"), 2.0);
    }
}
