//! Prometheus-safe identifiers.

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
///
/// Applied to metric and label names alike; Prometheus rejects anything else.
pub fn normalize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Join non-empty parts with `_`, like Prometheus client libraries do.
pub fn fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_invalid_chars() {
        assert_eq!(
            normalize("spl.intr.disk_objects.Indexes.data.total_event_count"),
            "spl_intr_disk_objects_Indexes_data_total_event_count"
        );
        assert_eq!(normalize("data.name"), "data_name");
        assert_eq!(normalize("a-b c/d:é"), "a_b_c_d__");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn idempotent_and_alphabet() {
        for input in ["x.y", "héllo wörld", "__ok__", "1.2-3", "ümlaut/€"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
            assert!(once.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }

    #[test]
    fn fq_name_skips_empty_parts() {
        assert_eq!(fq_name("splunk_exporter", "", "up"), "splunk_exporter_up");
        assert_eq!(
            fq_name("splunk_exporter", "health", "splunkd"),
            "splunk_exporter_health_splunkd"
        );
    }
}
