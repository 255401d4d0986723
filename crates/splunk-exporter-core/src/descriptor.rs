//! Identity-stable descriptor cache.
//!
//! Descriptors are created lazily the first time a metric is polled and live
//! for the rest of the process. Concurrent first lookups of one identity are
//! coalesced on a per-identity [`OnceCell`], so every caller ends up holding
//! the very same `Arc`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::labels::LabelSchema;
use crate::observation::MetricDescriptor;

/// Key of a configured metric: `(index, metric name)`, case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricIdentity {
    pub index: String,
    pub metric: String,
}

impl MetricIdentity {
    pub fn new(index: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            metric: metric.into(),
        }
    }
}

impl std::fmt::Display for MetricIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}&{}", self.index, self.metric)
    }
}

/// Descriptor of a search-backed metric together with the raw dimension
/// names its label values are read from.
#[derive(Debug)]
pub struct MetricEntry {
    pub descriptor: Arc<MetricDescriptor>,
    pub schema: LabelSchema,
}

type Slot = Arc<OnceCell<Arc<MetricEntry>>>;

/// Thread-safe lazily-populated descriptor registry.
#[derive(Clone, Default)]
pub struct DescriptorRegistry {
    slots: Arc<Mutex<HashMap<MetricIdentity, Slot>>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, identity: &MetricIdentity) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(identity.clone()).or_default().clone()
    }

    /// Return the entry for `identity`, running `init` if there is none yet.
    ///
    /// While one caller runs `init`, others for the same identity wait for
    /// it. A failed `init` stores nothing; the next call tries again.
    pub async fn get_or_create<F, Fut, E>(
        &self,
        identity: &MetricIdentity,
        init: F,
    ) -> Result<Arc<MetricEntry>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<MetricEntry, E>>,
    {
        let slot = self.slot(identity);
        let entry = slot
            .get_or_try_init(|| async {
                let entry = init().await?;
                tracing::info!(
                    identity = %identity,
                    name = %entry.descriptor.name,
                    labels = entry.descriptor.label_names.len(),
                    "registered metric descriptor"
                );
                Ok::<_, E>(Arc::new(entry))
            })
            .await?;
        Ok(entry.clone())
    }

    /// Look up an already-created entry.
    pub fn get(&self, identity: &MetricIdentity) -> Option<Arc<MetricEntry>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(identity)?.get().cloned()
    }

    /// Number of identities with a created descriptor.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().filter(|s| s.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn entry(name: &str) -> MetricEntry {
        let schema = LabelSchema::from_dimensions(vec!["host".into()]).unwrap();
        MetricEntry {
            descriptor: Arc::new(MetricDescriptor::new(name, "help", schema.labels.clone())),
            schema,
        }
    }

    #[tokio::test]
    async fn second_lookup_reuses_instance() {
        let reg = DescriptorRegistry::new();
        let id = MetricIdentity::new("_metrics", "cpu");
        let a = reg
            .get_or_create(&id, || async { Ok::<_, ()>(entry("a")) })
            .await
            .unwrap();
        let b = reg
            .get_or_create(&id, || async { Ok::<_, ()>(entry("b")) })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a.descriptor, &b.descriptor));
        assert_eq!(b.descriptor.name, "a");
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn identities_are_case_sensitive() {
        let reg = DescriptorRegistry::new();
        let lower = MetricIdentity::new("idx", "cpu");
        let upper = MetricIdentity::new("idx", "CPU");
        reg.get_or_create(&lower, || async { Ok::<_, ()>(entry("lower")) })
            .await
            .unwrap();
        assert!(reg.get(&upper).is_none());
        assert!(reg.get(&lower).is_some());
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let reg = DescriptorRegistry::new();
        let id = MetricIdentity::new("_metrics", "cpu");
        let err = reg
            .get_or_create(&id, || async { Err::<MetricEntry, _>("unreachable") })
            .await
            .unwrap_err();
        assert_eq!(err, "unreachable");
        assert!(reg.get(&id).is_none());
        assert!(reg.is_empty());

        let ok = reg
            .get_or_create(&id, || async { Ok::<_, &str>(entry("cpu")) })
            .await
            .unwrap();
        assert_eq!(ok.descriptor.name, "cpu");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_lookups_share_one_instance() {
        let reg = DescriptorRegistry::new();
        let id = MetricIdentity::new("_metrics", "cpu");
        let inits = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let reg = reg.clone();
                let id = id.clone();
                let inits = inits.clone();
                tokio::spawn(async move {
                    reg.get_or_create(&id, || async move {
                        inits.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, ()>(entry(&format!("cpu{i}")))
                    })
                    .await
                    .unwrap()
                })
            })
            .collect();

        let mut entries = Vec::new();
        for h in handles {
            entries.push(h.await.unwrap());
        }
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(entries.iter().all(|e| Arc::ptr_eq(e, &entries[0])));
    }
}
