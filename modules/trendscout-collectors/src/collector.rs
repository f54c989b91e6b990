use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use trendscout_common::{Signal, SignalSource};

/// Signals plus the upstream payloads they were derived from.
#[derive(Debug, Clone, Default)]
pub struct CollectorResult {
    pub signals: Vec<Signal>,
    /// Diagnostic payloads keyed by sub-collection name.
    pub raw_data: Map<String, Value>,
}

impl CollectorResult {
    /// Fold one sub-collection's outcome in. A failure is logged and
    /// contributes nothing.
    pub fn absorb(&mut self, collector: &str, key: &str, outcome: Result<SubCollection>) {
        match outcome {
            Ok(sub) => {
                self.signals.extend(sub.signals);
                self.raw_data.insert(key.to_string(), sub.raw);
            }
            Err(e) => {
                warn!(collector, sub_collection = key, error = %e, "Sub-collection failed");
            }
        }
    }
}

/// Output of one upstream fetch inside a collector.
#[derive(Debug, Clone, Default)]
pub struct SubCollection {
    pub signals: Vec<Signal>,
    pub raw: Value,
}

impl SubCollection {
    pub fn new(signals: Vec<Signal>, raw: Value) -> Self {
        Self { signals, raw }
    }
}

/// A source of signals from one class of upstream service.
///
/// `collect` should only fail when nothing useful could be gathered at all;
/// partial upstream failures are absorbed inside the implementation.
#[async_trait]
pub trait Collector: Send + Sync {
    fn source(&self) -> SignalSource;

    /// Human-readable name for logs and error messages.
    fn name(&self) -> &str;

    async fn collect(&self) -> Result<CollectorResult>;

    /// Stamp a new signal with this collector's source and the current time.
    fn create_signal(
        &self,
        title: &str,
        description: &str,
        score: f64,
        metadata: Value,
        url: Option<&str>,
    ) -> Signal {
        let signal = Signal::new(self.source(), title, description, score).with_metadata(metadata);
        match url {
            Some(url) => signal.with_url(url),
            None => signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trendscout_common::SignalStrength;

    struct Probe;

    #[async_trait]
    impl Collector for Probe {
        fn source(&self) -> SignalSource {
            SignalSource::Github
        }

        fn name(&self) -> &str {
            "probe"
        }

        async fn collect(&self) -> Result<CollectorResult> {
            Ok(CollectorResult::default())
        }
    }

    #[test]
    fn create_signal_stamps_source_and_strength() {
        let signal = Probe.create_signal("t", "d", 65.0, json!({ "k": 1 }), Some("https://x"));
        assert_eq!(signal.source(), SignalSource::Github);
        assert_eq!(signal.strength(), SignalStrength::Strong);
        assert_eq!(signal.url(), Some("https://x"));
        assert_eq!(signal.metadata()["k"], 1);
    }

    #[test]
    fn failed_sub_collection_contributes_nothing() {
        let mut result = CollectorResult::default();
        result.absorb(
            "probe",
            "good",
            Ok(SubCollection::new(
                vec![Probe.create_signal("a", "b", 50.0, Value::Null, None)],
                json!({ "n": 1 }),
            )),
        );
        result.absorb("probe", "bad", Err(anyhow::anyhow!("upstream 500")));

        assert_eq!(result.signals.len(), 1);
        assert!(result.raw_data.contains_key("good"));
        assert!(!result.raw_data.contains_key("bad"));
    }
}
