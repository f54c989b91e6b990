use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::task::JoinError;
use tracing::{error, info};

use trendscout_common::{Config, Signal, SignalSource};

use crate::collector::Collector;
use crate::github::GithubCollector;
use crate::news::NewsCollector;
use crate::onchain::OnchainCollector;
use crate::social::SocialCollector;

const UNKNOWN_ERROR: &str = "Unknown error";

/// Merged output of one collection pass.
#[derive(Debug, Clone, Default)]
pub struct CollectionOutcome {
    /// All signals, highest score first. Ties keep registration order.
    pub signals: Vec<Signal>,
    pub raw_data: BTreeMap<SignalSource, Value>,
    /// One message per collector that failed.
    pub errors: Vec<String>,
}

/// Runs every registered collector concurrently and merges what succeeds.
pub struct CollectorManager {
    collectors: Vec<Arc<dyn Collector>>,
}

impl CollectorManager {
    pub fn new(collectors: Vec<Arc<dyn Collector>>) -> Self {
        Self { collectors }
    }

    /// The four production collectors, keyed from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(vec![
            Arc::new(OnchainCollector::new(config.helius_api_key.clone())),
            Arc::new(GithubCollector::new(config.github_token.clone())),
            Arc::new(SocialCollector::new(config.lunarcrush_api_key.clone())),
            Arc::new(NewsCollector::new()),
        ])
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Run all collectors in parallel. Never fails: a collector that errors
    /// or panics is reported in `errors` and the rest still contribute.
    pub async fn collect_all(&self) -> CollectionOutcome {
        info!(collectors = self.collectors.len(), "Starting data collection");

        let handles: Vec<_> = self
            .collectors
            .iter()
            .map(|collector| {
                let collector = Arc::clone(collector);
                tokio::spawn(async move {
                    let started = Instant::now();
                    let result = collector.collect().await;
                    (started.elapsed(), result)
                })
            })
            .collect();

        let mut outcome = CollectionOutcome::default();

        for (collector, handle) in self.collectors.iter().zip(handles) {
            match handle.await {
                Ok((elapsed, Ok(result))) => {
                    info!(
                        collector = collector.name(),
                        signals = result.signals.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Collector finished"
                    );
                    outcome.signals.extend(result.signals);
                    outcome
                        .raw_data
                        .insert(collector.source(), Value::Object(result.raw_data));
                }
                Ok((elapsed, Err(e))) => {
                    error!(
                        collector = collector.name(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "Collector failed"
                    );
                    outcome.errors.push(non_empty(e.to_string()));
                }
                Err(join_err) => {
                    error!(collector = collector.name(), error = %join_err, "Collector task aborted");
                    outcome.errors.push(join_error_message(join_err));
                }
            }
        }

        outcome.signals.sort_by(|a, b| b.score().cmp(&a.score()));

        info!(
            signals = outcome.signals.len(),
            errors = outcome.errors.len(),
            "Collection complete"
        );
        outcome
    }
}

fn non_empty(message: String) -> String {
    if message.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        message
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return non_empty(err.to_string());
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    non_empty(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingCollector, PanickingCollector, StaticCollector};

    fn titles(signals: &[Signal]) -> Vec<&str> {
        signals.iter().map(|s| s.title()).collect()
    }

    #[tokio::test]
    async fn one_failure_is_isolated() {
        let manager = CollectorManager::new(vec![
            Arc::new(StaticCollector::new(SignalSource::Onchain, &[("tps", 40.0), ("tvl", 70.0)])),
            Arc::new(FailingCollector::new(SignalSource::Github, "rate limited")),
            Arc::new(StaticCollector::new(SignalSource::Social, &[("trending", 70.0)])),
            Arc::new(StaticCollector::new(SignalSource::News, &[("headline", 90.0)])),
        ]);

        let outcome = manager.collect_all().await;

        assert_eq!(outcome.errors, vec!["rate limited".to_string()]);
        // Stable sort: the two 70s keep registration order.
        assert_eq!(titles(&outcome.signals), vec!["headline", "tvl", "trending", "tps"]);
        assert_eq!(outcome.raw_data.len(), 3);
        assert!(!outcome.raw_data.contains_key(&SignalSource::Github));
    }

    #[tokio::test]
    async fn empty_error_message_becomes_unknown() {
        let manager = CollectorManager::new(vec![Arc::new(FailingCollector::new(SignalSource::News, ""))]);
        let outcome = manager.collect_all().await;
        assert_eq!(outcome.errors, vec![UNKNOWN_ERROR.to_string()]);
        assert!(outcome.signals.is_empty());
    }

    #[tokio::test]
    async fn panicking_collector_does_not_take_down_others() {
        let manager = CollectorManager::new(vec![
            Arc::new(PanickingCollector::new(SignalSource::Onchain, "collector exploded")),
            Arc::new(StaticCollector::new(SignalSource::Github, &[("repo", 55.0)])),
        ]);

        let outcome = manager.collect_all().await;

        assert_eq!(outcome.errors, vec!["collector exploded".to_string()]);
        assert_eq!(titles(&outcome.signals), vec!["repo"]);
    }

    #[tokio::test]
    async fn no_collectors_yields_empty_outcome() {
        let outcome = CollectorManager::new(Vec::new()).collect_all().await;
        assert!(outcome.signals.is_empty());
        assert!(outcome.errors.is_empty());
    }
}
