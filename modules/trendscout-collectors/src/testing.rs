//! Canned collectors for exercising the manager and pipeline without network.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map};

use trendscout_common::{Signal, SignalSource};

use crate::collector::{Collector, CollectorResult};

/// Returns a fixed list of signals, optionally after a delay.
pub struct StaticCollector {
    source: SignalSource,
    name: String,
    signals: Vec<(String, f64)>,
    delay: Duration,
}

impl StaticCollector {
    pub fn new(source: SignalSource, signals: &[(&str, f64)]) -> Self {
        Self {
            source,
            name: format!("static-{source}"),
            signals: signals.iter().map(|(t, s)| (t.to_string(), *s)).collect(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals
            .iter()
            .map(|(title, score)| {
                self.create_signal(title, &format!("{title} description"), *score, json!({}), None)
            })
            .collect()
    }
}

#[async_trait]
impl Collector for StaticCollector {
    fn source(&self) -> SignalSource {
        self.source
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self) -> Result<CollectorResult> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut raw_data = Map::new();
        raw_data.insert("count".into(), json!(self.signals.len()));
        Ok(CollectorResult {
            signals: self.signals(),
            raw_data,
        })
    }
}

/// Always fails with the given message.
pub struct FailingCollector {
    source: SignalSource,
    message: String,
}

impl FailingCollector {
    pub fn new(source: SignalSource, message: &str) -> Self {
        Self {
            source,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Collector for FailingCollector {
    fn source(&self) -> SignalSource {
        self.source
    }

    fn name(&self) -> &str {
        "failing"
    }

    async fn collect(&self) -> Result<CollectorResult> {
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// Panics inside `collect`.
pub struct PanickingCollector {
    source: SignalSource,
    message: String,
}

impl PanickingCollector {
    pub fn new(source: SignalSource, message: &str) -> Self {
        Self {
            source,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Collector for PanickingCollector {
    fn source(&self) -> SignalSource {
        self.source
    }

    fn name(&self) -> &str {
        "panicking"
    }

    async fn collect(&self) -> Result<CollectorResult> {
        panic!("{}", self.message);
    }
}
