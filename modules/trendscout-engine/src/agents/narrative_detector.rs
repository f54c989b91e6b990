use std::sync::Arc;

use ai_client::{structured_output, LlmProvider, Message};
use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use trendscout_common::{NarrativeStatus, Signal, TrendDirection};

use super::lenient;

/// Only the highest-ranked signals are shown to the model.
pub const MAX_PROMPT_SIGNALS: usize = 40;

const SYSTEM_PROMPT: &str = r#"You are an expert Solana ecosystem analyst. You study raw signals from onchain metrics, developer activity, social sentiment and news, and identify the emerging narratives that connect them.

A narrative is a coherent theme that several signals point to at once, for example "Liquid staking derivatives gain share" or "Consumer payments move onchain".

Identify between 4 and 7 narratives. For each narrative provide ALL of these fields:
- title: short, specific name of the narrative
- description: one or two sentences summarizing it
- explanation: detailed analysis of why this narrative is forming, citing the signals
- status: one of "emerging", "accelerating", "established"
- confidenceScore: integer from 0 to 100
- trendDirection: one of "up", "down", "stable"
- tags: 3 to 6 short lowercase tags
- relatedSignalIndices: the [index] numbers of the signals supporting this narrative

Prefer narratives backed by signals from more than one source. Do not invent data that is not in the signals."#;

/// One narrative as proposed by the model. Missing or malformed fields are
/// left absent here and defaulted during assembly.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedNarrative {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub explanation: String,
    #[serde(default, deserialize_with = "lenient::parsed")]
    pub status: Option<NarrativeStatus>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::parsed")]
    pub trend_direction: Option<TrendDirection>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::indices")]
    pub related_signal_indices: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NarrativeDetection {
    #[serde(default, deserialize_with = "lenient::items")]
    pub narratives: Vec<DetectedNarrative>,
}

/// Clusters ranked signals into narratives with one model call.
pub struct NarrativeDetector {
    provider: Arc<dyn LlmProvider>,
}

impl NarrativeDetector {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// `signals` should already be ranked; indices in the reply refer to
    /// positions in this slice.
    pub async fn detect_narratives(&self, signals: &[Signal]) -> Result<NarrativeDetection> {
        let shown = signals.len().min(MAX_PROMPT_SIGNALS);
        info!(
            signals = signals.len(),
            shown,
            provider = self.provider.name(),
            "Detecting narratives"
        );

        let messages = vec![
            Message::system(system_prompt()),
            Message::user(user_prompt(signals)),
        ];

        let detection: NarrativeDetection =
            structured_output(self.provider.as_ref(), messages, None).await?;

        info!(narratives = detection.narratives.len(), "Narratives detected");
        Ok(detection)
    }
}

fn system_prompt() -> String {
    format!(
        "{SYSTEM_PROMPT}\n\nToday's date: {}",
        Utc::now().date_naive().format("%Y-%m-%d")
    )
}

fn user_prompt(signals: &[Signal]) -> String {
    let shown = signals.len().min(MAX_PROMPT_SIGNALS);
    format!(
        "Analyze these {shown} signals from the Solana ecosystem and identify emerging narratives:\n\n\
         {digest}\n\n\
         Respond with a JSON object matching this EXACT schema:\n\
         {{\"narratives\": [{{\"title\": \"string\", \"description\": \"string\", \"explanation\": \"string\", \
         \"status\": \"emerging|accelerating|established\", \"confidenceScore\": 0, \
         \"trendDirection\": \"up|down|stable\", \"tags\": [\"string\"], \"relatedSignalIndices\": [0]}}]}}\n\n\
         Every field is REQUIRED. Return 4-7 narratives.",
        digest = signal_digest(signals),
    )
}

/// One line per signal, `[index] [source] (Score: n) title: description`,
/// for the top [`MAX_PROMPT_SIGNALS`] signals.
pub fn signal_digest(signals: &[Signal]) -> String {
    signals
        .iter()
        .take(MAX_PROMPT_SIGNALS)
        .enumerate()
        .map(|(i, s)| {
            format!(
                "[{i}] [{}] (Score: {}) {}: {}",
                s.source(),
                s.score(),
                s.title(),
                s.description()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
