use std::sync::Arc;
use std::time::Duration;

use ai_client::{create_provider, LlmProvider};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info};

use trendscout_collectors::CollectorManager;
use trendscout_common::{Config, Narrative, Signal, TrendScoutError};

use crate::agents::{IdeaGenerator, NarrativeBrief, NarrativeDetector};
use crate::assembly::{assemble, RunMetadata};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    #[default]
    Idle,
    Collecting,
    Detecting,
    GeneratingIdeas,
    Assembling,
    Complete,
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPipelineResult {
    pub narratives: Vec<Narrative>,
    /// Every collected signal, highest score first.
    pub all_signals: Vec<Signal>,
    pub errors: Vec<String>,
    pub metadata: RunMetadata,
}

/// Collection, narrative detection, idea generation and assembly, in that
/// order. Each stage degrades instead of failing the run.
pub struct AnalysisPipeline {
    collectors: CollectorManager,
    detector: NarrativeDetector,
    ideas: IdeaGenerator,
    phase: watch::Sender<PipelinePhase>,
}

impl AnalysisPipeline {
    pub fn new(collectors: CollectorManager, provider: Arc<dyn LlmProvider>) -> Self {
        let (phase, _) = watch::channel(PipelinePhase::Idle);
        Self {
            collectors,
            detector: NarrativeDetector::new(provider.clone()),
            ideas: IdeaGenerator::new(provider),
            phase,
        }
    }

    /// Production collectors and the configured LLM provider. Fails when the
    /// selected provider has no API key or cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, TrendScoutError> {
        if config.llm_api_key().is_empty() {
            return Err(TrendScoutError::Config(format!(
                "{}_API_KEY is not set",
                config.llm_provider.as_str().to_ascii_uppercase()
            )));
        }
        let provider = create_provider(&config.provider_settings())?;
        Ok(Self::new(CollectorManager::from_config(config), provider)
            .with_idea_call_delay(config.idea_call_delay))
    }

    pub fn with_idea_call_delay(mut self, delay: Duration) -> Self {
        self.ideas = self.ideas.with_call_delay(delay);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelinePhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> PipelinePhase {
        *self.phase.borrow()
    }

    /// Run every stage once. Stage failures are recorded in `errors`.
    pub async fn run(&self) -> AnalysisPipelineResult {
        let started_at = Utc::now();
        info!("Starting analysis run");

        self.enter(PipelinePhase::Collecting);
        let collection = self.collectors.collect_all().await;
        let mut errors = collection.errors;
        let signals = collection.signals;

        self.enter(PipelinePhase::Detecting);
        let detected = match self.detector.detect_narratives(&signals).await {
            Ok(detection) => detection.narratives,
            Err(e) => {
                error!(error = %e, "Narrative detection failed");
                errors.push(format!("Narrative detection failed: {e}"));
                Vec::new()
            }
        };

        self.enter(PipelinePhase::GeneratingIdeas);
        let briefs: Vec<NarrativeBrief> = detected
            .iter()
            .map(|d| NarrativeBrief {
                title: d.title.clone(),
                description: d.description.clone(),
                explanation: d.explanation.clone(),
            })
            .collect();
        let ideas = self.ideas.generate_batch_ideas(&briefs).await;

        self.enter(PipelinePhase::Assembling);
        let completed_at = Utc::now();
        let narratives = assemble(detected, &ideas, &signals, started_at, completed_at);
        let metadata = RunMetadata::new(started_at, completed_at, &signals, &narratives);

        info!(
            signals = metadata.signal_count,
            narratives = metadata.narrative_count,
            ideas = metadata.idea_count,
            errors = errors.len(),
            duration_ms = metadata.duration_ms,
            "Analysis run complete"
        );

        self.enter(PipelinePhase::Complete);
        AnalysisPipelineResult {
            narratives,
            all_signals: signals,
            errors,
            metadata,
        }
    }

    fn enter(&self, phase: PipelinePhase) {
        info!(?phase, "Pipeline phase");
        self.phase.send_replace(phase);
    }
}
