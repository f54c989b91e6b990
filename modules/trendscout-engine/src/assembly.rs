//! Turns detected narratives and generated ideas into the published model.
//! Pure: every id, slug and timestamp is derived here, nothing can fail.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trendscout_common::{
    clamp_score, slugify, BuildIdea, Narrative, ResolvedSignal, Signal,
};

use crate::agents::{DetectedNarrative, GeneratedIdea};

const DEFAULT_CONFIDENCE: f64 = 70.0;

/// Counts and timing for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Milliseconds between start and completion.
    #[serde(rename = "duration")]
    pub duration_ms: i64,
    pub signal_count: usize,
    pub narrative_count: usize,
    pub idea_count: usize,
}

impl RunMetadata {
    pub fn new(
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        signals: &[Signal],
        narratives: &[Narrative],
    ) -> Self {
        Self {
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
            signal_count: signals.len(),
            narrative_count: narratives.len(),
            idea_count: narratives.iter().map(|n| n.ideas.len()).sum(),
        }
    }
}

/// `<start date>_<completion date>`.
pub fn fortnight_period(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> String {
    format!(
        "{}_{}",
        started_at.date_naive().format("%Y-%m-%d"),
        completed_at.date_naive().format("%Y-%m-%d")
    )
}

/// Build the published narratives. `signals` is the full ranked list the
/// detector's indices refer to; indices outside it are dropped. Ideas are
/// looked up by narrative title.
pub fn assemble(
    detected: Vec<DetectedNarrative>,
    ideas: &HashMap<String, Vec<GeneratedIdea>>,
    signals: &[Signal],
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
) -> Vec<Narrative> {
    let period = fortnight_period(started_at, completed_at);

    detected
        .into_iter()
        .map(|d| {
            let narrative_id = Uuid::new_v4();
            let generated = ideas.get(&d.title).cloned().unwrap_or_default();

            let resolved = d
                .related_signal_indices
                .iter()
                .filter_map(|&i| usize::try_from(i).ok())
                .filter_map(|i| signals.get(i))
                .map(|s| ResolvedSignal::new(s.clone(), completed_at))
                .collect();

            let ideas = generated
                .into_iter()
                .map(|idea| build_idea(idea, narrative_id, completed_at))
                .collect();

            Narrative {
                id: narrative_id,
                slug: slugify(&d.title),
                title: d.title,
                description: d.description,
                explanation: d.explanation,
                status: d.status.unwrap_or_default(),
                confidence_score: clamp_score(d.confidence_score.unwrap_or(DEFAULT_CONFIDENCE)),
                trend_direction: d.trend_direction.unwrap_or_default(),
                signals: resolved,
                ideas,
                tags: d.tags,
                detected_at: completed_at,
                updated_at: completed_at,
                fortnight_period: period.clone(),
            }
        })
        .collect()
}

fn build_idea(idea: GeneratedIdea, narrative_id: Uuid, created_at: DateTime<Utc>) -> BuildIdea {
    BuildIdea {
        id: Uuid::new_v4(),
        slug: slugify(&idea.title),
        title: idea.title,
        description: idea.description,
        problem: idea.problem,
        solution: idea.solution,
        target_audience: idea.target_audience,
        feasibility: idea.feasibility,
        category: idea.category,
        technical_requirements: idea.technical_requirements,
        potential_challenges: idea.potential_challenges,
        narrative_id,
        score: clamp_score(idea.score),
        created_at,
    }
}
