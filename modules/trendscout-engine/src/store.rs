//! Holds the latest published run and gates new ones. Readers always see a
//! complete result: publication swaps one `Arc` under a write lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use trendscout_common::{
    BuildIdea, IdeaCategory, Narrative, NarrativeStatus, Signal, SignalSource, TrendDirection,
    TrendScoutError,
};

use crate::assembly::RunMetadata;
use crate::pipeline::{AnalysisPipeline, AnalysisPipelineResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    pub is_analyzing: bool,
    pub last_analyzed_at: Option<DateTime<Utc>>,
    pub metadata: Option<RunMetadata>,
}

/// A narrative without its signal list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub explanation: String,
    pub status: NarrativeStatus,
    pub confidence_score: u8,
    pub trend_direction: TrendDirection,
    pub ideas: Vec<BuildIdea>,
    pub tags: Vec<String>,
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fortnight_period: String,
    pub signal_count: usize,
    pub idea_count: usize,
}

impl From<&Narrative> for NarrativeSummary {
    fn from(n: &Narrative) -> Self {
        Self {
            id: n.id,
            title: n.title.clone(),
            slug: n.slug.clone(),
            description: n.description.clone(),
            explanation: n.explanation.clone(),
            status: n.status,
            confidence_score: n.confidence_score,
            trend_direction: n.trend_direction,
            ideas: n.ideas.clone(),
            tags: n.tags.clone(),
            detected_at: n.detected_at,
            updated_at: n.updated_at,
            fortnight_period: n.fortnight_period.clone(),
            signal_count: n.signals.len(),
            idea_count: n.ideas.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaListing {
    #[serde(flatten)]
    pub idea: BuildIdea,
    pub narrative_title: String,
    pub narrative_slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPage {
    pub signals: Vec<Signal>,
    /// Matching signals before pagination.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone)]
struct Published {
    result: Arc<AnalysisPipelineResult>,
    analyzed_at: DateTime<Utc>,
}

/// Single-run gate plus the latest published result.
#[derive(Debug, Default)]
pub struct AnalysisStore {
    published: RwLock<Option<Published>>,
    analyzing: AtomicBool,
}

/// Held while a run is active; releases the gate on drop.
#[derive(Debug)]
pub struct RunGuard<'a> {
    store: &'a AnalysisStore,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.store.analyzing.store(false, Ordering::Release);
    }
}

impl AnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a run is already active.
    pub fn try_begin_run(&self) -> Option<RunGuard<'_>> {
        self.analyzing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { store: self })
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::Acquire)
    }

    /// Run `pipeline` once and publish the result, unless another run holds
    /// the gate.
    pub async fn run(
        &self,
        pipeline: &AnalysisPipeline,
    ) -> Result<Arc<AnalysisPipelineResult>, TrendScoutError> {
        let _guard = self.try_begin_run().ok_or(TrendScoutError::RunInProgress)?;
        let result = pipeline.run().await;
        Ok(self.publish(result))
    }

    /// Replace the published result. `last_analyzed_at` becomes the run's
    /// completion time.
    pub fn publish(&self, result: AnalysisPipelineResult) -> Arc<AnalysisPipelineResult> {
        let result = Arc::new(result);
        let published = Published {
            analyzed_at: result.metadata.completed_at,
            result: Arc::clone(&result),
        };
        *self.published.write().unwrap_or_else(PoisonError::into_inner) = Some(published);
        result
    }

    pub fn latest(&self) -> Option<Arc<AnalysisPipelineResult>> {
        self.read().map(|p| p.result)
    }

    pub fn status(&self) -> AnalysisStatus {
        let published = self.read();
        AnalysisStatus {
            is_analyzing: self.is_analyzing(),
            last_analyzed_at: published.as_ref().map(|p| p.analyzed_at),
            metadata: published.map(|p| p.result.metadata.clone()),
        }
    }

    // --- Queries ---

    /// Look up by slug, or by id in its hyphenated form.
    pub fn narrative(&self, slug_or_id: &str) -> Option<Narrative> {
        let latest = self.latest()?;
        let id = Uuid::parse_str(slug_or_id).ok();
        latest
            .narratives
            .iter()
            .find(|n| n.slug == slug_or_id || Some(n.id) == id)
            .cloned()
    }

    pub fn narrative_summaries(&self) -> Vec<NarrativeSummary> {
        self.latest()
            .map(|r| r.narratives.iter().map(NarrativeSummary::from).collect())
            .unwrap_or_default()
    }

    /// Ideas across all narratives, highest score first.
    pub fn ideas(&self, category: Option<IdeaCategory>) -> Vec<IdeaListing> {
        let Some(latest) = self.latest() else {
            return Vec::new();
        };

        let mut listings: Vec<IdeaListing> = latest
            .narratives
            .iter()
            .flat_map(|n| {
                n.ideas.iter().map(move |idea| IdeaListing {
                    idea: idea.clone(),
                    narrative_title: n.title.clone(),
                    narrative_slug: n.slug.clone(),
                })
            })
            .filter(|listing| category.map_or(true, |c| listing.idea.category == c))
            .collect();

        listings.sort_by(|a, b| b.idea.score.cmp(&a.idea.score));
        listings
    }

    /// 1-based page of the ranked signal list. Zero `page` or `page_size`
    /// means the default (1 and 20).
    pub fn signals(&self, source: Option<SignalSource>, page: usize, page_size: usize) -> SignalPage {
        let page = if page == 0 { 1 } else { page };
        let page_size = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };

        let Some(latest) = self.latest() else {
            return paginate(Vec::new(), page, page_size);
        };
        let matching = latest
            .all_signals
            .iter()
            .filter(|s| source.map_or(true, |src| s.source() == src))
            .collect();
        paginate(matching, page, page_size)
    }

    fn read(&self) -> Option<Published> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn paginate(matching: Vec<&Signal>, page: usize, page_size: usize) -> SignalPage {
    let total = matching.len();
    let signals = matching
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect();

    SignalPage {
        signals,
        total,
        page,
        page_size,
    }
}
