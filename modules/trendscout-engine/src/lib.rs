//! Narrative detection and idea generation over collected Solana signals.
//!
//! [`AnalysisPipeline`] runs one collection pass, asks the model for
//! narratives and ideas, and assembles the result; [`AnalysisStore`] gates
//! runs and serves reads over the latest published result.

pub mod agents;
pub mod assembly;
pub mod pipeline;
pub mod store;

pub use agents::{DetectedNarrative, GeneratedIdea, IdeaGenerator, NarrativeBrief, NarrativeDetector};
pub use assembly::{assemble, fortnight_period, RunMetadata};
pub use pipeline::{AnalysisPipeline, AnalysisPipelineResult, PipelinePhase};
pub use store::{AnalysisStatus, AnalysisStore, IdeaListing, NarrativeSummary, RunGuard, SignalPage};
