pub mod idea_generator;
mod lenient;
pub mod narrative_detector;

pub use idea_generator::{GeneratedIdea, IdeaGenerator, NarrativeBrief};
pub use narrative_detector::{DetectedNarrative, NarrativeDetection, NarrativeDetector};
