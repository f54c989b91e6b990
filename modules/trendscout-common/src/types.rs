use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Clamp to `[0, 100]` and round to the nearest integer. NaN becomes 0.
pub fn clamp_score(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.round().clamp(0.0, 100.0) as u8
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Onchain,
    Github,
    Social,
    News,
    Report,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Onchain => "onchain",
            SignalSource::Github => "github",
            SignalSource::Social => "social",
            SignalSource::News => "news",
            SignalSource::Report => "report",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onchain" => Ok(SignalSource::Onchain),
            "github" => Ok(SignalSource::Github),
            "social" => Ok(SignalSource::Social),
            "news" => Ok(SignalSource::News),
            "report" => Ok(SignalSource::Report),
            other => Err(format!("unknown signal source: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl SignalStrength {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => SignalStrength::VeryStrong,
            60..=79 => SignalStrength::Strong,
            40..=59 => SignalStrength::Moderate,
            _ => SignalStrength::Weak,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeStatus {
    #[default]
    Emerging,
    Accelerating,
    Established,
    Fading,
}

impl FromStr for NarrativeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emerging" => Ok(NarrativeStatus::Emerging),
            "accelerating" => Ok(NarrativeStatus::Accelerating),
            "established" => Ok(NarrativeStatus::Established),
            "fading" => Ok(NarrativeStatus::Fading),
            other => Err(format!("unknown narrative status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    #[default]
    Up,
    Down,
    Stable,
}

impl FromStr for TrendDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(TrendDirection::Up),
            "down" => Ok(TrendDirection::Down),
            "stable" => Ok(TrendDirection::Stable),
            other => Err(format!("unknown trend direction: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Feasibility {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for Feasibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Feasibility::Low),
            "medium" => Ok(Feasibility::Medium),
            "high" => Ok(Feasibility::High),
            other => Err(format!("unknown feasibility: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IdeaCategory {
    Defi,
    Nft,
    Infrastructure,
    Tooling,
    Social,
    Gaming,
    Payments,
    Dao,
    Ai,
    #[default]
    Other,
}

impl IdeaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdeaCategory::Defi => "defi",
            IdeaCategory::Nft => "nft",
            IdeaCategory::Infrastructure => "infrastructure",
            IdeaCategory::Tooling => "tooling",
            IdeaCategory::Social => "social",
            IdeaCategory::Gaming => "gaming",
            IdeaCategory::Payments => "payments",
            IdeaCategory::Dao => "dao",
            IdeaCategory::Ai => "ai",
            IdeaCategory::Other => "other",
        }
    }
}

impl fmt::Display for IdeaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdeaCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "defi" => Ok(IdeaCategory::Defi),
            "nft" => Ok(IdeaCategory::Nft),
            "infrastructure" => Ok(IdeaCategory::Infrastructure),
            "tooling" => Ok(IdeaCategory::Tooling),
            "social" => Ok(IdeaCategory::Social),
            "gaming" => Ok(IdeaCategory::Gaming),
            "payments" => Ok(IdeaCategory::Payments),
            "dao" => Ok(IdeaCategory::Dao),
            "ai" => Ok(IdeaCategory::Ai),
            "other" => Ok(IdeaCategory::Other),
            other => Err(format!("unknown idea category: {other}")),
        }
    }
}

// --- Signal ---

/// One normalized observation from an upstream source.
///
/// Fields are private: `strength` is derived from `score` at construction and
/// on deserialization, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SignalRecord")]
pub struct Signal {
    source: SignalSource,
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    strength: SignalStrength,
    score: u8,
    metadata: Map<String, Value>,
    detected_at: DateTime<Utc>,
}

impl Signal {
    /// New signal detected now. `score` is clamped and rounded.
    pub fn new(
        source: SignalSource,
        title: impl Into<String>,
        description: impl Into<String>,
        score: f64,
    ) -> Self {
        let score = clamp_score(score);
        Self {
            source,
            title: title.into(),
            description: description.into(),
            url: None,
            strength: SignalStrength::from_score(score),
            score,
            metadata: Map::new(),
            detected_at: Utc::now(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attach metadata. A JSON object is used as-is; any other value is
    /// stored under `"value"`.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = match metadata {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("value".to_string(), other)]),
        };
        self
    }

    pub fn with_detected_at(mut self, detected_at: DateTime<Utc>) -> Self {
        self.detected_at = detected_at;
        self
    }

    pub fn source(&self) -> SignalSource {
        self.source
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn strength(&self) -> SignalStrength {
        self.strength
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }
}

/// Wire form accepted when reading a signal back; `strength` is ignored and
/// recomputed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalRecord {
    source: SignalSource,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: Option<String>,
    score: f64,
    #[serde(default)]
    metadata: Map<String, Value>,
    detected_at: DateTime<Utc>,
}

impl From<SignalRecord> for Signal {
    fn from(record: SignalRecord) -> Self {
        let mut signal = Signal::new(record.source, record.title, record.description, record.score)
            .with_metadata(Value::Object(record.metadata))
            .with_detected_at(record.detected_at);
        signal.url = record.url;
        signal
    }
}

/// A narrative's own copy of a signal, with a fresh id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSignal {
    pub id: Uuid,
    #[serde(flatten)]
    pub signal: Signal,
    pub created_at: DateTime<Utc>,
}

impl ResolvedSignal {
    pub fn new(signal: Signal, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            signal,
            created_at,
        }
    }
}

// --- Narratives & Ideas ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildIdea {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub problem: String,
    pub solution: String,
    pub target_audience: String,
    pub feasibility: Feasibility,
    pub category: IdeaCategory,
    pub technical_requirements: Vec<String>,
    pub potential_challenges: Vec<String>,
    /// Back-reference to the owning narrative.
    pub narrative_id: Uuid,
    pub score: u8,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Narrative {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub explanation: String,
    pub status: NarrativeStatus,
    pub confidence_score: u8,
    pub trend_direction: TrendDirection,
    pub signals: Vec<ResolvedSignal>,
    pub ideas: Vec<BuildIdea>,
    pub tags: Vec<String>,
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `<start date>_<end date>`, ISO calendar dates.
    pub fortnight_period: String,
}
