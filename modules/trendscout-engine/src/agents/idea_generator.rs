use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ai_client::{schema_hint, structured_output, LlmProvider, Message};
use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use trendscout_common::{Feasibility, IdeaCategory};

use super::lenient;

pub const DEFAULT_CALL_DELAY: Duration = Duration::from_secs(2);

const DEFAULT_IDEA_SCORE: f64 = 50.0;

const SYSTEM_PROMPT: &str = r#"You are a product strategist for the Solana ecosystem. Given a market narrative, you propose concrete products a small team could start building this month.

Every idea must be:
- SPECIFIC: a named product with a clear feature set, not a category
- FEASIBLE: buildable by a team of 2-5 engineers within a few months
- NOVEL: not a clone of an existing dominant protocol
- SOLANA-NATIVE: uses what Solana does well (throughput, low fees, compressed state, composability)
- MARKET-READY: has an identifiable first user and a reason to pay

For each idea provide ALL of these fields:
- title, description, problem, solution, targetAudience
- feasibility: one of "high", "medium", "low"
- category: one of "defi", "nft", "infrastructure", "tooling", "social", "gaming", "payments", "dao", "ai", "other"
- technicalRequirements: list of strings
- potentialChallenges: list of strings
- score: integer from 0 to 100 rating the opportunity

Generate exactly 4 ideas per narrative."#;

/// The parts of a detected narrative an idea prompt needs.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeBrief {
    pub title: String,
    pub description: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedIdea {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub problem: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub solution: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub target_audience: String,
    #[serde(default, deserialize_with = "lenient::parsed_or_default")]
    pub feasibility: Feasibility,
    #[serde(default, deserialize_with = "lenient::parsed_or_default")]
    pub category: IdeaCategory,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub technical_requirements: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub potential_challenges: Vec<String>,
    #[serde(default = "default_score", deserialize_with = "lenient::score")]
    pub score: f64,
}

fn default_score() -> f64 {
    DEFAULT_IDEA_SCORE
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IdeaBatch {
    #[serde(default, deserialize_with = "lenient::items")]
    ideas: Vec<GeneratedIdea>,
}

/// Turns narratives into product ideas, one model call per narrative.
pub struct IdeaGenerator {
    provider: Arc<dyn LlmProvider>,
    call_delay: Duration,
}

impl IdeaGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            call_delay: DEFAULT_CALL_DELAY,
        }
    }

    /// Pause between successive narratives in [`Self::generate_batch_ideas`].
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub async fn generate_ideas(&self, narrative: &NarrativeBrief) -> Result<Vec<GeneratedIdea>> {
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(user_prompt(narrative)),
        ];
        let hint = schema_hint::<IdeaBatch>();

        let batch: IdeaBatch = structured_output(self.provider.as_ref(), messages, Some(&hint))
            .await
            .with_context(|| format!("idea generation failed for '{}'", narrative.title))?;

        Ok(batch.ideas)
    }

    /// Generate ideas for each narrative in order, keyed by narrative title.
    /// A failed narrative maps to an empty list.
    pub async fn generate_batch_ideas(
        &self,
        narratives: &[NarrativeBrief],
    ) -> HashMap<String, Vec<GeneratedIdea>> {
        let mut ideas = HashMap::with_capacity(narratives.len());

        for (i, narrative) in narratives.iter().enumerate() {
            if i > 0 && !self.call_delay.is_zero() {
                tokio::time::sleep(self.call_delay).await;
            }

            let generated = match self.generate_ideas(narrative).await {
                Ok(generated) => {
                    info!(
                        narrative = %narrative.title,
                        ideas = generated.len(),
                        "Ideas generated"
                    );
                    generated
                }
                Err(e) => {
                    warn!(narrative = %narrative.title, error = %e, "Idea generation failed");
                    Vec::new()
                }
            };
            ideas.insert(narrative.title.clone(), generated);
        }

        ideas
    }
}

fn user_prompt(narrative: &NarrativeBrief) -> String {
    format!(
        "Generate 4 concrete product ideas for this Solana ecosystem narrative:\n\n\
         **Narrative: {}**\n{}\n\n\
         **Detailed Analysis:**\n{}\n\n\
         Respond with a JSON object containing an \"ideas\" array with exactly 4 idea objects.",
        narrative.title, narrative.description, narrative.explanation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_client::testing::ScriptedProvider;
    use serde_json::json;

    fn brief(title: &str) -> NarrativeBrief {
        NarrativeBrief {
            title: title.to_string(),
            description: format!("{title} description"),
            explanation: format!("{title} explanation"),
        }
    }

    #[test]
    fn malformed_idea_fields_fall_back() {
        let idea: GeneratedIdea = serde_json::from_value(json!({
            "title": "Tap-to-pay",
            "feasibility": "trivial",
            "category": "fintech",
            "technicalRequirements": "rust",
            "score": "ninety"
        }))
        .unwrap();

        assert_eq!(idea.feasibility, Feasibility::Medium);
        assert_eq!(idea.category, IdeaCategory::Other);
        assert!(idea.technical_requirements.is_empty());
        assert!(idea.problem.is_empty());
        assert_eq!(idea.score, 50.0);
    }

    #[test]
    fn missing_score_defaults_to_fifty() {
        let idea: GeneratedIdea =
            serde_json::from_value(json!({ "title": "x", "category": "DeFi" })).unwrap();
        assert_eq!(idea.score, 50.0);
        assert_eq!(idea.category, IdeaCategory::Defi);
    }

    #[tokio::test]
    async fn prompt_includes_narrative_and_schema() {
        let provider = Arc::new(ScriptedProvider::new().respond(
            r#"{"ideas":[{"title":"Streaming payroll","category":"payments","score":81}]}"#,
        ));
        let generator = IdeaGenerator::new(provider.clone());

        let ideas = generator.generate_ideas(&brief("Payments")).await.unwrap();
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].category, IdeaCategory::Payments);
        assert_eq!(ideas[0].score, 81.0);

        let calls = provider.calls();
        assert!(calls[0][0].content.contains("Expected JSON schema"));
        assert!(calls[0][1].content.contains("**Narrative: Payments**"));
        assert!(calls[0][1].content.contains("Payments explanation"));
    }

    #[tokio::test(start_paused = true)]
    async fn batch_isolates_failures_and_keeps_order() {
        let four = |prefix: &str| {
            let ideas: Vec<_> = (1..=4).map(|i| json!({ "title": format!("{prefix}{i}") })).collect();
            json!({ "ideas": ideas }).to_string()
        };
        let provider = Arc::new(
            ScriptedProvider::new()
                .respond(&four("a"))
                .fail_http(500, "boom")
                .respond(&four("c")),
        );
        let generator = IdeaGenerator::new(provider.clone()).with_call_delay(Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        let ideas = generator
            .generate_batch_ideas(&[brief("A"), brief("B"), brief("C")])
            .await;

        assert!(started.elapsed() >= Duration::from_secs(4));
        assert_eq!(ideas["A"].len(), 4);
        assert!(ideas["B"].is_empty());
        assert_eq!(ideas["C"].len(), 4);
        assert_eq!(ideas["C"][3].title, "c4");

        let calls = provider.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[1][1].content.contains("**Narrative: B**"));
    }

    #[tokio::test(start_paused = true)]
    async fn single_narrative_does_not_wait() {
        let provider = Arc::new(ScriptedProvider::new().respond(r#"{"ideas":[]}"#));
        let generator = IdeaGenerator::new(provider);

        let started = tokio::time::Instant::now();
        generator.generate_batch_ideas(&[brief("Only")]).await;
        assert!(started.elapsed() < DEFAULT_CALL_DELAY);
    }
}
