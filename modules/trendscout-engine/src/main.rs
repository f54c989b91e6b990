use std::path::PathBuf;

use ai_client::ProviderKind;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trendscout_common::Config;
use trendscout_engine::{AnalysisPipeline, AnalysisStore};

#[derive(Parser)]
#[command(name = "trendscout", about = "Solana narrative and build-idea scout")]
struct Cli {
    /// LLM provider (groq, openai, anthropic); overrides LLM_PROVIDER
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Write the result JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trendscout=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("TrendScout starting...");

    let mut config = Config::from_env();
    if let Some(provider) = cli.provider {
        config.llm_provider = provider;
    }
    config.log_redacted();

    let pipeline = AnalysisPipeline::from_config(&config)?;
    let store = AnalysisStore::new();
    let result = store.run(&pipeline).await?;

    info!(
        signals = result.metadata.signal_count,
        narratives = result.metadata.narrative_count,
        ideas = result.metadata.idea_count,
        errors = result.errors.len(),
        duration_ms = result.metadata.duration_ms,
        "Analysis finished"
    );
    for narrative in &result.narratives {
        info!(
            title = narrative.title.as_str(),
            confidence = narrative.confidence_score,
            signals = narrative.signals.len(),
            ideas = narrative.ideas.len(),
            "Narrative"
        );
    }

    let json = serde_json::to_string_pretty(result.as_ref())?;
    match cli.output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "Result written");
        }
        None => println!("{json}"),
    }

    Ok(())
}
