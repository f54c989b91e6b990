use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use trendscout_common::SignalSource;

use crate::collector::{Collector, CollectorResult, SubCollection};
use crate::http::{HttpFetcher, RetryPolicy};

const TRACKED_ORGS: &[&str] = &[
    "solana-labs",
    "solana-foundation",
    "coral-xyz",
    "metaplex-foundation",
    "jup-ag",
    "orca-so",
    "marinade-finance",
    "helium",
    "squads-protocol",
    "drift-labs",
    "tensor-hq",
    "magiceden-oss",
    "clockwork-xyz",
    "switchboard-xyz",
    "raydium-io",
    "project-serum",
];

const TRACKED_TOPICS: &[&str] = &[
    "solana",
    "solana-program",
    "anchor-framework",
    "solana-dapp",
    "solana-nft",
    "solana-defi",
    "solana-mobile",
];

const ORGS_PER_RUN: usize = 6;
const TOPICS_PER_RUN: usize = 3;
const TRENDING_SIGNALS: usize = 10;

/// Developer activity on GitHub: trending new repos, core org pushes, and
/// topic activity.
pub struct GithubCollector {
    http: HttpFetcher,
    token: Option<String>,
    api_base: String,
    org_delay: Duration,
    topic_delay: Duration,
}

impl GithubCollector {
    pub fn new(token: Option<String>) -> Self {
        Self {
            http: HttpFetcher::default(),
            token,
            api_base: "https://api.github.com".to_string(),
            org_delay: Duration::from_millis(200),
            topic_delay: Duration::from_millis(500),
        }
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.http = HttpFetcher::new(policy);
        self
    }

    /// Pause between org requests and between topic requests.
    pub fn with_pacing(mut self, org_delay: Duration, topic_delay: Duration) -> Self {
        self.org_delay = org_delay;
        self.topic_delay = topic_delay;
        self
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .client()
            .get(format!("{}{path}", self.api_base))
            .header("Accept", "application/vnd.github.v3+json");
        match self.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn trending_repos(&self) -> Result<SubCollection> {
        let since = (Utc::now() - chrono::Duration::days(30)).format("%Y-%m-%d");
        let query = format!("solana language:rust language:typescript created:>{since}");
        let search: SearchResponse = self
            .http
            .json(
                self.get("/search/repositories").query(&[
                    ("q", query.as_str()),
                    ("sort", "stars"),
                    ("order", "desc"),
                    ("per_page", "20"),
                ]),
                "GitHub repository search",
            )
            .await?;

        let mut signals = Vec::new();
        for repo in search.items.iter().take(TRENDING_SIGNALS) {
            let score = (30 + repo.stargazers_count * 2 + repo.forks_count * 3).min(90);
            signals.push(self.create_signal(
                &format!("Trending: {}", repo.full_name),
                &format!(
                    "{}. {} stars, {} forks. Language: {}.",
                    repo.description.as_deref().unwrap_or("No description"),
                    repo.stargazers_count,
                    repo.forks_count,
                    repo.language.as_deref().unwrap_or("Mixed")
                ),
                score as f64,
                json!({
                    "fullName": repo.full_name,
                    "stars": repo.stargazers_count,
                    "forks": repo.forks_count,
                    "language": repo.language,
                    "topics": repo.topics,
                }),
                Some(&repo.html_url),
            ));
        }

        let total = search.total_count;
        if total > 0 {
            let (interest, score) = match total {
                101.. => ("strong", 70.0),
                51..=100 => ("moderate", 55.0),
                _ => ("moderate", 40.0),
            };
            signals.push(self.create_signal(
                "New Solana Repositories Created",
                &format!(
                    "{total} new Solana-related repositories created in the last 30 days, indicating {interest} developer interest."
                ),
                score,
                json!({ "totalNewRepos": total, "period": "30d" }),
                None,
            ));
        }

        let raw = search
            .items
            .iter()
            .map(|r| json!({ "name": r.full_name, "stars": r.stargazers_count, "forks": r.forks_count, "url": r.html_url }))
            .collect();
        Ok(SubCollection::new(signals, Value::Array(raw)))
    }

    async fn org_activity(&self) -> Result<SubCollection> {
        let week_ago = Utc::now() - chrono::Duration::days(7);
        let mut signals = Vec::new();
        let mut raw = Vec::new();

        for (i, org) in TRACKED_ORGS.iter().take(ORGS_PER_RUN).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.org_delay).await;
            }

            let repos: Vec<Repo> = match self
                .http
                .json(
                    self.get(&format!("/orgs/{org}/repos")).query(&[
                        ("sort", "pushed"),
                        ("direction", "desc"),
                        ("per_page", "5"),
                    ]),
                    "GitHub org repos",
                )
                .await
            {
                Ok(repos) => repos,
                Err(e) => {
                    debug!(org, error = %e, "Skipping org");
                    continue;
                }
            };

            let active: Vec<&Repo> = repos
                .iter()
                .filter(|r| r.pushed_at.is_some_and(|pushed| pushed > week_ago))
                .collect();
            let Some(latest) = active.first() else {
                continue;
            };

            let names: Vec<&str> = active.iter().map(|r| r.name.as_str()).collect();
            raw.push(json!({ "org": org, "activeRepos": names }));
            signals.push(self.create_signal(
                &format!("{org} Active Development"),
                &format!(
                    "{} repos updated in the last week. Most recent: {} ({} stars).",
                    active.len(),
                    latest.name,
                    latest.stargazers_count
                ),
                45.0 + active.len() as f64 * 5.0,
                json!({ "org": org, "activeRepoCount": active.len(), "repos": names }),
                Some(&format!("https://github.com/{org}")),
            ));
        }

        Ok(SubCollection::new(signals, Value::Array(raw)))
    }

    async fn topic_activity(&self) -> Result<SubCollection> {
        let topics = &TRACKED_TOPICS[..TOPICS_PER_RUN];
        let mut raw = Vec::new();

        for (i, topic) in topics.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.topic_delay).await;
            }
            let query = format!("topic:{topic}");
            let search: SearchResponse = self
                .http
                .json(
                    self.get("/search/repositories").query(&[
                        ("q", query.as_str()),
                        ("sort", "updated"),
                        ("order", "desc"),
                        ("per_page", "5"),
                    ]),
                    "GitHub topic search",
                )
                .await?;
            raw.extend(
                search
                    .items
                    .into_iter()
                    .map(|r| json!({ "topic": topic, "name": r.full_name, "stars": r.stargazers_count })),
            );
        }

        let mut signals = Vec::new();
        if !raw.is_empty() {
            signals.push(self.create_signal(
                "Solana Topic Activity on GitHub",
                &format!(
                    "{} recently updated repos across Solana-related topics ({}).",
                    raw.len(),
                    topics.join(", ")
                ),
                50.0,
                json!({ "topicRepos": raw.len(), "topics": topics }),
                None,
            ));
        }

        Ok(SubCollection::new(signals, Value::Array(raw)))
    }
}

#[async_trait]
impl Collector for GithubCollector {
    fn source(&self) -> SignalSource {
        SignalSource::Github
    }

    fn name(&self) -> &str {
        "GitHub Developer Activity Collector"
    }

    async fn collect(&self) -> Result<CollectorResult> {
        if self.token.is_none() {
            warn!("GITHUB_TOKEN not set, GitHub search is heavily rate limited");
        }

        let (trending, orgs, topics) =
            tokio::join!(self.trending_repos(), self.org_activity(), self.topic_activity());

        let mut result = CollectorResult::default();
        result.absorb(self.name(), "trendingRepos", trending);
        result.absorb(self.name(), "orgActivity", orgs);
        result.absorb(self.name(), "topicActivity", topics);

        info!(collector = self.name(), signals = result.signals.len(), "GitHub collection finished");
        Ok(result)
    }
}

// --- Wire types ---

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    items: Vec<Repo>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    pushed_at: Option<DateTime<Utc>>,
}
