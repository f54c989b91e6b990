use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use trendscout_common::{clamp_score, SignalSource};

use crate::collector::{Collector, CollectorResult, SubCollection};
use crate::http::{HttpFetcher, RetryPolicy};

const MAX_POSTS: usize = 15;
const MIN_POST_SCORE: u8 = 30;
const HEADLINES_PER_FEED: usize = 5;
const MAJOR_OUTLETS: &[&str] = &["coindesk", "theblock", "decrypt", "cointelegraph"];

/// An RSS/Atom feed and the terms a headline must contain to count.
#[derive(Debug, Clone)]
pub struct HeadlineFeed {
    pub outlet: String,
    pub url: String,
    pub search_terms: Vec<String>,
}

impl HeadlineFeed {
    pub fn new(outlet: &str, url: &str, search_terms: &[&str]) -> Self {
        Self {
            outlet: outlet.to_string(),
            url: url.to_string(),
            search_terms: search_terms.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Whole-word match. All-caps terms (tickers) are case-sensitive, the
    /// rest are not.
    pub fn matches(&self, headline: &str) -> bool {
        let words: Vec<&str> = headline
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        self.search_terms.iter().any(|term| {
            let ticker = term.chars().all(|c| !c.is_lowercase());
            words.iter().any(|w| {
                if ticker {
                    *w == term.as_str()
                } else {
                    w.eq_ignore_ascii_case(term)
                }
            })
        })
    }
}

fn default_feeds() -> Vec<HeadlineFeed> {
    vec![
        HeadlineFeed::new(
            "CoinDesk",
            "https://www.coindesk.com/arc/outboundfeeds/rss/",
            &["solana", "SOL", "phantom", "jupiter", "jito"],
        ),
        HeadlineFeed::new("The Block", "https://www.theblock.co/rss.xml", &["solana", "SOL"]),
        HeadlineFeed::new("Decrypt", "https://decrypt.co/feed", &["solana", "SOL", "phantom"]),
    ]
}

#[derive(Debug, Clone)]
pub struct NewsEndpoints {
    pub cryptopanic: String,
    pub coingecko: String,
    pub feeds: Vec<HeadlineFeed>,
}

impl Default for NewsEndpoints {
    fn default() -> Self {
        Self {
            cryptopanic: "https://cryptopanic.com/api/free/v1".to_string(),
            coingecko: "https://api.coingecko.com/api/v3".to_string(),
            feeds: default_feeds(),
        }
    }
}

/// Crypto news, ecosystem metrics and outlet headlines.
pub struct NewsCollector {
    http: HttpFetcher,
    endpoints: NewsEndpoints,
}

impl Default for NewsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl NewsCollector {
    pub fn new() -> Self {
        Self {
            http: HttpFetcher::default(),
            endpoints: NewsEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: NewsEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.http = HttpFetcher::new(policy);
        self
    }

    async fn crypto_news(&self) -> Result<SubCollection> {
        let base = self.endpoints.cryptopanic.trim_end_matches('/');
        let response: CryptoPanicResponse = self
            .http
            .json(
                self.http.client().get(format!("{base}/posts/")).query(&[
                    ("auth_token", "free"),
                    ("currencies", "SOL"),
                    ("kind", "news"),
                    ("filter", "hot"),
                ]),
                "CryptoPanic posts",
            )
            .await?;

        let now = Utc::now();
        let mut signals = Vec::new();
        let mut raw = Vec::new();

        for post in response.results.iter().take(MAX_POSTS) {
            let outlet = post.source.as_ref().map(|s| s.title.as_str()).unwrap_or("Unknown");
            raw.push(json!({ "title": post.title, "link": post.url, "pubDate": post.published_at, "source": outlet }));

            let score = news_score(post, now);
            if score <= MIN_POST_SCORE {
                continue;
            }
            let votes = post
                .votes
                .as_ref()
                .map(|v| format!("Votes: +{} -{}", v.positive, v.negative))
                .unwrap_or_default();
            signals.push(self.create_signal(
                take_chars(&post.title, 100),
                &format!("Source: {outlet}. {votes}"),
                score as f64,
                json!({
                    "source": outlet,
                    "votes": post.votes.as_ref().map(|v| json!({ "positive": v.positive, "negative": v.negative })),
                    "publishedAt": post.published_at,
                    "kind": post.kind,
                }),
                post.url.as_deref(),
            ));
        }

        Ok(SubCollection::new(signals, Value::Array(raw)))
    }

    /// Emitted in place of the crypto-news sub-collection when it fails.
    fn news_monitoring_fallback(&self) -> SubCollection {
        let outlets: Vec<&str> = self.endpoints.feeds.iter().map(|f| f.outlet.as_str()).collect();
        SubCollection::new(
            vec![self.create_signal(
                "Solana Ecosystem News Monitoring",
                "Monitoring crypto news sources for Solana-related developments and narratives.",
                30.0,
                json!({ "status": "active", "sources": outlets }),
                None,
            )],
            Value::Array(Vec::new()),
        )
    }

    async fn ecosystem_updates(&self) -> Result<SubCollection> {
        let base = self.endpoints.coingecko.trim_end_matches('/');
        let detail: CoinDetail = self
            .http
            .json(
                self.http.client().get(format!("{base}/coins/solana")).query(&[
                    ("localization", "false"),
                    ("tickers", "false"),
                    ("community_data", "true"),
                    ("developer_data", "true"),
                ]),
                "CoinGecko coin detail",
            )
            .await?;

        let mut signals = Vec::new();

        if let Some(ref cd) = detail.community_data {
            signals.push(self.create_signal(
                "Solana Community Growth Metrics",
                &format!(
                    "Twitter followers: {}, Reddit subscribers: {}, Reddit active: {}.",
                    cd.twitter_followers.unwrap_or(0),
                    cd.reddit_subscribers.unwrap_or(0),
                    cd.reddit_accounts_active_48h.unwrap_or(0)
                ),
                50.0,
                json!({
                    "twitterFollowers": cd.twitter_followers,
                    "redditSubscribers": cd.reddit_subscribers,
                    "redditActive48h": cd.reddit_accounts_active_48h,
                }),
                None,
            ));
        }

        if let Some(ref dd) = detail.developer_data {
            let additions = dd
                .code_additions_deletions_4_weeks
                .as_ref()
                .and_then(|c| c.get("additions"))
                .map(|a| a.to_string())
                .unwrap_or_else(|| "N/A".into());
            signals.push(self.create_signal(
                "Solana Core Developer Activity",
                &format!(
                    "GitHub stars: {}, Forks: {}, Subscribers: {}. Code additions (4w): {additions}.",
                    dd.stars.unwrap_or(0),
                    dd.forks.unwrap_or(0),
                    dd.subscribers.unwrap_or(0)
                ),
                55.0,
                json!({
                    "stars": dd.stars,
                    "forks": dd.forks,
                    "subscribers": dd.subscribers,
                    "codeChanges4w": dd.code_additions_deletions_4_weeks,
                    "commitCount4w": dd.commit_count_4_weeks,
                }),
                Some("https://github.com/solana-labs/solana"),
            ));
        }

        if let Some(bullish) = detail.sentiment_votes_up_percentage.filter(|p| *p > 0.0) {
            let bearish = detail.sentiment_votes_down_percentage.unwrap_or(0.0);
            signals.push(self.create_signal(
                "SOL Community Sentiment",
                &format!("Bullish: {bullish:.1}%, Bearish: {bearish:.1}%."),
                if bullish > 70.0 { 65.0 } else { 45.0 },
                json!({ "bullish": bullish, "bearish": bearish }),
                None,
            ));
        }

        let raw = json!({
            "source": "coingecko_detail",
            "communityData": detail.community_data.is_some(),
            "developerData": detail.developer_data.is_some(),
            "sentiment": detail.sentiment_votes_up_percentage,
        });
        Ok(SubCollection::new(signals, raw))
    }

    async fn headline_feeds(&self) -> Result<SubCollection> {
        let fetches = self.endpoints.feeds.iter().map(|feed| async move {
            let outcome = self.fetch_feed(feed).await;
            (feed, outcome)
        });

        let mut signals = Vec::new();
        let mut raw = Map::new();
        for (feed, outcome) in join_all(fetches).await {
            let headlines = match outcome {
                Ok(headlines) => headlines,
                Err(e) => {
                    debug!(outlet = %feed.outlet, error = %e, "Skipping feed");
                    continue;
                }
            };
            raw.insert(feed.outlet.clone(), json!(headlines.len()));
            for headline in headlines {
                signals.push(self.create_signal(
                    &format!("{}: {}", feed.outlet, headline.title),
                    &format!("Headline from {} mentioning Solana ecosystem terms.", feed.outlet),
                    45.0,
                    json!({ "outlet": feed.outlet, "publishedAt": headline.published }),
                    headline.link.as_deref(),
                ));
            }
        }

        Ok(SubCollection::new(signals, Value::Object(raw)))
    }

    async fn fetch_feed(&self, feed: &HeadlineFeed) -> Result<Vec<Headline>> {
        let bytes = self
            .http
            .bytes(self.http.client().get(&feed.url), &feed.outlet)
            .await?;
        let parsed = feed_rs::parser::parse(&bytes[..]).context("Failed to parse RSS/Atom feed")?;

        Ok(parsed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let title = entry.title.map(|t| t.content.trim().to_string())?;
                if !feed.matches(&title) {
                    return None;
                }
                Some(Headline {
                    title,
                    link: entry.links.first().map(|l| l.href.clone()),
                    published: entry.published.or(entry.updated),
                })
            })
            .take(HEADLINES_PER_FEED)
            .collect())
    }
}

#[async_trait]
impl Collector for NewsCollector {
    fn source(&self) -> SignalSource {
        SignalSource::News
    }

    fn name(&self) -> &str {
        "News & Research Collector"
    }

    async fn collect(&self) -> Result<CollectorResult> {
        let (news, ecosystem, headlines) =
            tokio::join!(self.crypto_news(), self.ecosystem_updates(), self.headline_feeds());

        let news = news.or_else(|e| {
            warn!(collector = self.name(), error = %e, "Crypto news failed, using monitoring fallback");
            Ok::<_, anyhow::Error>(self.news_monitoring_fallback())
        });

        let mut result = CollectorResult::default();
        result.absorb(self.name(), "news", news);
        result.absorb(self.name(), "ecosystem", ecosystem);
        result.absorb(self.name(), "headlines", headlines);

        info!(collector = self.name(), signals = result.signals.len(), "News collection finished");
        Ok(result)
    }
}

/// Score a news post: base 30, +3 per positive vote, -2 per negative,
/// +20 if under 6 h old (+10 under 24 h), +10 for a major outlet. Clamped
/// to `0..=95`.
pub fn news_score(post: &NewsPost, now: DateTime<Utc>) -> u8 {
    let mut score: i64 = 30;

    if let Some(ref votes) = post.votes {
        score += votes.positive as i64 * 3;
        score -= votes.negative as i64 * 2;
    }

    if let Some(published) = post.published_at {
        let hours = (now - published).num_minutes() as f64 / 60.0;
        if hours < 6.0 {
            score += 20;
        } else if hours < 24.0 {
            score += 10;
        }
    }

    let major = post.source.as_ref().is_some_and(|s| {
        let outlet = s.title.to_lowercase();
        MAJOR_OUTLETS.iter().any(|m| outlet.contains(m))
    });
    if major {
        score += 10;
    }

    clamp_score(score.clamp(0, 95) as f64)
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

struct Headline {
    title: String,
    link: Option<String>,
    published: Option<DateTime<Utc>>,
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct CryptoPanicResponse {
    #[serde(default)]
    results: Vec<NewsPost>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsPost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<NewsOutlet>,
    #[serde(default)]
    pub votes: Option<NewsVotes>,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsOutlet {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NewsVotes {
    #[serde(default)]
    pub positive: u32,
    #[serde(default)]
    pub negative: u32,
}

#[derive(Debug, Deserialize)]
struct CoinDetail {
    #[serde(default)]
    community_data: Option<CommunityData>,
    #[serde(default)]
    developer_data: Option<DeveloperData>,
    #[serde(default)]
    sentiment_votes_up_percentage: Option<f64>,
    #[serde(default)]
    sentiment_votes_down_percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CommunityData {
    #[serde(default)]
    twitter_followers: Option<u64>,
    #[serde(default)]
    reddit_subscribers: Option<u64>,
    #[serde(default)]
    reddit_accounts_active_48h: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DeveloperData {
    #[serde(default)]
    stars: Option<u64>,
    #[serde(default)]
    forks: Option<u64>,
    #[serde(default)]
    subscribers: Option<u64>,
    #[serde(default)]
    code_additions_deletions_4_weeks: Option<Map<String, Value>>,
    #[serde(default)]
    commit_count_4_weeks: Option<u64>,
}
