use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use trendscout_common::SignalSource;

use crate::collector::{Collector, CollectorResult, SubCollection};
use crate::http::{HttpFetcher, RetryPolicy};

const SUBREDDITS: &[&str] = &["solana", "solanadev"];
const POSTS_CONSIDERED: usize = 5;

#[derive(Debug, Clone)]
pub struct SocialEndpoints {
    pub lunarcrush: String,
    pub coingecko: String,
    pub reddit: String,
}

impl Default for SocialEndpoints {
    fn default() -> Self {
        Self {
            lunarcrush: "https://lunarcrush.com/api4/public".to_string(),
            coingecko: "https://api.coingecko.com/api/v3".to_string(),
            reddit: "https://www.reddit.com".to_string(),
        }
    }
}

/// Social sentiment, market trending lists and community discussion.
pub struct SocialCollector {
    http: HttpFetcher,
    lunarcrush_api_key: Option<String>,
    endpoints: SocialEndpoints,
    subreddit_delay: Duration,
}

impl SocialCollector {
    pub fn new(lunarcrush_api_key: Option<String>) -> Self {
        Self {
            http: HttpFetcher::default(),
            lunarcrush_api_key,
            endpoints: SocialEndpoints::default(),
            subreddit_delay: Duration::from_secs(1),
        }
    }

    pub fn with_endpoints(mut self, endpoints: SocialEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.http = HttpFetcher::new(policy);
        self
    }

    pub fn with_subreddit_delay(mut self, delay: Duration) -> Self {
        self.subreddit_delay = delay;
        self
    }

    async fn lunarcrush(&self, api_key: &str) -> Result<SubCollection> {
        let base = self.endpoints.lunarcrush.trim_end_matches('/');
        let coin: LunarCoin = self
            .http
            .json(
                self.http.client().get(format!("{base}/coins/sol/v1")).bearer_auth(api_key),
                "LunarCrush coin",
            )
            .await?;

        let mut signals = Vec::new();
        if let Some(ref d) = coin.data {
            let show = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into());
            signals.push(self.create_signal(
                "SOL Social Sentiment",
                &format!(
                    "Social volume: {}, Sentiment: {}/5. Galaxy Score: {}/100.",
                    show(d.social_volume),
                    show(d.sentiment),
                    show(d.galaxy_score)
                ),
                d.galaxy_score.filter(|s| *s > 0.0).unwrap_or(50.0),
                json!({
                    "socialVolume": d.social_volume,
                    "sentiment": d.sentiment,
                    "galaxyScore": d.galaxy_score,
                    "socialDominance": d.social_dominance,
                }),
                Some("https://lunarcrush.com/coins/sol"),
            ));
        }

        // Trending list is diagnostic only.
        let trending: Option<Value> = self
            .http
            .json(
                self.http
                    .client()
                    .get(format!("{base}/coins/list/v1"))
                    .query(&[("sort", "social_volume"), ("desc", "true"), ("limit", "20")])
                    .bearer_auth(api_key),
                "LunarCrush trending",
            )
            .await
            .ok();

        Ok(SubCollection::new(
            signals,
            json!({ "sol": coin.data.is_some(), "trending": trending.is_some() }),
        ))
    }

    async fn coingecko(&self) -> Result<SubCollection> {
        let base = self.endpoints.coingecko.trim_end_matches('/');
        let mut signals = Vec::new();

        let trending: TrendingResponse = self
            .http
            .json(self.http.client().get(format!("{base}/search/trending")), "CoinGecko trending")
            .await?;
        let solana_coins: Vec<&TrendingItem> = trending
            .coins
            .iter()
            .map(|c| &c.item)
            .filter(|item| item.is_solana_ecosystem())
            .collect();

        for coin in &solana_coins {
            let rank = coin
                .market_cap_rank
                .map(|r| r.to_string())
                .unwrap_or_else(|| "N/A".into());
            signals.push(self.create_signal(
                &format!("Trending on CoinGecko: {}", coin.name),
                &format!("{} ({}) is trending. Market cap rank: #{rank}.", coin.name, coin.symbol),
                65.0,
                json!({ "name": coin.name, "symbol": coin.symbol, "marketCapRank": coin.market_cap_rank }),
                Some(&format!("https://www.coingecko.com/en/coins/{}", coin.id)),
            ));
        }

        signals.push(self.create_signal(
            "CoinGecko Trending Overview",
            &format!(
                "{} coins currently trending. {} are Solana ecosystem tokens.",
                trending.coins.len(),
                solana_coins.len()
            ),
            if solana_coins.len() > 2 { 70.0 } else { 40.0 },
            json!({ "totalTrending": trending.coins.len(), "solanaTrending": solana_coins.len() }),
            None,
        ));

        let prices: HashMap<String, SimplePrice> = self
            .http
            .json(
                self.http.client().get(format!("{base}/simple/price")).query(&[
                    ("ids", "solana"),
                    ("vs_currencies", "usd"),
                    ("include_24hr_change", "true"),
                    ("include_market_cap", "true"),
                    ("include_24hr_vol", "true"),
                ]),
                "CoinGecko price",
            )
            .await?;
        if let Some(sol) = prices.get("solana") {
            signals.push(self.create_signal(
                "SOL Market Overview",
                &format!(
                    "SOL price: ${:.2}. 24h change: {:.2}%. Market cap: ${:.2}B. 24h volume: ${:.2}B.",
                    sol.usd,
                    sol.usd_24h_change,
                    sol.usd_market_cap / 1e9,
                    sol.usd_24h_vol / 1e9
                ),
                55.0,
                json!({
                    "price": sol.usd,
                    "change24h": sol.usd_24h_change,
                    "marketCap": sol.usd_market_cap,
                    "volume24h": sol.usd_24h_vol,
                }),
                None,
            ));
        }

        Ok(SubCollection::new(
            signals,
            json!({ "trending": trending.coins.len(), "solPrice": prices.contains_key("solana") }),
        ))
    }

    async fn reddit(&self) -> Result<SubCollection> {
        let base = self.endpoints.reddit.trim_end_matches('/');
        let mut signals = Vec::new();
        let mut raw = Map::new();

        for (i, sub) in SUBREDDITS.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.subreddit_delay).await;
            }

            let listing: RedditListing = match self
                .http
                .json(
                    self.http
                        .client()
                        .get(format!("{base}/r/{sub}/hot.json"))
                        .query(&[("limit", "10")]),
                    "Reddit listing",
                )
                .await
            {
                Ok(listing) => listing,
                Err(e) => {
                    debug!(subreddit = sub, error = %e, "Skipping subreddit");
                    continue;
                }
            };

            let posts: Vec<RedditPost> = listing.data.children.into_iter().map(|c| c.data).collect();
            raw.insert(
                sub.to_string(),
                Value::Array(
                    posts
                        .iter()
                        .map(|p| json!({ "title": p.title, "score": p.score, "comments": p.num_comments }))
                        .collect(),
                ),
            );

            for post in posts.iter().take(POSTS_CONSIDERED).filter(|p| p.is_high_engagement()) {
                let excerpt = if post.selftext.is_empty() {
                    String::new()
                } else {
                    format!("{}...", take_chars(&post.selftext, 120))
                };
                signals.push(self.create_signal(
                    &format!("r/{sub}: {}", take_chars(&post.title, 80)),
                    &format!("{} upvotes, {} comments. {excerpt}", post.score, post.num_comments),
                    reddit_score(post.score, post.num_comments),
                    json!({
                        "subreddit": sub,
                        "score": post.score,
                        "comments": post.num_comments,
                        "author": post.author,
                    }),
                    Some(&format!("https://reddit.com{}", post.permalink)),
                ));
            }
        }

        Ok(SubCollection::new(signals, Value::Object(raw)))
    }
}

#[async_trait]
impl Collector for SocialCollector {
    fn source(&self) -> SignalSource {
        SignalSource::Social
    }

    fn name(&self) -> &str {
        "Social Signals Collector"
    }

    async fn collect(&self) -> Result<CollectorResult> {
        let lunarcrush = async {
            match self.lunarcrush_api_key.as_deref() {
                Some(key) => Some(self.lunarcrush(key).await),
                None => None,
            }
        };
        let (lunarcrush, coingecko, reddit) = tokio::join!(lunarcrush, self.coingecko(), self.reddit());

        let mut result = CollectorResult::default();
        if let Some(lunarcrush) = lunarcrush {
            result.absorb(self.name(), "lunarcrush", lunarcrush);
        }
        result.absorb(self.name(), "coingecko", coingecko);
        result.absorb(self.name(), "reddit", reddit);

        info!(collector = self.name(), signals = result.signals.len(), "Social collection finished");
        Ok(result)
    }
}

fn reddit_score(upvotes: i64, comments: u64) -> f64 {
    let score = 30 + upvotes.div_euclid(10) + comments as i64;
    score.min(75) as f64
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct LunarCoin {
    #[serde(default)]
    data: Option<LunarMetrics>,
}

#[derive(Debug, Deserialize)]
struct LunarMetrics {
    #[serde(default)]
    social_volume: Option<f64>,
    #[serde(default)]
    sentiment: Option<f64>,
    #[serde(default)]
    galaxy_score: Option<f64>,
    #[serde(default)]
    social_dominance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    coins: Vec<TrendingCoin>,
}

#[derive(Debug, Deserialize)]
struct TrendingCoin {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    market_cap_rank: Option<u64>,
    #[serde(default)]
    platforms: Map<String, Value>,
}

impl TrendingItem {
    fn is_solana_ecosystem(&self) -> bool {
        let on_solana = self
            .platforms
            .get("solana")
            .is_some_and(|v| !v.is_null() && v.as_str() != Some(""));
        on_solana || self.name.to_lowercase().contains("solana") || self.id.contains("solana")
    }
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    #[serde(default)]
    usd: f64,
    #[serde(default)]
    usd_24h_change: f64,
    #[serde(default)]
    usd_market_cap: f64,
    #[serde(default)]
    usd_24h_vol: f64,
}

#[derive(Debug, Deserialize)]
struct RedditListing {
    data: RedditListingData,
}

#[derive(Debug, Deserialize)]
struct RedditListingData {
    #[serde(default)]
    children: Vec<RedditChild>,
}

#[derive(Debug, Deserialize)]
struct RedditChild {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    #[serde(default)]
    title: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    author: String,
}

impl RedditPost {
    fn is_high_engagement(&self) -> bool {
        self.score > 50 || self.num_comments > 20
    }
}
