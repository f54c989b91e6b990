use std::time::Duration;

use serde_json::json;
use trendscout_collectors::news::{HeadlineFeed, NewsEndpoints};
use trendscout_collectors::onchain::OnchainEndpoints;
use trendscout_collectors::social::SocialEndpoints;
use trendscout_collectors::{
    Collector, GithubCollector, NewsCollector, OnchainCollector, RetryPolicy, SocialCollector,
};
use trendscout_common::{Signal, SignalSource};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
    }
}

fn titles(signals: &[Signal]) -> Vec<String> {
    signals.iter().map(|s| s.title().to_string()).collect()
}

#[tokio::test]
async fn onchain_keeps_defillama_when_rpc_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/llama/v2/chains"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "Ethereum", "tvl": 6.0e10 },
            { "name": "Solana", "tvl": 6.0e9, "chainId": null }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/llama/protocols"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "Jito", "tvl": 2.0e9, "category": "Liquid Staking", "chains": ["Solana"], "change_7d": 25.0, "url": "https://jito.network" },
            { "name": "Kamino", "tvl": 1.5e9, "category": "Lending", "chains": ["Solana"], "change_7d": 3.0 },
            { "name": "Lido", "tvl": 3.0e10, "category": "Liquid Staking", "chains": ["Ethereum"], "change_7d": 40.0 }
        ])))
        .mount(&server)
        .await;

    let collector = OnchainCollector::new(None)
        .with_endpoints(OnchainEndpoints {
            helius_rpc: format!("{}/helius", server.uri()),
            public_rpc: format!("{}/rpc", server.uri()),
            defillama: format!("{}/llama", server.uri()),
        })
        .with_retry_policy(fast_policy());

    let result = collector.collect().await.unwrap();
    let titles = titles(&result.signals);

    assert_eq!(
        titles,
        vec!["Solana DeFi TVL", "Jito TVL Surge", "Solana DeFi Category Distribution"]
    );
    assert!(result.signals.iter().all(|s| s.source() == SignalSource::Onchain));
    assert_eq!(result.signals[0].score(), 70);
    assert_eq!(result.signals[1].score(), 75);
    assert!(result.raw_data.contains_key("defillama"));
    assert!(!result.raw_data.contains_key("public"));
}

#[tokio::test]
async fn github_keeps_orgs_and_topics_when_trending_fails() {
    let server = MockServer::start().await;
    let pushed = chrono::Utc::now().to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("sort", "stars"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("sort", "updated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "items": [{ "name": "anchor", "full_name": "coral-xyz/anchor", "stargazers_count": 4000, "html_url": "https://github.com/coral-xyz/anchor" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/orgs/[^/]+/repos$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "fresh", "stargazers_count": 12, "pushed_at": pushed },
            { "name": "stale", "stargazers_count": 3, "pushed_at": "2020-01-01T00:00:00Z" }
        ])))
        .mount(&server)
        .await;

    let collector = GithubCollector::new(Some("ghp_test".into()))
        .with_api_base(server.uri())
        .with_retry_policy(fast_policy())
        .with_pacing(Duration::ZERO, Duration::ZERO);

    let result = collector.collect().await.unwrap();
    let titles = titles(&result.signals);

    assert!(titles.iter().all(|t| !t.starts_with("Trending:")));
    assert_eq!(titles.iter().filter(|t| t.ends_with("Active Development")).count(), 6);
    assert!(titles.contains(&"Solana Topic Activity on GitHub".to_string()));

    let org_signal = result
        .signals
        .iter()
        .find(|s| s.title() == "solana-labs Active Development")
        .unwrap();
    assert_eq!(org_signal.score(), 50);
}

#[tokio::test]
async fn news_falls_back_when_cryptopanic_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/panic/posts/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gecko/coins/solana"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "community_data": { "twitter_followers": 3000000, "reddit_subscribers": 300000 },
            "sentiment_votes_up_percentage": 82.5,
            "sentiment_votes_down_percentage": 17.5
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feeds/decrypt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Decrypt</title>
<item><title>Solana memecoin volume doubles</title><link>https://decrypt.co/1</link></item>
<item><title>Ethereum gas hits new low</title><link>https://decrypt.co/2</link></item>
</channel></rss>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feeds/broken"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let collector = NewsCollector::new()
        .with_endpoints(NewsEndpoints {
            cryptopanic: format!("{}/panic", server.uri()),
            coingecko: format!("{}/gecko", server.uri()),
            feeds: vec![
                HeadlineFeed::new("Decrypt", &format!("{}/feeds/decrypt", server.uri()), &["solana", "SOL"]),
                HeadlineFeed::new("Broken", &format!("{}/feeds/broken", server.uri()), &["solana"]),
            ],
        })
        .with_retry_policy(fast_policy());

    let result = collector.collect().await.unwrap();
    let titles = titles(&result.signals);

    assert!(titles.contains(&"Solana Ecosystem News Monitoring".to_string()));
    assert!(titles.contains(&"Solana Community Growth Metrics".to_string()));
    assert!(titles.contains(&"SOL Community Sentiment".to_string()));
    assert!(titles.contains(&"Decrypt: Solana memecoin volume doubles".to_string()));
    assert!(!titles.iter().any(|t| t.contains("Ethereum gas")));

    let sentiment = result
        .signals
        .iter()
        .find(|s| s.title() == "SOL Community Sentiment")
        .unwrap();
    assert_eq!(sentiment.score(), 65);
}

#[tokio::test]
async fn social_keeps_reddit_when_coingecko_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/gecko/.*"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reddit/r/solana/hot.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "children": [
                { "data": { "title": "Firedancer mainnet date", "score": 420, "num_comments": 12, "permalink": "/r/solana/1", "author": "a" } },
                { "data": { "title": "Quiet post", "score": 3, "num_comments": 1, "permalink": "/r/solana/2", "author": "b" } }
            ] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reddit/r/solanadev/hot.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let collector = SocialCollector::new(None)
        .with_endpoints(SocialEndpoints {
            lunarcrush: format!("{}/lunar", server.uri()),
            coingecko: format!("{}/gecko", server.uri()),
            reddit: format!("{}/reddit", server.uri()),
        })
        .with_retry_policy(fast_policy())
        .with_subreddit_delay(Duration::ZERO);

    let result = collector.collect().await.unwrap();

    assert_eq!(titles(&result.signals), vec!["r/solana: Firedancer mainnet date"]);
    // 30 + 420/10 + 12, capped at 75
    assert_eq!(result.signals[0].score(), 75);
}
