pub mod collector;
pub mod github;
pub mod http;
pub mod manager;
pub mod news;
pub mod onchain;
pub mod social;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use collector::{Collector, CollectorResult, SubCollection};
pub use github::GithubCollector;
pub use http::{fetch_with_retry, HttpFetcher, RetryPolicy};
pub use manager::{CollectionOutcome, CollectorManager};
pub use news::NewsCollector;
pub use onchain::OnchainCollector;
pub use social::SocialCollector;
