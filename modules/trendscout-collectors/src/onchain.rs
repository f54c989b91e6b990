use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use trendscout_common::SignalSource;

use crate::collector::{Collector, CollectorResult, SubCollection};
use crate::http::{HttpFetcher, RetryPolicy};

const LAMPORTS_PER_SOL: f64 = 1e9;
const TOP_PROTOCOLS: usize = 15;
const SURGE_CANDIDATES: usize = 10;
const SURGE_THRESHOLD_PCT: f64 = 20.0;

/// Upstream base URLs, overridable so tests can point at a mock server.
#[derive(Debug, Clone)]
pub struct OnchainEndpoints {
    pub helius_rpc: String,
    pub public_rpc: String,
    pub defillama: String,
}

impl Default for OnchainEndpoints {
    fn default() -> Self {
        Self {
            helius_rpc: "https://mainnet.helius-rpc.com/".to_string(),
            public_rpc: "https://api.mainnet-beta.solana.com".to_string(),
            defillama: "https://api.llama.fi".to_string(),
        }
    }
}

/// Network health, supply and DeFi TVL for Solana.
pub struct OnchainCollector {
    http: HttpFetcher,
    helius_api_key: Option<String>,
    endpoints: OnchainEndpoints,
}

impl OnchainCollector {
    pub fn new(helius_api_key: Option<String>) -> Self {
        Self {
            http: HttpFetcher::default(),
            helius_api_key,
            endpoints: OnchainEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: OnchainEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.http = HttpFetcher::new(policy);
        self
    }

    /// One JSON-RPC 2.0 call; `None` when the node returns no `result`.
    async fn rpc<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
        params: Option<Value>,
    ) -> Result<Option<T>> {
        let mut body = json!({ "jsonrpc": "2.0", "id": 1, "method": method });
        if let Some(params) = params {
            body["params"] = params;
        }
        let resp: RpcResponse<T> = self.http.json(request.json(&body), method).await?;
        Ok(resp.result)
    }

    async fn collect_helius(&self, api_key: &str) -> Result<SubCollection> {
        let url = &self.endpoints.helius_rpc;
        let helius = || self.http.client().post(url).query(&[("api-key", api_key)]);
        let mut signals = Vec::new();

        let samples: Vec<PerformanceSample> = self
            .rpc(helius(), "getRecentPerformanceSamples", Some(json!([10])))
            .await?
            .unwrap_or_default();
        if !samples.is_empty() {
            let avg_tps = average_tps(&samples);
            let (load, score) = if avg_tps > 3000.0 {
                ("high", 75.0)
            } else if avg_tps > 2000.0 {
                ("moderate", 55.0)
            } else {
                ("normal", 35.0)
            };
            signals.push(self.create_signal(
                "Solana Network TPS Activity",
                &format!(
                    "Current average TPS: {}. Network is processing transactions at {load} capacity.",
                    avg_tps.round()
                ),
                score,
                json!({ "avgTps": avg_tps.round(), "samples": samples.len() }),
                Some("https://solscan.io"),
            ));
        }

        let epoch: Option<EpochInfo> = self.rpc(helius(), "getEpochInfo", None).await?;
        if let Some(ref epoch) = epoch {
            let progress = if epoch.slots_in_epoch > 0 {
                (epoch.slot_index as f64 / epoch.slots_in_epoch as f64 * 100.0).round()
            } else {
                0.0
            };
            signals.push(self.create_signal(
                "Solana Epoch Progress",
                &format!(
                    "Current epoch: {}, slot height: {}. {progress}% through current epoch.",
                    epoch.epoch, epoch.absolute_slot
                ),
                40.0,
                json!({ "epoch": epoch.epoch, "slotHeight": epoch.absolute_slot }),
                Some("https://solscan.io"),
            ));
        }

        Ok(SubCollection::new(
            signals,
            json!({ "performanceSamples": samples.len(), "epoch": epoch.map(|e| e.epoch) }),
        ))
    }

    async fn collect_public(&self) -> Result<SubCollection> {
        let rpc = || self.http.client().post(&self.endpoints.public_rpc);
        let mut signals = Vec::new();
        let mut raw = serde_json::Map::new();

        let supply: Option<SupplyResult> = self.rpc(rpc(), "getSupply", None).await?;
        if let Some(supply) = supply.map(|s| s.value) {
            raw.insert("supply".into(), json!({ "circulating": supply.circulating, "total": supply.total }));
            signals.push(self.create_signal(
                "SOL Supply Metrics",
                &format!(
                    "Circulating supply: {} SOL. Non-circulating: {} SOL.",
                    (supply.circulating as f64 / LAMPORTS_PER_SOL).round(),
                    (supply.non_circulating as f64 / LAMPORTS_PER_SOL).round()
                ),
                35.0,
                json!({ "circulatingLamports": supply.circulating, "totalLamports": supply.total }),
                None,
            ));
        }

        let votes: Option<VoteAccounts> = self.rpc(rpc(), "getVoteAccounts", None).await?;
        if let Some(votes) = votes {
            let active = votes.current.len();
            let delinquent = votes.delinquent.len();
            raw.insert("validators".into(), json!({ "active": active, "delinquent": delinquent }));
            let (health, score) = if active > 2000 { ("strong", 60.0) } else { ("moderate", 40.0) };
            signals.push(self.create_signal(
                "Solana Validator Network Health",
                &format!(
                    "{active} active validators, {delinquent} delinquent. Network decentralization is {health}."
                ),
                score,
                json!({ "activeValidators": active, "delinquentValidators": delinquent }),
                Some("https://www.validators.app"),
            ));
        }

        Ok(SubCollection::new(signals, Value::Object(raw)))
    }

    async fn collect_defillama(&self) -> Result<SubCollection> {
        let base = self.endpoints.defillama.trim_end_matches('/');
        let mut signals = Vec::new();
        let mut raw = serde_json::Map::new();

        let chains: Vec<ChainTvl> = self
            .http
            .json(self.http.client().get(format!("{base}/v2/chains")), "DeFiLlama chains")
            .await?;
        if let Some(solana) = chains.into_iter().find(|c| c.name == "Solana") {
            raw.insert("tvl".into(), json!({ "tvl": solana.tvl, "chainId": solana.chain_id }));
            signals.push(self.create_signal(
                "Solana DeFi TVL",
                &format!(
                    "Current TVL: ${:.2}B. Solana ranks among top DeFi chains by total value locked.",
                    solana.tvl / 1e9
                ),
                if solana.tvl > 5e9 { 70.0 } else { 50.0 },
                json!({ "tvl": solana.tvl, "chainId": solana.chain_id }),
                Some("https://defillama.com/chain/Solana"),
            ));
        }

        let protocols: Vec<Protocol> = self
            .http
            .json(self.http.client().get(format!("{base}/protocols")), "DeFiLlama protocols")
            .await?;
        let top = top_solana_protocols(protocols);
        raw.insert(
            "topProtocols".into(),
            Value::Array(
                top.iter()
                    .map(|p| json!({ "name": p.name, "tvl": p.tvl, "category": p.category, "change_7d": p.change_7d }))
                    .collect(),
            ),
        );

        for protocol in top.iter().take(SURGE_CANDIDATES) {
            let Some(change) = protocol.change_7d.filter(|c| *c > SURGE_THRESHOLD_PCT) else {
                continue;
            };
            let category = protocol.category.as_deref().unwrap_or("Unknown");
            let tvl = protocol.tvl.unwrap_or(0.0);
            signals.push(self.create_signal(
                &format!("{} TVL Surge", protocol.name),
                &format!(
                    "{} ({category}) saw {change:.1}% TVL increase in 7 days. Current TVL: ${:.1}M.",
                    protocol.name,
                    tvl / 1e6
                ),
                (50.0 + change).min(90.0),
                json!({ "name": protocol.name, "category": category, "tvl": tvl, "change7d": change }),
                protocol.url.as_deref(),
            ));
        }

        let categories = top_categories(&top, 5);
        let summary = categories
            .iter()
            .map(|(cat, tvl)| format!("{cat}: ${:.0}M", tvl / 1e6))
            .collect::<Vec<_>>()
            .join(", ");
        let category_map: serde_json::Map<String, Value> =
            categories.into_iter().map(|(cat, tvl)| (cat, json!(tvl))).collect();
        signals.push(self.create_signal(
            "Solana DeFi Category Distribution",
            &format!("Top DeFi categories by TVL: {summary}"),
            55.0,
            json!({ "categories": category_map }),
            None,
        ));

        Ok(SubCollection::new(signals, Value::Object(raw)))
    }
}

#[async_trait]
impl Collector for OnchainCollector {
    fn source(&self) -> SignalSource {
        SignalSource::Onchain
    }

    fn name(&self) -> &str {
        "Solana Onchain Collector"
    }

    async fn collect(&self) -> Result<CollectorResult> {
        let helius = async {
            match self.helius_api_key.as_deref() {
                Some(key) => Some(self.collect_helius(key).await),
                None => None,
            }
        };
        let (helius, public, defillama) =
            tokio::join!(helius, self.collect_public(), self.collect_defillama());

        let mut result = CollectorResult::default();
        if let Some(helius) = helius {
            result.absorb(self.name(), "helius", helius.context("Helius RPC"));
        }
        result.absorb(self.name(), "public", public);
        result.absorb(self.name(), "defillama", defillama);

        info!(collector = self.name(), signals = result.signals.len(), "Onchain collection finished");
        Ok(result)
    }
}

fn average_tps(samples: &[PerformanceSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples
        .iter()
        .filter(|s| s.sample_period_secs > 0)
        .map(|s| s.num_transactions as f64 / s.sample_period_secs as f64)
        .sum();
    total / samples.len() as f64
}

/// Solana protocols ordered by TVL, largest first.
fn top_solana_protocols(protocols: Vec<Protocol>) -> Vec<Protocol> {
    let mut solana: Vec<Protocol> = protocols
        .into_iter()
        .filter(|p| p.chains.iter().any(|c| c == "Solana"))
        .collect();
    solana.sort_by(|a, b| b.tvl.unwrap_or(0.0).total_cmp(&a.tvl.unwrap_or(0.0)));
    solana.truncate(TOP_PROTOCOLS);
    solana
}

fn top_categories(protocols: &[Protocol], n: usize) -> Vec<(String, f64)> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for p in protocols {
        if let Some(ref category) = p.category {
            *totals.entry(category.clone()).or_default() += p.tvl.unwrap_or(0.0);
        }
    }
    let mut ranked: Vec<(String, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

// --- Wire types ---

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceSample {
    num_transactions: u64,
    sample_period_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpochInfo {
    epoch: u64,
    absolute_slot: u64,
    slot_index: u64,
    slots_in_epoch: u64,
}

#[derive(Debug, Deserialize)]
struct SupplyResult {
    value: Supply,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Supply {
    circulating: u64,
    non_circulating: u64,
    total: u64,
}

#[derive(Debug, Default, Deserialize)]
struct VoteAccounts {
    #[serde(default)]
    current: Vec<Value>,
    #[serde(default)]
    delinquent: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ChainTvl {
    name: String,
    #[serde(default)]
    tvl: f64,
    #[serde(rename = "chainId", default)]
    chain_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Protocol {
    name: String,
    #[serde(default)]
    tvl: Option<f64>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    chains: Vec<String>,
    #[serde(default)]
    change_7d: Option<f64>,
    #[serde(default)]
    url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol(name: &str, tvl: f64, category: &str, chains: &[&str]) -> Protocol {
        Protocol {
            name: name.into(),
            tvl: Some(tvl),
            category: Some(category.into()),
            chains: chains.iter().map(|c| c.to_string()).collect(),
            change_7d: None,
            url: None,
        }
    }

    #[test]
    fn average_tps_skips_zero_periods() {
        let samples = vec![
            PerformanceSample { num_transactions: 180_000, sample_period_secs: 60 },
            PerformanceSample { num_transactions: 5, sample_period_secs: 0 },
        ];
        assert_eq!(average_tps(&samples), 1500.0);
    }

    #[test]
    fn only_solana_protocols_ranked_by_tvl() {
        let top = top_solana_protocols(vec![
            protocol("Eth Only", 9e9, "Dexes", &["Ethereum"]),
            protocol("Small", 1e6, "Lending", &["Solana"]),
            protocol("Big", 2e9, "Dexes", &["Solana", "Ethereum"]),
        ]);
        let names: Vec<&str> = top.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Big", "Small"]);
    }

    #[test]
    fn categories_are_summed() {
        let protocols = vec![
            protocol("A", 3e8, "Dexes", &["Solana"]),
            protocol("B", 2e8, "Dexes", &["Solana"]),
            protocol("C", 4e8, "Lending", &["Solana"]),
        ];
        let categories = top_categories(&protocols, 5);
        assert_eq!(categories[0], ("Dexes".to_string(), 5e8));
        assert_eq!(categories[1], ("Lending".to_string(), 4e8));
    }
}
