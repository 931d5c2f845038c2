use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::sleep;
use url::Url;

use crate::constants::{
    ETH_PRICE_TTL_SECS, PRICE_SOURCE_PAUSE_MS, PRICE_TIMEOUT_SECS, TOKEN_PRICE_TTL_SECS,
};
use crate::services::http::HttpClient;

#[derive(Debug, Clone, Copy)]
struct PriceEntry {
    usd: f64,
    fetched_at: Instant,
}

fn is_fresh(entry: &PriceEntry, now: Instant, ttl: Duration) -> bool {
    now.duration_since(entry.fetched_at) < ttl
}

// Internal helper that reads a usable ETH price out of either upstream
// response shape (CoinGecko simple-price or DefiLlama current-price).
fn extract_eth_price(body: &Value) -> Option<f64> {
    let direct = body.pointer("/ethereum/usd").and_then(Value::as_f64);
    let llama = body
        .pointer("/coins/coingecko:ethereum/price")
        .and_then(Value::as_f64);
    direct
        .or(llama)
        .filter(|price| price.is_finite() && *price > 0.0)
}

/// USD price source with the only caches in the system: one ETH/USD entry
/// with a 5-minute window, and a per-contract token price map with a 2-minute
/// window. Both are read-check-then-write behind an RwLock because the
/// runtime is multi-threaded.
pub struct PriceOracle {
    http: HttpClient,
    coingecko_base: String,
    llama_url: String,
    eth_ttl: Duration,
    token_ttl: Duration,
    eth: RwLock<Option<PriceEntry>>,
    tokens: RwLock<HashMap<String, PriceEntry>>,
}

impl PriceOracle {
    pub fn new(http: HttpClient, coingecko_base: String, llama_url: String) -> Self {
        Self::with_ttls(
            http,
            coingecko_base,
            llama_url,
            Duration::from_secs(ETH_PRICE_TTL_SECS),
            Duration::from_secs(TOKEN_PRICE_TTL_SECS),
        )
    }

    /// Constructor with explicit freshness windows.
    pub fn with_ttls(
        http: HttpClient,
        coingecko_base: String,
        llama_url: String,
        eth_ttl: Duration,
        token_ttl: Duration,
    ) -> Self {
        Self {
            http,
            coingecko_base,
            llama_url,
            eth_ttl,
            token_ttl,
            eth: RwLock::new(None),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Current ETH/USD rate. A fresh cached value short-circuits without any
    /// network call; otherwise the two upstreams are tried in order, pausing
    /// 300ms after a request failure. Total failure returns the last cached
    /// value, else 0.0. Never negative, never NaN.
    pub async fn eth_usd(&self) -> f64 {
        let now = Instant::now();
        if let Some(entry) = *self.eth.read().await {
            if is_fresh(&entry, now, self.eth_ttl) {
                return entry.usd;
            }
        }

        let sources = [
            format!(
                "{}/simple/price?ids=ethereum&vs_currencies=usd",
                self.coingecko_base.trim_end_matches('/')
            ),
            self.llama_url.clone(),
        ];

        for url in &sources {
            match self
                .http
                .get(url, Duration::from_secs(PRICE_TIMEOUT_SECS))
                .await
            {
                Ok(res) if res.status().is_success() => {
                    let body: Value = match res.json().await {
                        Ok(body) => body,
                        Err(_) => continue,
                    };
                    if let Some(price) = extract_eth_price(&body) {
                        *self.eth.write().await = Some(PriceEntry {
                            usd: price,
                            fetched_at: Instant::now(),
                        });
                        return price;
                    }
                }
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!("price source {} failed: {}", url, err);
                    sleep(Duration::from_millis(PRICE_SOURCE_PAUSE_MS)).await;
                }
            }
        }

        // stale-but-present beats nothing at all
        self.eth.read().await.map(|entry| entry.usd).unwrap_or(0.0)
    }

    /// USD price of an ERC-20 token by contract address, with the 2-minute
    /// per-contract cache. Unpriceable tokens resolve to 0.0.
    pub async fn usd_by_contract(&self, contract: &str) -> f64 {
        let key = contract.trim().to_ascii_lowercase();
        let now = Instant::now();
        if let Some(entry) = self.tokens.read().await.get(&key) {
            if is_fresh(entry, now, self.token_ttl) {
                return entry.usd;
            }
        }

        let price = self.fetch_contract_price(&key).await;
        self.tokens.write().await.insert(
            key,
            PriceEntry {
                usd: price,
                fetched_at: Instant::now(),
            },
        );
        price
    }

    // Internal helper that queries the token-price-by-contract endpoint.
    async fn fetch_contract_price(&self, contract: &str) -> f64 {
        let mut url = match Url::parse(&format!(
            "{}/simple/token_price/ethereum",
            self.coingecko_base.trim_end_matches('/')
        )) {
            Ok(url) => url,
            Err(_) => return 0.0,
        };
        url.query_pairs_mut()
            .append_pair("contract_addresses", contract)
            .append_pair("vs_currencies", "usd");

        let res = match self
            .http
            .get(url.as_str(), Duration::from_secs(PRICE_TIMEOUT_SECS))
            .await
        {
            Ok(res) if res.status().is_success() => res,
            _ => return 0.0,
        };
        let body: Value = match res.json().await {
            Ok(body) => body,
            Err(_) => return 0.0,
        };

        body.as_object()
            .and_then(|map| map.values().next())
            .and_then(|entry| entry.get("usd"))
            .and_then(Value::as_f64)
            .filter(|price| price.is_finite() && *price >= 0.0)
            .unwrap_or(0.0)
    }
}
