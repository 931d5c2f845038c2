use serde::Deserialize;
use std::env;

use crate::constants::{DEFAULT_COINGECKO_API, DEFAULT_DEFILLAMA_ETH_PRICE_URL, DEFAULT_SNAPSHOT_API};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // RPC provider (validated at request time, not at startup)
    pub alchemy_api_key: Option<String>,
    pub alchemy_network: String,
    pub alchemy_base_url: Option<String>,

    // Price sources
    pub coingecko_api_url: String,
    pub defillama_eth_price_url: String,

    // Governance indexer
    pub snapshot_api_url: String,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            alchemy_api_key: env::var("ALCHEMY_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            alchemy_network: env::var("ALCHEMY_NETWORK").unwrap_or_else(|_| "mainnet".to_string()),
            alchemy_base_url: env::var("ALCHEMY_BASE_URL")
                .ok()
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty()),

            coingecko_api_url: env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| DEFAULT_COINGECKO_API.to_string()),
            defillama_eth_price_url: env::var("DEFILLAMA_ETH_PRICE_URL")
                .unwrap_or_else(|_| DEFAULT_DEFILLAMA_ETH_PRICE_URL.to_string()),

            snapshot_api_url: env::var("SNAPSHOT_API_URL")
                .unwrap_or_else(|_| DEFAULT_SNAPSHOT_API.to_string()),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.alchemy_api_key.is_none() && self.alchemy_base_url.is_none() {
            tracing::warn!(
                "No ALCHEMY_API_KEY or ALCHEMY_BASE_URL set; RPC-backed routes will return 500"
            );
        }
        if let Some(base) = &self.alchemy_base_url {
            if url::Url::parse(base).is_err() {
                anyhow::bail!("ALCHEMY_BASE_URL is not a valid URL: {}", base);
            }
        }
        if self.alchemy_network.trim().is_empty() {
            anyhow::bail!("ALCHEMY_NETWORK is empty");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }
        Ok(())
    }

    /// Resolved JSON-RPC base URL: explicit override wins, otherwise it is
    /// derived from the API key and network name. None when unconfigured.
    pub fn alchemy_base(&self) -> Option<String> {
        if let Some(base) = &self.alchemy_base_url {
            return Some(base.clone());
        }
        self.alchemy_api_key.as_ref().map(|key| {
            format!(
                "https://eth-{}.g.alchemy.com/v2/{}",
                self.alchemy_network.trim(),
                key
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "test".to_string(),
            alchemy_api_key: None,
            alchemy_network: "mainnet".to_string(),
            alchemy_base_url: None,
            coingecko_api_url: DEFAULT_COINGECKO_API.to_string(),
            defillama_eth_price_url: DEFAULT_DEFILLAMA_ETH_PRICE_URL.to_string(),
            snapshot_api_url: DEFAULT_SNAPSHOT_API.to_string(),
            cors_allowed_origins: "*".to_string(),
        }
    }

    #[test]
    fn alchemy_base_derived_from_key_and_network() {
        // Memastikan base URL dirakit dari key + network
        let mut cfg = base_config();
        cfg.alchemy_api_key = Some("demo".to_string());
        assert_eq!(
            cfg.alchemy_base().as_deref(),
            Some("https://eth-mainnet.g.alchemy.com/v2/demo")
        );
    }

    #[test]
    fn explicit_base_url_wins_over_key() {
        // Memastikan override base URL diprioritaskan
        let mut cfg = base_config();
        cfg.alchemy_api_key = Some("demo".to_string());
        cfg.alchemy_base_url = Some("http://127.0.0.1:9999/rpc".to_string());
        assert_eq!(
            cfg.alchemy_base().as_deref(),
            Some("http://127.0.0.1:9999/rpc")
        );
    }

    #[test]
    fn missing_rpc_config_yields_none() {
        // Memastikan konfigurasi kosong menghasilkan None
        assert!(base_config().alchemy_base().is_none());
    }
}
