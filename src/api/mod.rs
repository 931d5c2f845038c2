pub mod ai;
pub mod dao;
pub mod debug;
pub mod health;
pub mod wallet;

use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::http::HttpClient;
use crate::services::price::PriceOracle;
use crate::services::rpc::AlchemyClient;
use crate::services::snapshot::SnapshotClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub http: HttpClient,
    pub price: Arc<PriceOracle>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let http = HttpClient::new()?;
        let price = Arc::new(PriceOracle::new(
            http.clone(),
            config.coingecko_api_url.clone(),
            config.defillama_eth_price_url.clone(),
        ));
        Ok(Self {
            config,
            http,
            price,
        })
    }

    /// RPC client for the configured endpoint; missing configuration is a
    /// request-time error, matching how handlers are expected to fail.
    pub fn alchemy_client(&self) -> Result<AlchemyClient> {
        let base = self.config.alchemy_base().ok_or_else(|| {
            AppError::Config("Missing ALCHEMY_API_KEY or ALCHEMY_BASE_URL".to_string())
        })?;
        Ok(AlchemyClient::new(self.http.clone(), base))
    }

    pub fn snapshot_client(&self) -> SnapshotClient {
        SnapshotClient::new(self.http.clone(), self.config.snapshot_api_url.clone())
    }
}
