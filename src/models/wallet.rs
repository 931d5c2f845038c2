use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One asset movement as reported by `alchemy_getAssetTransfers`. Only the
/// fields the service actually reads are modelled; the upstream payload has
/// many more.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub hash: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    /// Native value; hex string, decimal number or null depending on category.
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub asset: Option<String>,
    /// Generic numeric amount some providers attach.
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub erc20_token: Option<Erc20Token>,
    #[serde(default)]
    pub metadata: Option<TransferMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Erc20Token {
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub raw_value: Option<Value>,
    #[serde(default)]
    pub token_decimals: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    #[serde(default)]
    pub block_timestamp: Option<String>,
}

impl Transfer {
    /// Block timestamp in unix milliseconds; missing or malformed metadata
    /// sorts as epoch zero.
    pub fn timestamp_millis(&self) -> i64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.block_timestamp.as_deref())
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
            .unwrap_or(0)
    }
}

/// Display-ready transfer row for the chat activity reply.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedTransfer {
    pub hash: String,
    pub date: String,
    pub amount: f64,
    pub symbol: String,
    pub explorer: String,
}

#[derive(Debug, Serialize)]
pub struct PortfolioAsset {
    pub symbol: String,
    pub name: String,
    pub balance: f64,
    pub usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub address: String,
    pub total_usd: f64,
    pub assets: Vec<PortfolioAsset>,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct PnlPoint {
    pub date: String,
    pub eth: f64,
    pub usd: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PnlResponse {
    pub address: String,
    pub note: String,
    pub series: Vec<PnlPoint>,
    pub source: String,
}

/// One row of the `/wallet/{address}/txs` listing.
#[derive(Debug, Serialize)]
pub struct TxRecord {
    pub hash: String,
    pub category: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Value,
    pub metadata: Option<TransferMetadata>,
    pub asset: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TxsResponse {
    pub address: String,
    pub txs: Vec<TxRecord>,
    pub source: String,
}
