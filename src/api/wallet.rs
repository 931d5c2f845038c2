use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::constants::TOKEN_METADATA_FAN_OUT;
use crate::error::{AppError, Result};
use crate::models::{PnlPoint, PnlResponse, PortfolioAsset, PortfolioResponse, Transfer, TxRecord, TxsResponse};
use crate::services::rpc::AlchemyClient;
use crate::services::transfers::get_asset_transfers_up_to;
use crate::services::values::{to_wei, wei_to_decimal, wei_to_eth};
use crate::utils::{is_eth_address, normalize_address};

fn checked_address(raw: &str) -> Result<String> {
    let address = normalize_address(raw);
    if !is_eth_address(&address) {
        return Err(AppError::BadRequest("Invalid address".to_string()));
    }
    Ok(address)
}

/// GET /wallet/{address}/portfolio — ETH plus ERC-20 holdings with USD
/// valuation. Token metadata fan-out is capped; tokens past the cap are
/// simply not listed.
pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<PortfolioResponse>> {
    let address = checked_address(&address)?;
    let rpc = state.alchemy_client()?;

    let balances = rpc.get_token_balances(&address).await?;
    let empty = Vec::new();
    let tokens = balances
        .get("tokenBalances")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let eth_raw = rpc.get_balance(&address).await?;
    let eth_balance = wei_to_eth(to_wei(&eth_raw));
    let eth_price = state.price.eth_usd().await;

    let described = join_all(
        tokens
            .iter()
            .take(TOKEN_METADATA_FAN_OUT)
            .map(|entry| describe_token(&state, &rpc, entry)),
    )
    .await;

    let mut assets = vec![PortfolioAsset {
        symbol: "ETH".to_string(),
        name: "Ethereum".to_string(),
        balance: eth_balance,
        usd: eth_balance * eth_price,
        contract: None,
    }];
    assets.extend(described.into_iter().flatten().filter(|a| a.balance > 0.0));

    let total_usd = assets.iter().map(|a| a.usd).sum();
    Ok(Json(PortfolioResponse {
        address,
        total_usd,
        assets,
        source: "alchemy+coingecko".to_string(),
    }))
}

async fn describe_token(
    state: &AppState,
    rpc: &AlchemyClient,
    entry: &Value,
) -> Option<PortfolioAsset> {
    let contract = entry
        .get("contractAddress")
        .and_then(Value::as_str)?
        .to_string();
    match token_asset(state, rpc, entry, &contract).await {
        Ok(asset) => Some(asset),
        Err(err) => {
            tracing::debug!("token metadata fetch failed for {}: {}", contract, err);
            Some(PortfolioAsset {
                symbol: "UNK".to_string(),
                name: "Unknown".to_string(),
                balance: 0.0,
                usd: 0.0,
                contract: Some(contract),
            })
        }
    }
}

async fn token_asset(
    state: &AppState,
    rpc: &AlchemyClient,
    entry: &Value,
    contract: &str,
) -> Result<PortfolioAsset> {
    let meta = rpc.get_token_metadata(contract).await?;
    let decimals = meta.get("decimals").and_then(Value::as_u64).unwrap_or(18) as u32;
    let symbol = meta
        .get("symbol")
        .and_then(Value::as_str)
        .unwrap_or("UNK")
        .to_string();
    let name = meta
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();

    let raw = entry.get("tokenBalance").cloned().unwrap_or(Value::Null);
    let balance = wei_to_decimal(to_wei(&raw), decimals);
    let price = state.price.usd_by_contract(contract).await;

    Ok(PortfolioAsset {
        symbol,
        name,
        balance,
        usd: balance * price,
        contract: Some(contract.to_string()),
    })
}

#[derive(Debug, Deserialize)]
pub struct PnlParams {
    #[serde(rename = "rangeDays")]
    pub range_days: Option<u32>,
}

/// GET /wallet/{address}/pnl — an ETH balance series over the requested
/// range. No historical price source is wired in, so each day repeats the
/// current balance and USD stays null; the note says as much.
pub async fn get_pnl(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(params): Query<PnlParams>,
) -> Result<Json<PnlResponse>> {
    let address = checked_address(&address)?;
    let rpc = state.alchemy_client()?;

    let bal = rpc.get_balance(&address).await?;
    let current = wei_to_eth(to_wei(&bal));

    let range_days = i64::from(params.range_days.unwrap_or(30));
    let series = build_series(current, range_days, Utc::now());

    Ok(Json(PnlResponse {
        address,
        note: "ETH-only history reconstructed.".to_string(),
        series,
        source: "alchemy-reconstructed".to_string(),
    }))
}

fn build_series(current: f64, range_days: i64, now: DateTime<Utc>) -> Vec<PnlPoint> {
    let start = (now - Duration::days(range_days - 1)).date_naive();
    (0..range_days)
        .map(|i| PnlPoint {
            date: (start + Duration::days(i)).format("%Y-%m-%d").to_string(),
            eth: current,
            usd: None,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct TxsParams {
    #[serde(rename = "maxCount")]
    pub max_count: Option<usize>,
}

/// GET /wallet/{address}/txs — flat transfer listing. Rows without a native
/// value fall back to the ERC-20 symbol+amount, then to the value recovered
/// from the transaction itself.
pub async fn get_txs(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(params): Query<TxsParams>,
) -> Result<Json<TxsResponse>> {
    let address = checked_address(&address)?;
    let rpc = state.alchemy_client()?;

    // The route clamp is the only bound here; the shared aggregator's
    // tighter page limit is for the chat path.
    let requested = params.max_count.unwrap_or(50).clamp(10, 500);
    let transfers = get_asset_transfers_up_to(&rpc, &address, requested).await;

    let mut txs = Vec::with_capacity(transfers.len());
    for t in &transfers {
        let value = tx_value(&rpc, t).await;
        txs.push(TxRecord {
            hash: t.hash.clone(),
            category: t.category.clone(),
            from: t.from.clone(),
            to: t.to.clone(),
            value,
            metadata: t.metadata.clone(),
            asset: t.asset.clone(),
        });
    }

    Ok(Json(TxsResponse {
        address,
        txs,
        source: "alchemy".to_string(),
    }))
}

// A literal zero counts as missing; the transfer feed reports "0" for rows
// whose value lives elsewhere.
fn is_zero_value(v: &Value) -> bool {
    match v {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim() == "0",
        _ => false,
    }
}

async fn tx_value(rpc: &AlchemyClient, transfer: &Transfer) -> Value {
    if let Some(v) = &transfer.value {
        if !v.is_null() && !is_zero_value(v) {
            return v.clone();
        }
    }
    if let Some(token) = &transfer.erc20_token {
        if let (Some(symbol), Some(raw)) = (&token.token_symbol, &token.value) {
            return Value::String(format!("{} {}", symbol, display_value(raw)));
        }
    }
    match rpc.rpc("eth_getTransactionByHash", json!([transfer.hash])).await {
        Ok(tx) => match tx.get("value") {
            Some(v) if !v.is_null() => {
                Value::String(format!("{:.6}", wei_to_eth(to_wei(v))))
            }
            _ => Value::Null,
        },
        Err(err) => {
            tracing::debug!("value recovery failed for {}: {}", transfer.hash, err);
            Value::Null
        }
    }
}

fn display_value(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
