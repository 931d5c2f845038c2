use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use chrono::DateTime;

use crate::constants::{ETHERSCAN_TX_BASE, TRANSFER_CATEGORIES, TRANSFER_MAX_COUNT};
use crate::error::{AppError, Result};
use crate::models::{ParsedTransfer, Transfer};
use crate::services::rpc::AlchemyClient;
use crate::services::values::{to_wei, wei_to_decimal, wei_to_eth};

/// The provider returns the transfer page in one of three shapes: a bare
/// list, a `{transfers: [...]}` wrapper, or a single object. Anything else
/// is a decode error, which the aggregator treats as a failed branch.
#[derive(Deserialize)]
#[serde(untagged)]
enum TransferPage {
    List(Vec<Transfer>),
    Wrapped { transfers: Vec<Transfer> },
    Single(Transfer),
}

// Internal helper that parses one branch response into a transfer list.
fn decode_transfer_page(raw: Value) -> Result<Vec<Transfer>> {
    match serde_json::from_value::<TransferPage>(raw) {
        Ok(TransferPage::List(list)) => Ok(list),
        Ok(TransferPage::Wrapped { transfers }) => Ok(transfers),
        Ok(TransferPage::Single(one)) => Ok(vec![one]),
        Err(e) => Err(AppError::BlockchainRpc(format!(
            "unrecognized transfer page shape: {}",
            e
        ))),
    }
}

/// Bound the requested page size before any upstream call is issued.
pub fn clamp_max_count(requested: usize) -> usize {
    requested.clamp(1, TRANSFER_MAX_COUNT)
}

// Internal helper that collapses duplicate hashes and orders the result.
// When both branches report the same transaction, the copy with the strictly
// later block timestamp wins; ties keep the first seen. Output is descending
// by timestamp, with missing timestamps (epoch zero) last.
pub fn dedupe_and_sort(merged: Vec<Transfer>) -> Vec<Transfer> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Transfer> = Vec::new();

    for transfer in merged {
        if transfer.hash.is_empty() {
            continue;
        }
        match index.get(&transfer.hash) {
            Some(&slot) => {
                if transfer.timestamp_millis() > unique[slot].timestamp_millis() {
                    unique[slot] = transfer;
                }
            }
            None => {
                index.insert(transfer.hash.clone(), unique.len());
                unique.push(transfer);
            }
        }
    }

    unique.sort_by(|a, b| b.timestamp_millis().cmp(&a.timestamp_millis()));
    unique
}

/// Fetch up to `max_count` transfers touching `address`, most recent first.
///
/// Outgoing (`fromAddress`) and incoming (`toAddress`) pages are requested
/// concurrently; a failed branch degrades to an empty list rather than
/// failing the aggregation. Given identical upstream data the output is
/// identical: unique hashes, descending timestamps.
pub async fn get_asset_transfers(
    rpc: &AlchemyClient,
    address: &str,
    max_count: usize,
) -> Vec<Transfer> {
    get_asset_transfers_up_to(rpc, address, clamp_max_count(max_count)).await
}

/// Same aggregation as [`get_asset_transfers`], but trusting the caller's
/// upper bound. Routes that enforce their own `maxCount` policy (the txs
/// listing allows up to 500 rows) use this directly.
pub async fn get_asset_transfers_up_to(
    rpc: &AlchemyClient,
    address: &str,
    limit: usize,
) -> Vec<Transfer> {
    let limit = limit.max(1);
    let base_req = json!({
        "fromBlock": "0x0",
        "toBlock": "latest",
        "category": TRANSFER_CATEGORIES,
        "maxCount": format!("0x{:x}", limit),
        "withMetadata": true,
        "excludeZeroValue": false,
    });

    let mut out_req = base_req.clone();
    out_req["fromAddress"] = json!(address);
    let mut in_req = base_req;
    in_req["toAddress"] = json!(address);

    let (out_res, in_res) = tokio::join!(
        rpc.rpc("alchemy_getAssetTransfers", json!([out_req])),
        rpc.rpc("alchemy_getAssetTransfers", json!([in_req])),
    );

    let outs = out_res
        .and_then(decode_transfer_page)
        .unwrap_or_else(|err| {
            tracing::warn!("outgoing transfer branch failed: {}", err);
            Vec::new()
        });
    let ins = in_res.and_then(decode_transfer_page).unwrap_or_else(|err| {
        tracing::warn!("incoming transfer branch failed: {}", err);
        Vec::new()
    });

    let mut merged = outs;
    merged.extend(ins);

    let mut deduped = dedupe_and_sort(merged);
    deduped.truncate(limit);
    deduped
}

// Internal helper that reads a token decimals field that may be a number
// or a numeric string.
fn decimals_of(raw: Option<&Value>) -> Option<u32> {
    match raw? {
        Value::Number(n) => n.as_u64().map(|d| d as u32),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Turn a raw transfer into a display record. Amount preference order:
/// native value, then ERC-20 raw value scaled by its decimals, then the
/// generic numeric amount field.
pub fn parse_transfer(transfer: &Transfer) -> ParsedTransfer {
    let millis = transfer.timestamp_millis();
    let date = DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%d/%m/%Y, %H:%M:%S").to_string())
        .unwrap_or_else(|| "01/01/1970, 00:00:00".to_string());

    let symbol = transfer
        .asset
        .clone()
        .or_else(|| {
            transfer
                .erc20_token
                .as_ref()
                .and_then(|t| t.token_symbol.clone())
        })
        .unwrap_or_else(|| "ETH".to_string());

    let mut amount = 0.0;

    if let Some(value) = &transfer.value {
        let wei = to_wei(value);
        if !wei.is_zero() {
            amount = wei_to_eth(wei);
        }
    }

    if let Some(token) = &transfer.erc20_token {
        let raw = token.value.as_ref().or(token.raw_value.as_ref());
        if let (Some(raw), Some(decimals)) = (raw, decimals_of(token.token_decimals.as_ref())) {
            let wei = to_wei(raw);
            if !wei.is_zero() {
                amount = wei_to_decimal(wei, decimals);
            }
        }
    }

    if amount == 0.0 {
        if let Some(generic) = &transfer.amount {
            let fallback = match generic {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            if let Some(v) = fallback {
                amount = v;
            }
        }
    }

    ParsedTransfer {
        hash: transfer.hash.clone(),
        date,
        amount,
        symbol,
        explorer: format!("{}{}", ETHERSCAN_TX_BASE, transfer.hash),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(hash: &str, ts: Option<&str>) -> Transfer {
        serde_json::from_value(match ts {
            Some(ts) => json!({"hash": hash, "metadata": {"blockTimestamp": ts}}),
            None => json!({"hash": hash}),
        })
        .unwrap()
    }

    #[test]
    fn clamp_bounds_are_1_and_200() {
        // Memastikan clamp ke batas [1, 200]
        assert_eq!(clamp_max_count(0), 1);
        assert_eq!(clamp_max_count(50), 50);
        assert_eq!(clamp_max_count(5000), 200);
    }

    #[test]
    fn duplicate_hash_keeps_later_timestamp() {
        // Memastikan hash ganda menyisakan timestamp terbaru
        let early = transfer("0xdup", Some("2024-01-01T00:00:00Z"));
        let late = transfer("0xdup", Some("2024-06-01T00:00:00Z"));
        let expected = late.timestamp_millis();

        let result = dedupe_and_sort(vec![early, late]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].timestamp_millis(), expected);
    }

    #[test]
    fn output_hashes_are_unique_and_descending() {
        // Memastikan hasil unik per hash dan urut menurun
        let merged = vec![
            transfer("0xa", Some("2024-01-01T00:00:00Z")),
            transfer("0xb", Some("2024-03-01T00:00:00Z")),
            transfer("0xa", Some("2024-02-01T00:00:00Z")),
            transfer("0xc", None),
        ];
        let result = dedupe_and_sort(merged);
        let hashes: Vec<&str> = result.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["0xb", "0xa", "0xc"]);
        // entry without metadata sorts last
        assert_eq!(result[2].timestamp_millis(), 0);
    }

    #[test]
    fn tie_on_timestamp_keeps_first_seen() {
        // Memastikan timestamp sama mempertahankan entri pertama
        let mut first = transfer("0xdup", Some("2024-01-01T00:00:00Z"));
        first.asset = Some("FIRST".to_string());
        let mut second = transfer("0xdup", Some("2024-01-01T00:00:00Z"));
        second.asset = Some("SECOND".to_string());

        let result = dedupe_and_sort(vec![first, second]);
        assert_eq!(result[0].asset.as_deref(), Some("FIRST"));
    }

    #[test]
    fn decode_accepts_all_three_page_shapes() {
        // Memastikan tiga bentuk respons bisa dibaca
        let list = decode_transfer_page(json!([{"hash": "0x1"}])).unwrap();
        assert_eq!(list.len(), 1);
        let wrapped = decode_transfer_page(json!({"transfers": [{"hash": "0x1"}, {"hash": "0x2"}]}))
            .unwrap();
        assert_eq!(wrapped.len(), 2);
        let single = decode_transfer_page(json!({"hash": "0x1"})).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn decode_rejects_unrecognized_shapes() {
        // Memastikan bentuk asing menjadi error decode
        assert!(decode_transfer_page(json!(null)).is_err());
        assert!(decode_transfer_page(json!(42)).is_err());
        assert!(decode_transfer_page(json!({"unexpected": true})).is_err());
    }

    #[test]
    fn parse_prefers_native_value_then_erc20_then_generic() {
        // Memastikan urutan preferensi nilai transfer
        let native: Transfer = serde_json::from_value(json!({
            "hash": "0x1",
            "value": "0xde0b6b3a7640000"
        }))
        .unwrap();
        assert_eq!(parse_transfer(&native).amount, 1.0);

        let erc20: Transfer = serde_json::from_value(json!({
            "hash": "0x2",
            "erc20Token": {"tokenSymbol": "USDC", "rawValue": "0x1e8480", "tokenDecimals": 6}
        }))
        .unwrap();
        let parsed = parse_transfer(&erc20);
        assert_eq!(parsed.amount, 2.0);
        assert_eq!(parsed.symbol, "USDC");

        let generic: Transfer = serde_json::from_value(json!({
            "hash": "0x3",
            "amount": "3.5"
        }))
        .unwrap();
        assert_eq!(parse_transfer(&generic).amount, 3.5);
    }

    #[test]
    fn parse_links_to_the_explorer() {
        // Memastikan link explorer dirakit dari hash
        let t = transfer("0xabc", None);
        assert_eq!(parse_transfer(&t).explorer, "https://etherscan.io/tx/0xabc");
    }
}
