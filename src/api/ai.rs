use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use ethers::types::U256;
use futures_util::future::join_all;
use futures_util::stream;
use futures_util::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::AppState;
use crate::constants::{CHAT_QUERY_MAX_CHARS, GAS_RECEIPT_BATCH, GAS_SAMPLE_SIZE, TRANSFER_MAX_COUNT};
use crate::error::{AppError, Result};
use crate::services::intent::{self, Intent};
use crate::services::rpc::{gas_components, receipt_status, AlchemyClient, TxStatus};
use crate::services::stream::StreamFrame;
use crate::services::transfers::{get_asset_transfers, parse_transfer};
use crate::services::values::{to_wei, wei_to_eth};
use crate::utils::normalize_address;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

/// POST /ai — classify the query, run one intent branch, and stream the
/// reply as text, structured payload, and a terminal marker. Once the
/// stream starts, branch failures become frames, never HTTP errors.
pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let Json(body) =
        payload.map_err(|e| AppError::Internal(format!("Malformed request body: {}", e)))?;

    let address = normalize_address(&body.address.unwrap_or_default());
    let query: String = body
        .query
        .unwrap_or_default()
        .trim()
        .chars()
        .take(CHAT_QUERY_MAX_CHARS)
        .collect();

    // Upstream RPC config is required before the stream opens.
    let rpc = state.alchemy_client()?;

    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_chat(state, rpc, address, query, frame_tx));

    let frames = stream::unfold(frame_rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|frame| (Ok::<Event, Infallible>(frame.into_event()), rx))
    });
    Ok(Sse::new(frames))
}

async fn run_chat(
    state: AppState,
    rpc: AlchemyClient,
    address: String,
    query: String,
    frames: mpsc::UnboundedSender<StreamFrame>,
) {
    let (text, structured) = match dispatch(&state, &rpc, &address, &query).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::error!("chat dispatch failed: {}", err);
            let msg = format!("Assistant stream error: {}", err);
            let structured = json!({ "error": msg });
            (msg, structured)
        }
    };
    // Receiver dropping just means the client went away.
    let _ = frames.send(StreamFrame::Text(text));
    let _ = frames.send(StreamFrame::Structured(structured));
    let _ = frames.send(StreamFrame::Done);
}

/// One intent branch per request; returns the reply text and its structured
/// payload.
async fn dispatch(
    state: &AppState,
    rpc: &AlchemyClient,
    address: &str,
    query: &str,
) -> Result<(String, Value)> {
    let intent = intent::classify(query);
    if !intent::address_ok(&intent, address) {
        return Ok((
            "Missing or invalid wallet address. Connect wallet and provide a valid 0x... address."
                .to_string(),
            json!({ "error": "missing_address" }),
        ));
    }

    match intent {
        Intent::TxLookup(hash) => tx_lookup(state, rpc, &hash).await,
        Intent::Gas => gas_summary(state, rpc, address).await,
        Intent::Portfolio => balance_summary(state, rpc, address).await,
        Intent::Activity => activity_summary(state, rpc, address).await,
        Intent::Dao => dao_summary(state).await,
        Intent::Unknown => Ok((
            "I couldn't classify your query. Try \"gas spent\", \"portfolio PnL\", or \"recent transactions\"."
                .to_string(),
            json!({}),
        )),
    }
}

async fn tx_lookup(state: &AppState, rpc: &AlchemyClient, hash: &str) -> Result<(String, Value)> {
    let bundle = rpc.get_tx_and_receipt(hash).await?;
    let tx_res = bundle.tx.result().cloned();
    let receipt_res = bundle.receipt.result().cloned();
    if tx_res.is_none() && receipt_res.is_none() {
        return Ok((format!("Transaction {} not found.", hash), json!({})));
    }

    let (gas_used, gas_price) = gas_components(receipt_res.as_ref(), tx_res.as_ref());
    let fee_eth = wei_to_eth(gas_used.checked_mul(gas_price).unwrap_or_default());
    let eth_usd = state.price.eth_usd().await;
    let fee_usd = fee_eth * eth_usd;
    let status = receipt_status(receipt_res.as_ref());
    let marker = match status {
        TxStatus::Success => "✅",
        TxStatus::Failed => "❌",
        TxStatus::Pending => "⏳",
    };

    let text = format!(
        "Tx {}… {} {}. Gas fee: {:.6} ETH (~${:.2}).",
        &hash[..10],
        marker,
        status.label(),
        fee_eth,
        fee_usd
    );
    let structured = json!({ "answer": text, "tx": tx_res, "receipt": receipt_res });
    Ok((text, structured))
}

async fn gas_summary(state: &AppState, rpc: &AlchemyClient, address: &str) -> Result<(String, Value)> {
    let transfers = get_asset_transfers(rpc, address, TRANSFER_MAX_COUNT).await;
    let sample: Vec<String> = transfers
        .iter()
        .take(GAS_SAMPLE_SIZE)
        .map(|t| t.hash.clone())
        .collect();

    let mut total = U256::zero();
    let mut count = 0u64;
    // Micro-batches cap the outstanding receipt fetches per round.
    for batch in sample.chunks(GAS_RECEIPT_BATCH) {
        let results = join_all(batch.iter().map(|hash| rpc.get_tx_and_receipt(hash))).await;
        for bundle in results.into_iter().flatten() {
            let (used, price) = gas_components(bundle.receipt.result(), bundle.tx.result());
            if !used.is_zero() && !price.is_zero() {
                if let Some(fee) = used.checked_mul(price) {
                    total = total.saturating_add(fee);
                    count += 1;
                }
            }
        }
    }

    let total_eth = wei_to_eth(total);
    let usd = total_eth * state.price.eth_usd().await;
    let text = format!(
        "Estimated gas used in {} txs: {:.6} ETH (~${:.2}).",
        count, total_eth, usd
    );
    let structured = json!({
        "answer": text,
        "approxCount": count,
        "totalGasEth": total_eth,
        "usd": usd,
    });
    Ok((text, structured))
}

async fn balance_summary(
    state: &AppState,
    rpc: &AlchemyClient,
    address: &str,
) -> Result<(String, Value)> {
    let bal = rpc.get_balance(address).await?;
    let balance = wei_to_eth(to_wei(&bal));
    let usd = balance * state.price.eth_usd().await;
    let text = format!("Wallet balance: {:.6} ETH (~${:.2}).", balance, usd);
    let structured = json!({ "answer": text, "balance": balance, "usd": usd });
    Ok((text, structured))
}

async fn activity_summary(
    state: &AppState,
    rpc: &AlchemyClient,
    address: &str,
) -> Result<(String, Value)> {
    let transfers = get_asset_transfers(rpc, address, 50).await;
    let parsed: Vec<_> = transfers
        .iter()
        .map(parse_transfer)
        .filter(|t| t.amount > 0.0)
        .collect();

    let eth_usd = state.price.eth_usd().await;
    let lines: Vec<String> = parsed
        .iter()
        .take(10)
        .map(|t| {
            format!(
                "• {}…  {:.6} {}  ({})",
                &t.hash[..10.min(t.hash.len())],
                t.amount,
                t.symbol,
                t.date
            )
        })
        .collect();

    let text = if lines.is_empty() {
        "No recent non-zero transfers found.".to_string()
    } else {
        format!(
            "Here are your {} most recent transfers:\n{}",
            lines.len(),
            lines.join("\n")
        )
    };
    let items: Vec<_> = parsed.into_iter().take(25).collect();
    let structured = json!({
        "answer": text,
        "items": items,
        "source": "alchemy",
        "priceEth": eth_usd,
    });
    Ok((text, structured))
}

async fn dao_summary(state: &AppState) -> Result<(String, Value)> {
    let open = match state.snapshot_client().open_proposals().await {
        Ok(open) => open,
        Err(err) => {
            tracing::warn!("DAO proposal fetch failed: {}", err);
            return Ok((
                "Failed to fetch DAO proposals.".to_string(),
                json!({ "error": "dao_fetch_failed" }),
            ));
        }
    };
    if open.is_empty() {
        return Ok(("No active DAO proposals found.".to_string(), json!({})));
    }

    let lines: Vec<String> = open
        .iter()
        .take(5)
        .map(|p| {
            let ends_day = p.ends.get(..10).unwrap_or(&p.ends);
            format!(
                "• {}: {} (ends {})",
                p.dao.as_deref().unwrap_or("?"),
                p.title,
                ends_day
            )
        })
        .collect();
    let text = format!(
        "Here are {} open DAO proposals you can review:\n{}",
        open.len(),
        lines.join("\n")
    );
    let proposals: Vec<_> = open.into_iter().take(25).collect();
    let structured = json!({ "answer": text, "proposals": proposals });
    Ok((text, structured))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::http::HttpClient;
    use crate::services::price::PriceOracle;
    use axum::{routing::post, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_config(rpc_base: &str, price_base: &str) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            alchemy_api_key: None,
            alchemy_network: "mainnet".to_string(),
            alchemy_base_url: Some(rpc_base.to_string()),
            coingecko_api_url: price_base.to_string(),
            defillama_eth_price_url: format!("{}/llama", price_base),
            snapshot_api_url: format!("{}/graphql", price_base),
            cors_allowed_origins: "*".to_string(),
        }
    }

    fn test_state(rpc_base: &str, price_base: &str) -> AppState {
        let config = test_config(rpc_base, price_base);
        let http = HttpClient::new().unwrap();
        let price = Arc::new(PriceOracle::with_ttls(
            http.clone(),
            config.coingecko_api_url.clone(),
            config.defillama_eth_price_url.clone(),
            Duration::from_secs(300),
            Duration::from_secs(120),
        ));
        AppState {
            config,
            http,
            price,
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn transfer_row(i: usize) -> Value {
        json!({
            "hash": format!("0x{:064x}", i + 1),
            "category": "external",
            "value": "0xde0b6b3a7640000",
            "metadata": {
                "blockTimestamp": format!("2024-05-{:02}T00:00:00Z", (i % 28) + 1)
            }
        })
    }

    #[tokio::test]
    async fn missing_address_makes_no_upstream_call() {
        // Memastikan alamat invalid berhenti sebelum panggilan jaringan
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/",
            post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { axum::Json(json!({"result": null})) }
            }),
        );
        let base = serve(router).await;

        let state = test_state(&base, &base);
        let rpc = state.alchemy_client().unwrap();
        let (text, structured) = dispatch(&state, &rpc, "nope", "gas spent this week")
            .await
            .unwrap();
        assert!(text.starts_with("Missing or invalid wallet address"));
        assert_eq!(structured["error"], "missing_address");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gas_intent_aggregates_sampled_receipts() {
        // 25 transfer, 20 pertama disampel; 21000 gas x 50 gwei x 20 = 0.021 ETH
        let rpc_router = Router::new().route(
            "/",
            post(|axum::Json(body): axum::Json<Value>| async move {
                let method = body["method"].as_str().unwrap_or_default();
                match method {
                    "alchemy_getAssetTransfers" => {
                        if body["params"][0].get("fromAddress").is_some() {
                            let rows: Vec<Value> = (0..25).map(transfer_row).collect();
                            axum::Json(json!({"result": {"transfers": rows}}))
                        } else {
                            axum::Json(json!({"result": {"transfers": []}}))
                        }
                    }
                    "eth_getTransactionReceipt" => axum::Json(json!({
                        "result": {"gasUsed": "0x5208", "effectiveGasPrice": "0xba43b7400"}
                    })),
                    _ => axum::Json(json!({"result": null})),
                }
            }),
        );
        let rpc_base = serve(rpc_router).await;

        let price_router = Router::new().route(
            "/simple/price",
            axum::routing::get(|| async { axum::Json(json!({"ethereum": {"usd": 2000.0}})) }),
        );
        let price_base = serve(price_router).await;

        let state = test_state(&rpc_base, &price_base);
        let rpc = state.alchemy_client().unwrap();
        let address = format!("0x{}", "a".repeat(40));
        let (text, structured) = dispatch(&state, &rpc, &address, "how much gas did I spend")
            .await
            .unwrap();

        assert_eq!(
            text,
            "Estimated gas used in 20 txs: 0.021000 ETH (~$42.00)."
        );
        assert_eq!(structured["approxCount"], 20);
    }

    #[tokio::test]
    async fn unknown_intent_yields_fallback_reply() {
        let state = test_state("http://127.0.0.1:9/", "http://127.0.0.1:9");
        let rpc = state.alchemy_client().unwrap();
        let (text, structured) = dispatch(&state, &rpc, "", "hello there").await.unwrap();
        assert!(text.starts_with("I couldn't classify your query"));
        assert_eq!(structured, json!({}));
    }

    #[tokio::test]
    async fn chat_reply_streams_three_frames_in_order() {
        // Memastikan urutan frame: teks, terstruktur, lalu penanda akhir
        let state = test_state("http://127.0.0.1:9/", "http://127.0.0.1:9");
        let rpc = state.alchemy_client().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_chat(state, rpc, String::new(), "hello".to_string(), tx).await;

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, StreamFrame::Text(_)));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, StreamFrame::Structured(_)));
        assert_eq!(rx.recv().await.unwrap(), StreamFrame::Done);
        assert!(rx.recv().await.is_none());
    }
}
