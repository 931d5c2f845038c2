use ethers::types::U256;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::constants::{RECEIPT_STATUS_SUCCESS, RPC_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::services::http::HttpClient;
use crate::services::values::to_wei;

/// JSON-RPC client for the configured Alchemy (or compatible) endpoint.
/// Built per request from config so missing keys surface as request-time
/// configuration errors, not startup failures.
#[derive(Debug, Clone)]
pub struct AlchemyClient {
    http: HttpClient,
    base: String,
}

/// Raw outcome of one RPC call. `ok`/`status` let callers distinguish
/// "not found" (ok with null result) from transport-level failure.
#[derive(Debug, Clone, Serialize)]
pub struct RpcOutcome {
    pub ok: bool,
    pub status: u16,
    pub body: Value,
}

impl RpcOutcome {
    /// The `result` field when present and non-null.
    pub fn result(&self) -> Option<&Value> {
        self.body.get("result").filter(|v| !v.is_null())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TxBundle {
    pub tx: RpcOutcome,
    pub receipt: RpcOutcome,
}

/// Post-execution classification of a transaction. A missing receipt is
/// "pending", distinct from an executed-but-failed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Failed,
    Pending,
}

impl TxStatus {
    pub fn label(self) -> &'static str {
        match self {
            TxStatus::Success => "success",
            TxStatus::Failed => "failed",
            TxStatus::Pending => "pending",
        }
    }
}

/// Classify a receipt's status field against the success sentinel, which may
/// arrive as the hex string or the equivalent integer.
pub fn receipt_status(receipt: Option<&Value>) -> TxStatus {
    match receipt {
        None => TxStatus::Pending,
        Some(r) => {
            let status = r.get("status");
            let success = matches!(status.and_then(Value::as_str), Some(s) if s == RECEIPT_STATUS_SUCCESS)
                || matches!(status.and_then(Value::as_u64), Some(1));
            if success {
                TxStatus::Success
            } else {
                TxStatus::Failed
            }
        }
    }
}

/// Gas components for fee math: `(gasUsed, effectiveGasPrice)` with the
/// transaction's nominal gas price as the price fallback.
pub fn gas_components(receipt: Option<&Value>, tx: Option<&Value>) -> (U256, U256) {
    let null = Value::Null;
    let used = to_wei(
        receipt
            .and_then(|r| r.get("gasUsed"))
            .unwrap_or(&null),
    );
    let effective = receipt.and_then(|r| r.get("effectiveGasPrice"));
    let price = match effective {
        Some(v) if !v.is_null() => to_wei(v),
        _ => to_wei(tx.and_then(|t| t.get("gasPrice")).unwrap_or(&null)),
    };
    (used, price)
}

impl AlchemyClient {
    pub fn new(http: HttpClient, base: String) -> Self {
        Self { http, base }
    }

    // Internal helper that issues one JSON-RPC POST and parses the envelope.
    async fn call(&self, method: &str, params: Value, retries: u32) -> Result<RpcOutcome> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let res = self
            .http
            .post_json(
                &self.base,
                &payload,
                Duration::from_secs(RPC_TIMEOUT_SECS),
                retries,
            )
            .await?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            AppError::BlockchainRpc(format!("RPC {} read failed: {}", method, e))
        })?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(RpcOutcome {
            ok: status.is_success(),
            status: status.as_u16(),
            body,
        })
    }

    /// Strict call: non-2xx responses are errors, returns the `result` value.
    pub async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let outcome = self.call(method, params, 1).await?;
        if !outcome.ok {
            return Err(AppError::BlockchainRpc(format!(
                "RPC {} failed: HTTP {} {}",
                method, outcome.status, outcome.body
            )));
        }
        Ok(outcome
            .body
            .get("result")
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Raw call preserving status and body for callers that must tell
    /// "not found" apart from transport failure.
    pub async fn rpc_raw(&self, method: &str, params: Value) -> Result<RpcOutcome> {
        self.call(method, params, 0).await
    }

    pub async fn get_balance(&self, address: &str) -> Result<Value> {
        self.rpc("eth_getBalance", json!([address, "latest"])).await
    }

    pub async fn get_tx_and_receipt(&self, hash: &str) -> Result<TxBundle> {
        let tx = self.rpc_raw("eth_getTransactionByHash", json!([hash])).await?;
        let receipt = self
            .rpc_raw("eth_getTransactionReceipt", json!([hash]))
            .await?;
        Ok(TxBundle { tx, receipt })
    }

    pub async fn get_token_balances(&self, address: &str) -> Result<Value> {
        self.rpc("alchemy_getTokenBalances", json!([address, "erc20"]))
            .await
    }

    pub async fn get_token_metadata(&self, contract: &str) -> Result<Value> {
        self.rpc("alchemy_getTokenMetadata", json!([contract])).await
    }
}
