use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::{AppError, Result};
use crate::utils::is_tx_hash;

#[derive(Debug, Deserialize)]
pub struct DebugParams {
    pub hash: Option<String>,
}

/// GET /debug?hash=… — raw transaction and receipt outcomes for inspecting
/// upstream responses. Missing hash and missing RPC config are both caller
/// mistakes here, so both map to 400.
pub async fn get_tx_debug(
    State(state): State<AppState>,
    Query(params): Query<DebugParams>,
) -> Result<Json<Value>> {
    let hash = params
        .hash
        .ok_or_else(|| AppError::BadRequest("Missing ?hash= parameter".to_string()))?;
    if !is_tx_hash(&hash) {
        return Err(AppError::BadRequest(
            "hash must be 0x followed by 64 hex chars".to_string(),
        ));
    }

    if state.config.alchemy_base().is_none() {
        return Err(AppError::BadRequest(
            "Missing ALCHEMY_API_KEY or ALCHEMY_BASE_URL".to_string(),
        ));
    }
    let rpc = state.alchemy_client()?;

    let bundle = rpc.get_tx_and_receipt(&hash).await?;
    Ok(Json(json!({
        "hash": hash,
        "network": state.config.alchemy_network,
        "tx": bundle.tx,
        "receipt": bundle.receipt,
    })))
}
