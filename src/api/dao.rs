use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::error::{AppError, Result};
use crate::services::snapshot::OpenProposal;
use crate::utils::{is_eth_address, normalize_address};

#[derive(Serialize)]
pub struct DaoVotesResponse {
    pub address: String,
    pub open: Vec<OpenProposal>,
    pub count: usize,
    pub source: String,
}

/// GET /dao/{address}/votes — open governance proposals across the tracked
/// spaces. The address is validated but does not narrow the proposal set.
pub async fn get_votes(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<DaoVotesResponse>> {
    let address = normalize_address(&address);
    if !is_eth_address(&address) {
        return Err(AppError::BadRequest("Invalid address".to_string()));
    }

    let open = state.snapshot_client().open_proposals().await?;
    let count = open.len();
    Ok(Json(DaoVotesResponse {
        address,
        open,
        count,
        source: "snapshot.org".to_string(),
    }))
}
