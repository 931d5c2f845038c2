use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub network: String,
    pub rpc: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let rpc_status = if state.config.alchemy_base().is_some() {
        "configured".to_string()
    } else {
        "unconfigured".to_string()
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: state.config.alchemy_network.clone(),
        rpc: rpc_status,
    })
}
