use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod error;
mod models;
mod services;
mod utils;

use config::Config;
use constants::API_VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walletsense_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting WalletSense Backend Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    let state = api::AppState::new(config.clone())?;
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Chat assistant (streaming)
        .route("/ai", post(api::ai::chat))
        // Governance
        .route("/dao/{address}/votes", get(api::dao::get_votes))
        // Wallet data
        .route("/wallet/{address}/portfolio", get(api::wallet::get_portfolio))
        .route("/wallet/{address}/pnl", get(api::wallet::get_pnl))
        .route("/wallet/{address}/txs", get(api::wallet::get_txs))
        // Raw upstream inspection
        .route("/debug", get(api::debug::get_tx_debug))
        .fallback(|| async { error::AppError::NotFound("Route not found".to_string()) })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            alchemy_api_key: None,
            alchemy_network: "mainnet".to_string(),
            alchemy_base_url: Some("http://127.0.0.1:9/".to_string()),
            coingecko_api_url: "http://127.0.0.1:9".to_string(),
            defillama_eth_price_url: "http://127.0.0.1:9/llama".to_string(),
            snapshot_api_url: "http://127.0.0.1:9/graphql".to_string(),
            cors_allowed_origins: "*".to_string(),
        }
    }

    #[tokio::test]
    async fn router_serves_health_and_falls_back_on_unknown_routes() {
        // Memastikan stack layer utuh: /health 200, rute asing 404
        let state = api::AppState::new(test_config()).unwrap();
        let app = build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let health = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
        assert_eq!(health.status(), reqwest::StatusCode::OK);

        let missing = reqwest::get(format!("http://{}/nope", addr)).await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
