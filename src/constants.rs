/// Application constants

pub const API_VERSION: &str = "v1";

// Default upstream endpoints
pub const DEFAULT_COINGECKO_API: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_DEFILLAMA_ETH_PRICE_URL: &str =
    "https://coins.llama.fi/prices/current/coingecko:ethereum";
pub const DEFAULT_SNAPSHOT_API: &str = "https://hub.snapshot.org/graphql";
pub const ETHERSCAN_TX_BASE: &str = "https://etherscan.io/tx/";

// Snapshot spaces polled for open governance proposals
pub const DAO_SPACES: [&str; 7] = [
    "uniswap",
    "aave.eth",
    "ens.eth",
    "arbitrumfoundation.eth",
    "compound.eth",
    "balancer.eth",
    "optimism.eth",
];

// Asset-transfer categories requested from the RPC provider
pub const TRANSFER_CATEGORIES: [&str; 5] = ["external", "internal", "erc20", "erc721", "erc1155"];

// Upstream timeouts
pub const RPC_TIMEOUT_SECS: u64 = 10;
pub const PRICE_TIMEOUT_SECS: u64 = 8;
pub const SNAPSHOT_TIMEOUT_SECS: u64 = 10;

// Retry / backoff
pub const HTTP_RETRY_BASE_MS: u64 = 200;
pub const PRICE_SOURCE_PAUSE_MS: u64 = 300;

// Cache freshness windows
pub const ETH_PRICE_TTL_SECS: u64 = 300;
pub const TOKEN_PRICE_TTL_SECS: u64 = 120;

// Aggregation bounds
pub const TRANSFER_MAX_COUNT: usize = 200;
pub const GAS_SAMPLE_SIZE: usize = 20;
pub const GAS_RECEIPT_BATCH: usize = 6;
pub const TOKEN_METADATA_FAN_OUT: usize = 15;
pub const CHAT_QUERY_MAX_CHARS: usize = 1024;

// Receipt status sentinel for a successful transaction
pub const RECEIPT_STATUS_SUCCESS: &str = "0x1";
