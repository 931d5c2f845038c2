// src/models/mod.rs
pub mod wallet;

pub use wallet::{
    Erc20Token, ParsedTransfer, PnlPoint, PnlResponse, PortfolioAsset, PortfolioResponse,
    Transfer, TransferMetadata, TxRecord, TxsResponse,
};
