use alloy::primitives::Address;
use dotenvy::dotenv;
use eyre::{eyre, Result, WrapErr};
use std::env;
use tracing::info;

use crate::amount::DEFAULT_DECIMALS;

/// Superfluid protocol subgraph on Base mainnet.
pub const DEFAULT_SUBGRAPH_URL: &str =
    "https://subgraph-endpoints.superfluid.dev/base-mainnet/protocol-v1";

const MAX_FETCH_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub subgraph_url: String,
    pub token: Address,
    pub chain_id: u64,
    pub symbol: String,
    pub decimals: u8,
    pub display_decimals: usize,
    pub db_path: String,
    pub port: u16,
    pub refresh_interval_secs: u64,
    pub fetch_page_size: usize,
}

/// Everything a leaderboard or aggregation call needs to know about the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenContext {
    pub token: Address,
    pub chain_id: u64,
    pub symbol: String,
    pub decimals: u8,
    pub display_decimals: usize,
}

impl Config {
    pub fn token_context(&self) -> TokenContext {
        TokenContext {
            token: self.token,
            chain_id: self.chain_id,
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            display_decimals: self.display_decimals,
        }
    }
}

pub fn load() -> Result<Config> {
    dotenv().ok();

    let subgraph_url = env::var("SUBGRAPH_URL").unwrap_or_else(|_| DEFAULT_SUBGRAPH_URL.to_string());

    let token = env::var("TOKEN_ADDRESS")
        .or_else(|_| env::var("SUPER_TOKEN"))
        .map_err(|_| eyre!("TOKEN_ADDRESS must be set"))?
        .trim()
        .parse::<Address>()
        .wrap_err("TOKEN_ADDRESS is not a valid address")?;

    let chain_id = parse_or("CHAIN_ID", 8453u64);
    let symbol = env::var("TOKEN_SYMBOL").unwrap_or_else(|_| "TOKEN".to_string());
    let decimals = parse_or("TOKEN_DECIMALS", DEFAULT_DECIMALS);
    let display_decimals = parse_or("DISPLAY_DECIMALS", 4usize);

    let db_path = env::var("DATABASE_URL").unwrap_or_else(|_| "token_matrix.db".to_string());
    let port = parse_or("PORT", 8080u16);
    let refresh_interval_secs = parse_or("REFRESH_INTERVAL_SECS", 30u64).max(1);
    let fetch_page_size = parse_or("FETCH_PAGE_SIZE", 500usize).clamp(1, MAX_FETCH_PAGE_SIZE);

    let cfg = Config {
        subgraph_url,
        token,
        chain_id,
        symbol,
        decimals,
        display_decimals,
        db_path,
        port,
        refresh_interval_secs,
        fetch_page_size,
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
