// src/models.rs
use alloy::primitives::{Address, I256};
use serde::Serialize;

/// One flow checkpoint as last observed by the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRecord {
    pub token: Address,
    pub sender: Address,
    pub receiver: Address,
    pub flow_rate: I256,              // base units per second, may be negative
    pub streamed_until_updated: I256, // base units streamed up to `updated_at`
    pub updated_at: i64,              // unix seconds, projection origin
}

/// Totals for one account across all of its flow records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedAccountStats {
    pub total_flow_rate: I256,
    pub total_streamed: I256,
    pub latest_update_timestamp: Option<i64>,
    pub record_count: usize,
}

/// All flow records sent by one account, in data-source order.
#[derive(Debug, Clone)]
pub struct AccountFlows {
    pub account: Address,
    pub records: Vec<FlowRecord>,
}

/// Token-wide figures for the dashboard header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSummary {
    pub active_streams: usize,
    pub senders: usize,
    pub receivers: usize,
    pub total_flow_rate: I256,
    pub total_streamed: I256,
}

/// Input to the ranker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankCandidate {
    pub account: Address,
    pub metric: I256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: usize, // 1-based, absolute across pages
    pub account: Address,
    pub metric: I256,
    pub is_current_user: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedPage {
    pub page: Vec<LeaderboardEntry>,
    pub has_next_page: bool,
}

// ---------- API views ----------

#[derive(Debug, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub account: String,
    pub metric: String,            // raw base units
    pub metric_display: String,
    pub flow_rate_per_month: String,
    pub total_streamed: String,
    pub is_current_user: bool,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardView {
    pub token: String,
    pub symbol: String,
    pub chain_id: u64,
    pub page: usize,
    pub page_size: usize,
    pub has_next_page: bool,
    pub entries: Vec<LeaderboardRow>,
}

#[derive(Debug, Serialize)]
pub struct AccountView {
    pub account: String,
    pub token: String,
    pub symbol: String,
    pub total_flow_rate: String,
    pub flow_rate_per_month: String,
    pub total_streamed: String,
    pub total_streamed_display: String,
    pub latest_update_timestamp: Option<i64>,
    pub streams: usize,
}

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub token: String,
    pub symbol: String,
    pub chain_id: u64,
    pub active_streams: usize,
    pub senders: usize,
    pub receivers: usize,
    pub total_flow_rate_per_month: String,
    pub total_streamed_display: String,
    pub last_generation: Option<u64>,
    pub refreshed_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectionView {
    pub amount: String,
    pub display: String,
    pub at_ms: i64,
}
