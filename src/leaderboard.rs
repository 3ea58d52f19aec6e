// src/leaderboard.rs
use alloy::primitives::{Address, I256};

use crate::aggregator::{aggregate, group_by_sender, token_summary};
use crate::amount::{format_units, scale_flow_rate, FlowPeriod};
use crate::config::TokenContext;
use crate::db::RefreshInfo;
use crate::models::{
    AccountView, AggregatedAccountStats, FlowRecord, LeaderboardRow, LeaderboardView, RankCandidate,
    SummaryView,
};
use crate::ranker::rank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    FlowRate,
    Volume,
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
    pub viewer: Option<Address>,
}

impl PageRequest {
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }
}

fn for_token(ctx: &TokenContext, records: &[FlowRecord]) -> Vec<FlowRecord> {
    records.iter().filter(|r| r.token == ctx.token).cloned().collect()
}

fn per_month(ctx: &TokenContext, rate: I256) -> String {
    format_units(scale_flow_rate(rate, FlowPeriod::Month), ctx.decimals, ctx.display_decimals)
}

pub fn leaderboard(
    ctx: &TokenContext,
    records: &[FlowRecord],
    metric: Metric,
    request: &PageRequest,
    now_ms: i64,
) -> LeaderboardView {
    let records = for_token(ctx, records);
    let accounts: Vec<(Address, AggregatedAccountStats)> = group_by_sender(&records)
        .into_iter()
        .map(|group| (group.account, aggregate(&group.records, now_ms)))
        .collect();

    let candidates = accounts
        .iter()
        .map(|(account, stats)| RankCandidate {
            account: *account,
            metric: match metric {
                Metric::FlowRate => stats.total_flow_rate,
                Metric::Volume => stats.total_streamed,
            },
        })
        .collect();

    let mut ranked = rank(candidates, request.page_size, request.offset());
    if let Some(viewer) = &request.viewer {
        ranked = ranked.mark_viewer(viewer);
    }

    let entries = ranked
        .page
        .into_iter()
        .map(|entry| {
            let stats = accounts
                .iter()
                .find(|(account, _)| *account == entry.account)
                .map(|(_, stats)| stats);
            let (flow_rate, streamed) = stats
                .map(|s| (s.total_flow_rate, s.total_streamed))
                .unwrap_or((I256::ZERO, I256::ZERO));

            LeaderboardRow {
                rank: entry.rank,
                account: entry.account.to_string(),
                metric: entry.metric.to_string(),
                metric_display: match metric {
                    Metric::FlowRate => per_month(ctx, entry.metric),
                    Metric::Volume => format_units(entry.metric, ctx.decimals, ctx.display_decimals),
                },
                flow_rate_per_month: per_month(ctx, flow_rate),
                total_streamed: format_units(streamed, ctx.decimals, ctx.display_decimals),
                is_current_user: entry.is_current_user,
            }
        })
        .collect();

    LeaderboardView {
        token: ctx.token.to_string(),
        symbol: ctx.symbol.clone(),
        chain_id: ctx.chain_id,
        page: request.page,
        page_size: request.page_size,
        has_next_page: ranked.has_next_page,
        entries,
    }
}

pub fn account_view(ctx: &TokenContext, records: &[FlowRecord], account: Address, now_ms: i64) -> AccountView {
    let owned: Vec<FlowRecord> = for_token(ctx, records)
        .into_iter()
        .filter(|r| r.sender == account)
        .collect();
    let stats = aggregate(&owned, now_ms);

    AccountView {
        account: account.to_string(),
        token: ctx.token.to_string(),
        symbol: ctx.symbol.clone(),
        total_flow_rate: stats.total_flow_rate.to_string(),
        flow_rate_per_month: per_month(ctx, stats.total_flow_rate),
        total_streamed: stats.total_streamed.to_string(),
        total_streamed_display: format_units(stats.total_streamed, ctx.decimals, ctx.display_decimals),
        latest_update_timestamp: stats.latest_update_timestamp,
        streams: stats.record_count,
    }
}

pub fn summary_view(
    ctx: &TokenContext,
    records: &[FlowRecord],
    refresh: Option<&RefreshInfo>,
    now_ms: i64,
) -> SummaryView {
    let summary = token_summary(&for_token(ctx, records), now_ms);

    SummaryView {
        token: ctx.token.to_string(),
        symbol: ctx.symbol.clone(),
        chain_id: ctx.chain_id,
        active_streams: summary.active_streams,
        senders: summary.senders,
        receivers: summary.receivers,
        total_flow_rate_per_month: per_month(ctx, summary.total_flow_rate),
        total_streamed_display: format_units(summary.total_streamed, ctx.decimals, ctx.display_decimals),
        last_generation: refresh.map(|r| r.generation),
        refreshed_at: refresh.map(|r| r.applied_at.clone()),
    }
}
