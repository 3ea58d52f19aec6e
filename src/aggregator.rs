// src/aggregator.rs
use std::collections::{HashMap, HashSet};

use alloy::primitives::{Address, I256};

use crate::models::{AccountFlows, AggregatedAccountStats, FlowRecord, TokenSummary};
use crate::projector::project_record;

/// Sum one account's records, projecting each from its own checkpoint.
pub fn aggregate(records: &[FlowRecord], now_ms: i64) -> AggregatedAccountStats {
    let mut stats = AggregatedAccountStats {
        total_flow_rate: I256::ZERO,
        total_streamed: I256::ZERO,
        latest_update_timestamp: None,
        record_count: records.len(),
    };

    for record in records {
        stats.total_flow_rate = stats.total_flow_rate.saturating_add(record.flow_rate);
        stats.total_streamed = stats
            .total_streamed
            .saturating_add(project_record(record, now_ms));
        stats.latest_update_timestamp = Some(
            stats
                .latest_update_timestamp
                .map_or(record.updated_at, |ts| ts.max(record.updated_at)),
        );
    }

    stats
}

/// Group records by sender. Senders keep first-seen order, records keep input order.
pub fn group_by_sender(records: &[FlowRecord]) -> Vec<AccountFlows> {
    let mut index: HashMap<Address, usize> = HashMap::new();
    let mut groups: Vec<AccountFlows> = Vec::new();

    for record in records {
        let slot = *index.entry(record.sender).or_insert_with(|| {
            groups.push(AccountFlows {
                account: record.sender,
                records: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].records.push(record.clone());
    }

    groups
}

pub fn token_summary(records: &[FlowRecord], now_ms: i64) -> TokenSummary {
    let senders: HashSet<Address> = records.iter().map(|r| r.sender).collect();
    let receivers: HashSet<Address> = records.iter().map(|r| r.receiver).collect();
    let active: Vec<&FlowRecord> = records.iter().filter(|r| r.flow_rate.is_positive()).collect();

    let total_flow_rate = active
        .iter()
        .fold(I256::ZERO, |acc, r| acc.saturating_add(r.flow_rate));
    let total_streamed = records
        .iter()
        .fold(I256::ZERO, |acc, r| acc.saturating_add(project_record(r, now_ms)));

    TokenSummary {
        active_streams: active.len(),
        senders: senders.len(),
        receivers: receivers.len(),
        total_flow_rate,
        total_streamed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::parse_amount;
    use crate::projector::project_record;

    const T0: i64 = 1_700_000_000;

    fn amt(s: &str) -> I256 {
        parse_amount(s).unwrap()
    }

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn record(sender: u8, receiver: u8, rate: &str, streamed: &str, updated_at: i64) -> FlowRecord {
        FlowRecord {
            token: addr(0xee),
            sender: addr(sender),
            receiver: addr(receiver),
            flow_rate: amt(rate),
            streamed_until_updated: amt(streamed),
            updated_at,
        }
    }

    #[test]
    fn empty_list_is_all_zero() {
        let stats = aggregate(&[], T0 * 1_000);
        assert_eq!(stats.total_flow_rate, I256::ZERO);
        assert_eq!(stats.total_streamed, I256::ZERO);
        assert_eq!(stats.latest_update_timestamp, None);
        assert_eq!(stats.record_count, 0);
    }

    #[test]
    fn totals_are_sums_of_independent_projections() {
        let r1 = record(1, 2, "10", "1000", T0);
        let r2 = record(1, 3, "7", "50", T0 + 100);
        let now_ms = (T0 + 250) * 1_000 + 333;

        let stats = aggregate(&[r1.clone(), r2.clone()], now_ms);
        assert_eq!(
            stats.total_streamed,
            project_record(&r1, now_ms) + project_record(&r2, now_ms)
        );
        assert_eq!(stats.total_flow_rate, amt("17"));
        assert_eq!(stats.latest_update_timestamp, Some(T0 + 100));
        assert_eq!(stats.record_count, 2);
    }

    #[test]
    fn each_record_accrues_from_its_own_timestamp() {
        // Projecting both from the latest checkpoint would give 1000 + 50 + 17*150.
        let records = [record(1, 2, "10", "1000", T0), record(1, 3, "7", "50", T0 + 100)];
        let stats = aggregate(&records, (T0 + 250) * 1_000);
        assert_eq!(stats.total_streamed, amt("4600"));
    }

    #[test]
    fn mixed_sign_rates_pass_through() {
        let records = [record(1, 2, "5", "0", T0), record(1, 3, "-8", "0", T0)];
        let stats = aggregate(&records, T0 * 1_000);
        assert_eq!(stats.total_flow_rate, amt("-3"));

        let balanced = [record(1, 2, "4", "0", T0), record(1, 3, "-4", "0", T0)];
        assert_eq!(aggregate(&balanced, T0 * 1_000).total_flow_rate, I256::ZERO);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let records = [record(1, 2, "123456789", "987654321", T0)];
        let now_ms = (T0 + 42) * 1_000 + 7;
        assert_eq!(aggregate(&records, now_ms), aggregate(&records, now_ms));
    }

    #[test]
    fn groups_preserve_first_seen_order() {
        let records = [
            record(2, 9, "1", "0", T0),
            record(1, 9, "2", "0", T0),
            record(2, 8, "3", "0", T0),
        ];
        let groups = group_by_sender(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].account, addr(2));
        assert_eq!(groups[0].records.len(), 2);
        assert_eq!(groups[0].records[1].flow_rate, amt("3"));
        assert_eq!(groups[1].account, addr(1));
    }

    #[test]
    fn summary_counts_active_streams_only_for_flow_rate() {
        let records = [
            record(1, 2, "10", "100", T0),
            record(1, 3, "0", "500", T0),
            record(4, 2, "5", "0", T0),
        ];
        let summary = token_summary(&records, (T0 + 10) * 1_000);
        assert_eq!(summary.active_streams, 2);
        assert_eq!(summary.senders, 2);
        assert_eq!(summary.receivers, 2);
        assert_eq!(summary.total_flow_rate, amt("15"));
        assert_eq!(summary.total_streamed, amt("750"));
    }
}
