// src/projector.rs
use alloy::primitives::I256;

use crate::amount::from_u64;
use crate::models::FlowRecord;

const MILLIS_PER_SECOND: u64 = 1_000;

/// Balance of a constant-rate flow at `now_ms`.
///
/// `initial_timestamp` is unix seconds, `now_ms` unix milliseconds. The rate is
/// multiplied by the elapsed milliseconds and only then divided by 1000, so
/// sub-second reads never accumulate truncation error. Reads before the
/// checkpoint return `initial_amount`.
pub fn project(initial_amount: I256, initial_timestamp: i64, flow_rate: I256, now_ms: i64) -> I256 {
    let origin_ms = initial_timestamp.saturating_mul(MILLIS_PER_SECOND as i64);
    let elapsed_ms = now_ms.saturating_sub(origin_ms).max(0) as u64;

    let accrued = flow_rate.saturating_mul(from_u64(elapsed_ms)) / from_u64(MILLIS_PER_SECOND);
    initial_amount.saturating_add(accrued)
}

pub fn project_record(record: &FlowRecord, now_ms: i64) -> I256 {
    project(
        record.streamed_until_updated,
        record.updated_at,
        record.flow_rate,
        now_ms,
    )
}
