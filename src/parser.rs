// src/parser.rs
use alloy::primitives::Address;
use thiserror::Error;

use crate::amount::{parse_amount, AmountError};
use crate::models::FlowRecord;
use crate::subgraph::RawStream;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("invalid account id {0:?}")]
    Account(String),
    #[error("invalid timestamp {0:?}")]
    Timestamp(String),
}

fn decode_account(id: &str) -> Result<Address, DecodeError> {
    id.trim()
        .parse::<Address>()
        .map_err(|_| DecodeError::Account(id.to_string()))
}

/// Decode a subgraph stream row into a `FlowRecord` for `token`.
pub fn decode_stream(token: Address, raw: &RawStream) -> Result<FlowRecord, DecodeError> {
    let updated_at = raw
        .updated_at_timestamp
        .trim()
        .parse::<i64>()
        .map_err(|_| DecodeError::Timestamp(raw.updated_at_timestamp.clone()))?;

    Ok(FlowRecord {
        token,
        sender: decode_account(&raw.sender.id)?,
        receiver: decode_account(&raw.receiver.id)?,
        flow_rate: parse_amount(&raw.current_flow_rate)?,
        streamed_until_updated: parse_amount(&raw.streamed_until_updated_at)?,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::from_u64;
    use crate::subgraph::AccountRef;

    fn raw(flow_rate: &str, streamed: &str, ts: &str) -> RawStream {
        RawStream {
            sender: AccountRef { id: "0x1111111111111111111111111111111111111111".into() },
            receiver: AccountRef { id: "0x2222222222222222222222222222222222222222".into() },
            current_flow_rate: flow_rate.into(),
            streamed_until_updated_at: streamed.into(),
            updated_at_timestamp: ts.into(),
        }
    }

    #[test]
    fn decodes_a_well_formed_row() {
        let token = Address::repeat_byte(0xee);
        let record = decode_stream(token, &raw("385", "1000", "1700000000")).unwrap();
        assert_eq!(record.token, token);
        assert_eq!(record.sender, Address::repeat_byte(0x11));
        assert_eq!(record.receiver, Address::repeat_byte(0x22));
        assert_eq!(record.flow_rate, from_u64(385));
        assert_eq!(record.streamed_until_updated, from_u64(1000));
        assert_eq!(record.updated_at, 1_700_000_000);
    }

    #[test]
    fn malformed_amounts_are_not_zeroed() {
        let err = decode_stream(Address::ZERO, &raw("12.5", "0", "1")).unwrap_err();
        assert!(matches!(err, DecodeError::Amount(AmountError::Malformed(_))));
    }

    #[test]
    fn bad_timestamp_and_account_are_reported() {
        assert!(matches!(
            decode_stream(Address::ZERO, &raw("1", "1", "soon")),
            Err(DecodeError::Timestamp(_))
        ));

        let mut row = raw("1", "1", "1");
        row.sender.id = "0xnothex".into();
        assert!(matches!(decode_stream(Address::ZERO, &row), Err(DecodeError::Account(_))));
    }
}
