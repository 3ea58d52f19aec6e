// src/amount.rs
use alloy::primitives::utils::{self as units, ParseUnits};
use alloy::primitives::{Sign, I256, U256};
use thiserror::Error;

/// Decimal exponent used by super tokens.
pub const DEFAULT_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("malformed amount: {0:?}")]
    Malformed(String),
    #[error("amount {value:?} has more than {decimals} fractional digits")]
    TooPrecise { value: String, decimals: u8 },
}

/// Lift a non-negative machine integer into the signed 256-bit amount space.
pub fn from_u64(value: u64) -> I256 {
    I256::from_raw(U256::from(value))
}

/// Parse an integer amount given as decimal digits (optionally negative).
pub fn parse_amount(raw: &str) -> Result<I256, AmountError> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Malformed(raw.to_string()));
    }
    I256::from_dec_str(trimmed).map_err(|_| AmountError::Malformed(raw.to_string()))
}

/// Render `raw / 10^decimals` with exactly `fraction_digits` digits after the point.
///
/// The division happens on the digit string, so nothing is lost for supplies
/// far beyond what an f64 can hold. Dropped digits round half away from zero.
pub fn format_units(raw: I256, decimals: u8, fraction_digits: usize) -> String {
    let decimals = decimals as usize;
    let mut digits = raw.unsigned_abs().to_string().into_bytes();

    if digits.len() <= decimals {
        let mut padded = vec![b'0'; decimals + 1 - digits.len()];
        padded.extend_from_slice(&digits);
        digits = padded;
    }

    let point = digits.len() - decimals;
    if fraction_digits >= decimals {
        digits.resize(point + fraction_digits, b'0');
    } else {
        let keep = point + fraction_digits;
        let round_up = digits[keep] >= b'5';
        digits.truncate(keep);
        if round_up {
            increment(&mut digits);
        }
    }

    let int_len = digits.len() - fraction_digits;
    let is_zero = digits.iter().all(|d| *d == b'0');

    let mut out = String::with_capacity(digits.len() + 2);
    if raw.is_negative() && !is_zero {
        out.push('-');
    }
    out.extend(digits[..int_len].iter().map(|d| *d as char));
    if fraction_digits > 0 {
        out.push('.');
        out.extend(digits[int_len..].iter().map(|d| *d as char));
    }
    out
}

/// Parse-then-format for amounts that arrive as decimal-digit strings.
pub fn format_amount(raw: &str, decimals: u8, fraction_digits: usize) -> Result<String, AmountError> {
    Ok(format_units(parse_amount(raw)?, decimals, fraction_digits))
}

/// Convert a human amount such as `"12.5"` back into base units.
///
/// Inputs with more fractional digits than `decimals` are rejected rather than truncated.
pub fn parse_units(display: &str, decimals: u8) -> Result<I256, AmountError> {
    let trimmed = display.trim();
    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (Sign::Negative, rest),
        None => (Sign::Positive, trimmed),
    };
    let malformed = || AmountError::Malformed(display.to_string());
    if !unsigned.bytes().any(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let frac_len = unsigned.split_once('.').map_or(0, |(_, frac)| frac.len());
    if frac_len > decimals as usize {
        return Err(AmountError::TooPrecise {
            value: display.to_string(),
            decimals,
        });
    }
    // anything wider than 77 digits cannot fit, and would wrap inside U256
    let significant = unsigned.replace('.', "").trim_start_matches('0').len();
    if significant + (decimals as usize - frac_len) > 77 {
        return Err(malformed());
    }

    let magnitude = match units::parse_units(unsigned, decimals).map_err(|_| malformed())? {
        ParseUnits::U256(value) => value,
        ParseUnits::I256(_) => return Err(malformed()),
    };
    I256::checked_from_sign_and_abs(sign, magnitude).ok_or_else(malformed)
}

fn increment(digits: &mut Vec<u8>) {
    for d in digits.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            return;
        }
    }
    digits.insert(0, b'1');
}

/// Display periods for flow rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPeriod {
    Second,
    Hour,
    Day,
    Week,
    /// 30 days, the month used by streaming-money dashboards.
    Month,
}

impl FlowPeriod {
    pub fn seconds(self) -> u64 {
        match self {
            FlowPeriod::Second => 1,
            FlowPeriod::Hour => 3_600,
            FlowPeriod::Day => 86_400,
            FlowPeriod::Week => 604_800,
            FlowPeriod::Month => 2_592_000,
        }
    }
}

/// Flow rate per second scaled up to `period`.
pub fn scale_flow_rate(rate_per_second: I256, period: FlowPeriod) -> I256 {
    rate_per_second.saturating_mul(from_u64(period.seconds()))
}
