//! Ether unit conversion
//!
//! Amounts travel as integer wei (`U256`). Operators type and read ether as
//! decimal strings scaled by 10^18.

use super::types::ParseError;
use primitive_types::U256;

/// Decimal places between ether and wei
pub const ETHER_DECIMALS: usize = 18;

/// 10^18
pub fn wei_per_ether() -> U256 {
    U256::exp10(ETHER_DECIMALS)
}

/// Render `value / 10^decimals` as a decimal string with trailing zeros
/// trimmed
pub fn format_units(value: U256, decimals: usize) -> String {
    if decimals == 0 {
        return value.to_string();
    }

    let base = U256::exp10(decimals);
    let whole = value / base;
    let fraction = value % base;

    if fraction.is_zero() {
        return whole.to_string();
    }

    let padded = format!("{:0>width$}", fraction.to_string(), width = decimals);
    format!("{}.{}", whole, padded.trim_end_matches('0'))
}

/// Render a wei amount as ether
pub fn format_ether(wei: U256) -> String {
    format_units(wei, ETHER_DECIMALS)
}

/// Parse a decimal string into an integer scaled by 10^decimals
pub fn parse_units(input: &str, decimals: usize) -> Result<U256, ParseError> {
    let s = input.trim();
    let invalid = || ParseError::InvalidAmount(input.to_string());

    let (whole, fraction) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if fraction.len() > decimals {
        return Err(ParseError::TooManyDecimals {
            given: fraction.len(),
            max: decimals,
        });
    }

    let mut digits = String::with_capacity(whole.len() + decimals);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(decimals - fraction.len()));

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|_| ParseError::Overflow)
}

/// Parse an ether amount into wei
pub fn parse_ether(input: &str) -> Result<U256, ParseError> {
    parse_units(input, ETHER_DECIMALS)
}
