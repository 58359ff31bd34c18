//! Conversion between human-facing quantities and base units.
//!
//! All arithmetic is done on [`BigUint`]; no floating point is involved at
//! any stage, so every decimal count up to [`MAX_DECIMALS`] is exact.

use crate::error::Error;
use num_bigint::BigUint;

/// Largest decimal count an asset may declare.
pub const MAX_DECIMALS: u8 = 19;

/// `10^decimals` as an arbitrary-precision integer.
pub fn scale(decimals: u8) -> Result<BigUint, Error> {
    if decimals > MAX_DECIMALS {
        return Err(Error::InvalidAmount(format!(
            "decimals must be between 0 and {}, got {}",
            MAX_DECIMALS, decimals
        )));
    }
    Ok(BigUint::from(10u8).pow(u32::from(decimals)))
}

/// Parse a non-negative integer literal.
///
/// Only ASCII digits are accepted: no sign, no fraction, no exponent, no
/// surrounding whitespace.
pub fn parse_whole(human: &str) -> Result<BigUint, Error> {
    if human.is_empty() {
        return Err(Error::InvalidAmount("amount is empty".to_string()));
    }
    if !human.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidAmount(format!(
            "{:?} is not a non-negative integer",
            human
        )));
    }
    BigUint::parse_bytes(human.as_bytes(), 10)
        .ok_or_else(|| Error::InvalidAmount(format!("{:?} is not a number", human)))
}

/// Convert a human quantity into base units: `human * 10^decimals`.
pub fn to_base_units(human: &str, decimals: u8) -> Result<BigUint, Error> {
    let factor = scale(decimals)?;
    Ok(parse_whole(human)? * factor)
}

/// Render a base-unit amount as an exact decimal string.
///
/// Trailing zeros in the fractional part are dropped, so `1_500_000` with six
/// decimals renders as `"1.5"`.
pub fn from_base_units(base: &BigUint, decimals: u8) -> Result<String, Error> {
    let factor = scale(decimals)?;
    let whole = base / &factor;
    let frac = base % &factor;

    if decimals == 0 || frac == BigUint::from(0u8) {
        return Ok(whole.to_string());
    }

    let digits = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    Ok(format!("{}.{}", whole, digits.trim_end_matches('0')))
}

/// Narrow a base-unit amount to the ledger's native 64-bit representation.
pub fn base_units_u64(base: &BigUint) -> Result<u64, Error> {
    u64::try_from(base)
        .map_err(|_| Error::InvalidAmount(format!("{} exceeds the ledger maximum", base)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units("1", 6).unwrap(), BigUint::from(1_000_000u64));
        assert_eq!(to_base_units("1000", 0).unwrap(), BigUint::from(1000u64));
        assert_eq!(to_base_units("0", 19).unwrap(), BigUint::from(0u8));
        assert_eq!(
            to_base_units("18446744073709551615", 19).unwrap().to_string(),
            "184467440737095516150000000000000000000"
        );
    }

    #[test]
    fn test_rejects_non_integers() {
        for bad in ["", "1.5", "+1", "-1", "1e6", " 1", "1 ", "0x10", "½", "١"] {
            assert!(
                matches!(to_base_units(bad, 6), Err(Error::InvalidAmount(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_rejects_large_decimals() {
        assert!(matches!(to_base_units("1", 20), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(from_base_units(&BigUint::from(1_500_000u64), 6).unwrap(), "1.5");
        assert_eq!(from_base_units(&BigUint::from(1u64), 6).unwrap(), "0.000001");
        assert_eq!(from_base_units(&BigUint::from(42u64), 0).unwrap(), "42");
        assert_eq!(from_base_units(&BigUint::from(2_000_000u64), 6).unwrap(), "2");
    }

    #[test]
    fn test_u64_narrowing() {
        assert_eq!(base_units_u64(&BigUint::from(u64::MAX)).unwrap(), u64::MAX);
        let over = BigUint::from(u64::MAX) + BigUint::from(1u8);
        assert!(matches!(base_units_u64(&over), Err(Error::InvalidAmount(_))));
    }

    proptest! {
        #[test]
        fn prop_base_units_roundtrip(human in "[0-9]{1,40}", decimals in 0u8..=19) {
            let base = to_base_units(&human, decimals).unwrap();
            let factor = scale(decimals).unwrap();
            prop_assert_eq!(&base % &factor, BigUint::from(0u8));
            prop_assert_eq!(base / factor, BigUint::parse_bytes(human.as_bytes(), 10).unwrap());
        }
    }
}
