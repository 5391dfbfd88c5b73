//! Token amount conversion
//!
//! Exact conversion between human-readable decimal strings and raw token
//! units. Unlike float conversion, excess precision is an error rather than
//! being silently truncated.

use alloy::primitives::{utils, U256};
use eyre::{bail, eyre, Result};

/// Parse a decimal amount such as `"1.25"` into raw units
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        bail!("Amount is empty");
    }
    if amount.starts_with('-') {
        bail!("Amount must not be negative: {}", amount);
    }
    if let Some((_, fraction)) = amount.split_once('.') {
        if fraction.len() > decimals as usize {
            bail!(
                "Amount {} has more than {} decimal places",
                amount,
                decimals
            );
        }
    }

    let parsed = utils::parse_units(amount, decimals)
        .map_err(|e| eyre!("Invalid amount '{}': {}", amount, e))?;
    Ok(parsed.get_absolute())
}

/// Format raw units as a decimal string without trailing zeros
pub fn format_units(raw: U256, decimals: u8) -> Result<String> {
    let formatted = utils::format_units(raw, decimals)
        .map_err(|e| eyre!("Cannot format {} with {} decimals: {}", raw, decimals, e))?;

    if formatted.contains('.') {
        Ok(formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string())
    } else {
        Ok(formatted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_units("1.5", 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(parse_units("0.000001", 6).unwrap(), U256::from(1u64));
        assert_eq!(
            parse_units("100", 18).unwrap(),
            U256::from(100_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_parse_units_rejects_excess_precision() {
        assert!(parse_units("1.0000001", 6).is_err());
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        assert!(parse_units("", 6).is_err());
        assert!(parse_units("-1", 6).is_err());
        assert!(parse_units("one", 6).is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(1_500_000u64), 6).unwrap(), "1.5");
        assert_eq!(format_units(U256::from(1_000_000u64), 6).unwrap(), "1");
        assert_eq!(format_units(U256::from(1u64), 6).unwrap(), "0.000001");
        assert_eq!(format_units(U256::from(1_250_000u64), 6).unwrap(), "1.25");
    }
}
