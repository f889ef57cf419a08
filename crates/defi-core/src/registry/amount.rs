use std::sync::OnceLock;

use alloy::primitives::U256;
use regex::Regex;
use serde::Serialize;

use crate::error::{DefiError, Result};

fn base_units_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+$").expect("valid regex"))
}

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").expect("valid regex"))
}

/// An amount in both representations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedAmount {
    /// Base-unit integer string.
    pub base_units: String,
    pub decimal: String,
}

impl NormalizedAmount {
    pub fn value(&self) -> Result<U256> {
        parse_base_units("amount", &self.base_units)
    }
}

/// Normalize a user amount given either in base units or in decimal form.
///
/// Exactly one of `base_units` / `decimal` must be set. Decimal input needs
/// the asset's `decimals` and may not carry more fractional digits than it.
pub fn normalize_amount(
    base_units: Option<&str>,
    decimal: Option<&str>,
    decimals: Option<u8>,
) -> Result<NormalizedAmount> {
    let base_units = base_units.map(str::trim).filter(|s| !s.is_empty());
    let decimal = decimal.map(str::trim).filter(|s| !s.is_empty());

    let value = match (base_units, decimal) {
        (Some(_), Some(_)) => {
            return Err(DefiError::usage(
                "use either --amount (base units) or --amount-decimal, not both",
            ))
        }
        (None, None) => {
            return Err(DefiError::usage(
                "an amount is required (--amount or --amount-decimal)",
            ))
        }
        (Some(raw), None) => parse_base_units("amount", raw)?,
        (None, Some(raw)) => {
            let decimals = decimals.ok_or_else(|| {
                DefiError::usage(
                    "asset decimals are unknown; pass --decimals or use --amount in base units",
                )
            })?;
            parse_units(raw, decimals)?
        }
    };

    Ok(NormalizedAmount {
        base_units: value.to_string(),
        decimal: match decimals {
            Some(d) => format_units(value, d),
            None => value.to_string(),
        },
    })
}

/// Parse a non-negative base-unit integer that must fit in 256 bits.
pub fn parse_base_units(field: &str, raw: &str) -> Result<U256> {
    let raw = raw.trim();
    if !base_units_re().is_match(raw) {
        return Err(DefiError::usage(format!(
            "{field} must be a non-negative integer in base units, got '{raw}'"
        )));
    }
    U256::from_str_radix(raw, 10)
        .map_err(|_| DefiError::usage(format!("{field} '{raw}' does not fit in 256 bits")))
}

/// Parse a decimal string into base units with `decimals` fractional digits.
pub fn parse_units(raw: &str, decimals: u8) -> Result<U256> {
    let raw = raw.trim();
    if !decimal_re().is_match(raw) {
        return Err(DefiError::usage(format!(
            "amount must be a non-negative decimal number, got '{raw}'"
        )));
    }
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw, ""));
    if frac_part.len() > decimals as usize {
        return Err(DefiError::usage(format!(
            "amount '{raw}' has more than {decimals} decimal places"
        )));
    }
    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(int_part);
    digits.push_str(frac_part);
    for _ in frac_part.len()..decimals as usize {
        digits.push('0');
    }
    U256::from_str_radix(&digits, 10)
        .map_err(|_| DefiError::usage(format!("amount '{raw}' does not fit in 256 bits")))
}

/// Render base units as a decimal string without trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_input_converts_to_base_units() {
        let amount = normalize_amount(None, Some("1000.5"), Some(6)).unwrap();
        assert_eq!(amount.base_units, "1000500000");
        assert_eq!(amount.decimal, "1000.5");
    }

    #[test]
    fn base_units_input_renders_decimal() {
        let amount = normalize_amount(Some("1000000"), None, Some(6)).unwrap();
        assert_eq!(amount.base_units, "1000000");
        assert_eq!(amount.decimal, "1");
    }

    #[test]
    fn exactly_one_input_is_required() {
        assert!(normalize_amount(Some("1"), Some("1"), Some(6)).is_err());
        assert!(normalize_amount(None, None, Some(6)).is_err());
        assert!(normalize_amount(Some("  "), None, Some(6)).is_err());
    }

    #[test]
    fn precision_beyond_decimals_is_rejected() {
        let err = normalize_amount(None, Some("0.1234567"), Some(6)).unwrap_err();
        assert!(err.to_string().contains("6 decimal places"));
    }

    #[test]
    fn decimal_input_needs_known_decimals() {
        assert!(normalize_amount(None, Some("1.5"), None).is_err());
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(parse_base_units("amount", "-1").is_err());
        assert!(parse_base_units("amount", "1e6").is_err());
        assert!(parse_units("1.", 6).is_err());
    }

    #[test]
    fn overflow_is_usage_error() {
        let too_big = "1".repeat(80);
        let err = parse_base_units("amount", &too_big).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Usage);
    }

    #[test]
    fn format_units_small_values() {
        assert_eq!(format_units(U256::from(5u64), 6), "0.000005");
        assert_eq!(format_units(U256::ZERO, 18), "0");
        assert_eq!(format_units(U256::from(1_500_000_000u64), 9), "1.5");
    }
}
