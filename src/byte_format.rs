use anyhow::{anyhow, Result};

const KILO: u64 = 1_000;
const MEGA: u64 = 1_000_000;
const GIGA: u64 = 1_000_000_000;

/// Convert a top(1) memory column to bytes
///
/// Values are kilobytes unless they carry an `m` or `g` suffix. Scaled values
/// may have a fractional part (`1.5g`), which is applied exactly.
pub fn to_bytes(value: &str) -> Result<u64> {
    let value = value.trim();
    if value.contains('g') {
        scale_decimal(value, GIGA)
    } else if value.contains('m') {
        scale_decimal(value, MEGA)
    } else {
        let digits = leading_number(value);
        if digits.is_empty() || digits == "." {
            return Err(anyhow!("invalid memory value '{}'", value));
        }
        let whole = digits
            .split('.')
            .next()
            .unwrap_or_default();
        parse_digits(whole, value)?
            .checked_mul(KILO)
            .ok_or_else(|| anyhow!("memory value '{}' is too large", value))
    }
}

/// Numeric prefix of `value` (digits and at most one dot)
fn leading_number(value: &str) -> &str {
    let mut seen_dot = false;
    let end = value
        .char_indices()
        .find(|&(_, c)| {
            if c == '.' && !seen_dot {
                seen_dot = true;
                false
            } else {
                !c.is_ascii_digit()
            }
        })
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    &value[..end]
}

fn parse_digits(digits: &str, original: &str) -> Result<u64> {
    if digits.is_empty() {
        return Ok(0);
    }
    digits
        .parse::<u64>()
        .map_err(|e| anyhow!("invalid memory value '{}': {}", original, e))
}

fn scale_decimal(value: &str, unit: u64) -> Result<u64> {
    let number = leading_number(value);
    if number.is_empty() || number == "." {
        return Err(anyhow!("invalid memory value '{}'", value));
    }

    let (whole, fraction) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };

    let whole = parse_digits(whole, value)?;
    let mut scaled = whole
        .checked_mul(unit)
        .ok_or_else(|| anyhow!("memory value '{}' is too large", value))?;

    // Digits beyond the unit's precision are truncated
    let mut place = unit;
    for digit in fraction.chars() {
        place /= 10;
        if place == 0 {
            break;
        }
        let d = digit.to_digit(10).unwrap_or(0) as u64;
        scaled = scaled
            .checked_add(d * place)
            .ok_or_else(|| anyhow!("memory value '{}' is too large", value))?;
    }

    Ok(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_values_are_kilobytes() {
        assert_eq!(to_bytes("123456").unwrap(), 123_456_000);
        assert_eq!(to_bytes("  2048 ").unwrap(), 2_048_000);
        assert_eq!(to_bytes("0").unwrap(), 0);
    }

    #[test]
    fn test_megabyte_and_gigabyte_suffixes() {
        assert_eq!(to_bytes("512m").unwrap(), 512_000_000);
        assert_eq!(to_bytes("1.5g").unwrap(), 1_500_000_000);
        assert_eq!(to_bytes("0.3g").unwrap(), 300_000_000);
        assert_eq!(to_bytes("1.234m").unwrap(), 1_234_000);
        assert_eq!(to_bytes("2.0001234567g").unwrap(), 2_000_123_456);
    }

    #[test]
    fn test_kilobyte_fraction_is_dropped() {
        assert_eq!(to_bytes("12.9").unwrap(), 12_000);
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(to_bytes("18446744073709551615").is_err());
        assert!(to_bytes("18446744073.9g").is_err());
    }

    #[test]
    fn test_invalid_scaled_value() {
        assert!(to_bytes("g").is_err());
        assert!(to_bytes(".m").is_err());
    }

    #[test]
    fn test_non_numeric_kilobytes_are_rejected() {
        assert!(to_bytes("abc").is_err());
        assert!(to_bytes("").is_err());
        assert!(to_bytes("   ").is_err());
        assert!(to_bytes(".").is_err());
        assert_eq!(to_bytes(".5").unwrap(), 0);
    }

    proptest! {
        #[test]
        fn prop_kilobytes_scale_by_thousand(kb in 0u64..10_000_000) {
            prop_assert_eq!(to_bytes(&kb.to_string()).unwrap(), kb * 1000);
        }

        #[test]
        fn prop_megabytes_with_three_decimals(whole in 0u64..100_000, frac in 0u64..1000) {
            let value = format!("{}.{:03}m", whole, frac);
            prop_assert_eq!(to_bytes(&value).unwrap(), whole * 1_000_000 + frac * 1000);
        }
    }
}
