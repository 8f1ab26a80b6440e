//! Exact decimal amounts.
//!
//! On-chain quantities are integers in the token's smallest unit. Everything
//! here works on `BigUint` so that parsing, comparison and formatting never go
//! through binary floating point.

use num_bigint::BigUint;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

use crate::error::VaultError;

/// Largest decimal exponent accepted from user input or external data.
const MAX_DECIMALS: u8 = 77;

fn pow10(exp: u32) -> BigUint {
    BigUint::from(10u32).pow(exp)
}

/// Token quantity in smallest units plus the token's decimal exponent.
#[derive(Clone, Debug)]
pub struct AssetAmount {
    raw: BigUint,
    decimals: u8,
}

impl AssetAmount {
    pub fn new(raw: BigUint, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn from_raw(raw: u64, decimals: u8) -> Self {
        Self::new(BigUint::from(raw), decimals)
    }

    pub fn zero(decimals: u8) -> Self {
        Self::new(BigUint::default(), decimals)
    }

    /// Parse a user-facing decimal string ("123.45") into smallest units.
    ///
    /// Rejects signs, exponent notation and more fractional digits than the
    /// token supports; nothing is rounded.
    pub fn parse(input: &str, decimals: u8) -> Result<Self, VaultError> {
        if decimals > MAX_DECIMALS {
            return Err(VaultError::invalid_amount(format!(
                "unsupported decimal exponent {}",
                decimals
            )));
        }

        let s = input.trim();
        if s.is_empty() {
            return Err(VaultError::invalid_amount("amount is empty"));
        }
        if s.starts_with('-') {
            return Err(VaultError::invalid_amount(format!(
                "negative amount '{}'",
                s
            )));
        }

        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        let is_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty()) || !is_digits(int_part) || !is_digits(frac_part)
        {
            return Err(VaultError::invalid_amount(format!(
                "'{}' is not a decimal number",
                s
            )));
        }

        let width = decimals as usize;
        if frac_part.len() > width {
            return Err(VaultError::invalid_amount(format!(
                "'{}' has more than {} decimal places",
                s, decimals
            )));
        }

        let digits = format!("{}{:0<width$}", int_part, frac_part, width = width);
        let raw = BigUint::parse_bytes(digits.as_bytes(), 10)
            .ok_or_else(|| VaultError::invalid_amount(format!("'{}' is not a decimal number", s)))?;

        Ok(Self { raw, decimals })
    }

    /// Parse a base-10 integer string already in smallest units.
    pub fn from_raw_str(raw: &str, decimals: u8) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        BigUint::parse_bytes(raw.as_bytes(), 10).map(|raw| Self { raw, decimals })
    }

    pub fn raw(&self) -> &BigUint {
        &self.raw
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.raw == BigUint::default()
    }

    /// Re-express in another exponent. `None` if scaling down would drop
    /// non-zero digits.
    pub fn rescale(&self, decimals: u8) -> Option<Self> {
        match decimals.cmp(&self.decimals) {
            Ordering::Equal => Some(self.clone()),
            Ordering::Greater => Some(Self {
                raw: &self.raw * pow10(u32::from(decimals - self.decimals)),
                decimals,
            }),
            Ordering::Less => {
                let divisor = pow10(u32::from(self.decimals - decimals));
                if &self.raw % &divisor != BigUint::default() {
                    return None;
                }
                Some(Self {
                    raw: &self.raw / &divisor,
                    decimals,
                })
            }
        }
    }

    /// Fixed-decimal rendering with trailing fractional zeros trimmed
    /// (`1500000` at 6 decimals is `"1.5"`).
    pub fn format(&self) -> String {
        let digits = self.raw.to_str_radix(10);
        let d = self.decimals as usize;
        if d == 0 {
            return digits;
        }

        let padded = format!("{:0>width$}", digits, width = d + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - d);
        let frac_part = frac_part.trim_end_matches('0');
        if frac_part.is_empty() {
            int_part.to_string()
        } else {
            format!("{}.{}", int_part, frac_part)
        }
    }
}

impl Ord for AssetAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.decimals == other.decimals {
            return self.raw.cmp(&other.raw);
        }
        let target = self.decimals.max(other.decimals);
        let lhs = &self.raw * pow10(u32::from(target - self.decimals));
        let rhs = &other.raw * pow10(u32::from(target - other.decimals));
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for AssetAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for AssetAmount {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AssetAmount {}

impl std::fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

impl Serialize for AssetAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("AssetAmount", 3)?;
        s.serialize_field("raw", &self.raw.to_str_radix(10))?;
        s.serialize_field("decimals", &self.decimals)?;
        s.serialize_field("formatted", &self.format())?;
        s.end()
    }
}

/// Non-negative USD value as reported by the indexer.
///
/// Held as `mantissa * 10^-scale` so the 6-digit rendering is exact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsdValue {
    mantissa: BigUint,
    scale: u32,
}

impl UsdValue {
    pub const DISPLAY_DIGITS: u32 = 6;

    /// Accepts plain decimals ("1234.5") and the exponent form JSON
    /// serializers emit for very small or large floats ("1.5e-7").
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        let (mantissa_str, exp) = match s.find(|c: char| c == 'e' || c == 'E') {
            Some(idx) => {
                let exp: i32 = s[idx + 1..].parse().ok()?;
                (&s[..idx], exp)
            }
            None => (s, 0),
        };
        if !(-256..=256).contains(&exp) {
            return None;
        }

        let (int_part, frac_part) = mantissa_str.split_once('.').unwrap_or((mantissa_str, ""));
        let is_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty()) || !is_digits(int_part) || !is_digits(frac_part)
        {
            return None;
        }

        let digits = format!("{}{}", int_part, frac_part);
        let mut mantissa = BigUint::parse_bytes(digits.as_bytes(), 10)?;
        let scale = frac_part.len() as i64 - i64::from(exp);
        let scale = if scale < 0 {
            mantissa *= pow10(scale.unsigned_abs() as u32);
            0
        } else {
            scale as u32
        };

        Some(Self { mantissa, scale })
    }

    /// Render with exactly `digits` fractional digits, rounding half up.
    pub fn format_fixed(&self, digits: u32) -> String {
        let scaled = if self.scale <= digits {
            &self.mantissa * pow10(digits - self.scale)
        } else {
            let divisor = pow10(self.scale - digits);
            let quotient = &self.mantissa / &divisor;
            let remainder = &self.mantissa % &divisor;
            if remainder * 2u32 >= divisor {
                quotient + 1u32
            } else {
                quotient
            }
        };

        let digits_str = scaled.to_str_radix(10);
        let d = digits as usize;
        if d == 0 {
            return digits_str;
        }
        let padded = format!("{:0>width$}", digits_str, width = d + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - d);
        format!("{}.{}", int_part, frac_part)
    }
}

impl std::fmt::Display for UsdValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_fixed(Self::DISPLAY_DIGITS))
    }
}

impl Serialize for UsdValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
