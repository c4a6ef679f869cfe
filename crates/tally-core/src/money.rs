//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    Every value is an i64 count of minor units (cents).                  │
//! │    Construction only from exact decimal input - there is NO float      │
//! │    constructor, and "10.005" FAILS instead of truncating.              │
//! │                                                                         │
//! │  Rounding happens in exactly one place: rate multiplication, with      │
//! │  round-half-to-even at the minor-unit digit.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::{Money, TaxRate};
//!
//! let price = Money::from_minor_units(1000); // 10.00
//! let cost = price.mul_quantity(3);          // 30.00, exact
//!
//! let rate = TaxRate::from_bps(1900).unwrap(); // 19%
//! let tax = cost.tax(rate);                    // 5.70
//! assert_eq!(tax.minor_units(), 570);
//! ```

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Currency;
use crate::error::{CoreError, CoreResult};

// =============================================================================
// Parse Error
// =============================================================================

/// Construction failure for exact decimal input.
///
/// This is a data-level failure: document reads translate it into a
/// `Malformed` ledger entry, while settings-level callers treat it as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    /// Input has more fractional digits than the minor unit can hold.
    #[error("'{0}' does not land on a whole minor unit")]
    FractionalMinorUnit(String),

    /// Input is not a decimal number at all.
    #[error("'{0}' is not a decimal amount")]
    Malformed(String),

    /// Input is outside the representable i64 minor-unit range.
    #[error("'{0}' is outside the representable range")]
    OutOfRange(String),
}

// =============================================================================
// Scaled Decimal Parsing
// =============================================================================

/// Parses an exact decimal string into an integer scaled by `10^scale`.
///
/// Shared by [`Money::parse`] (scale 2) and the centi-hour quantities in the
/// derived-field pipeline. Fails on fractional input beyond the scale; never
/// truncates.
pub(crate) fn parse_scaled(raw: &str, scale: u32) -> Result<i64, MoneyParseError> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (integral, fraction) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };

    if integral.is_empty() && fraction.is_empty() {
        return Err(MoneyParseError::Malformed(raw.to_string()));
    }
    if !integral.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(MoneyParseError::Malformed(raw.to_string()));
    }
    if fraction.len() > scale as usize {
        // Trailing zeros beyond the scale are still exact ("10.000").
        if fraction[scale as usize..].chars().any(|c| c != '0') {
            return Err(MoneyParseError::FractionalMinorUnit(raw.to_string()));
        }
    }

    let mut units: i64 = 0;
    for c in integral.chars() {
        units = units
            .checked_mul(10)
            .and_then(|u| u.checked_add((c as u8 - b'0') as i64))
            .ok_or_else(|| MoneyParseError::OutOfRange(raw.to_string()))?;
    }
    for i in 0..scale as usize {
        let digit = fraction.as_bytes().get(i).map_or(0, |b| (b - b'0') as i64);
        units = units
            .checked_mul(10)
            .and_then(|u| u.checked_add(digit))
            .ok_or_else(|| MoneyParseError::OutOfRange(raw.to_string()))?;
    }

    Ok(if negative { -units } else { units })
}

/// Divides with round-half-to-even at the integer boundary.
///
/// The single documented rounding rule: applied at rate-multiplication
/// boundaries only, never on addition or quantity multiplication.
pub(crate) fn div_round_half_even(numerator: i128, denominator: i128) -> i64 {
    debug_assert!(denominator > 0);
    let negative = numerator < 0;
    let n = numerator.abs();
    let quotient = n / denominator;
    let remainder = n % denominator;

    let rounded = match (remainder * 2).cmp(&denominator) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + (quotient & 1),
    };
    let rounded = if negative { -rounded } else { rounded };
    rounded as i64
}

// =============================================================================
// Decoder Boundary
// =============================================================================

/// Converts a decoded document scalar into an exact scaled integer.
///
/// Integers are whole major units; strings go through the exact decimal
/// parser. A float scalar is re-rendered through its shortest decimal
/// spelling first, so `2.5` stays exact and `2.505` fails instead of
/// truncating. `Money` itself deliberately has no float constructor.
pub(crate) fn scaled_from_yaml(
    value: &serde_yaml::Value,
    scale: u32,
) -> Result<i64, MoneyParseError> {
    match value {
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                let factor = 10i64.pow(scale);
                i.checked_mul(factor)
                    .ok_or_else(|| MoneyParseError::OutOfRange(i.to_string()))
            } else if let Some(f) = n.as_f64() {
                parse_scaled(&format!("{f}"), scale)
            } else {
                Err(MoneyParseError::Malformed(format!("{n}")))
            }
        }
        serde_yaml::Value::String(s) => parse_scaled(s, scale),
        other => Err(MoneyParseError::Malformed(format!("{other:?}"))),
    }
}

/// Converts a decoded document scalar into Money (scale 2).
pub(crate) fn money_from_yaml(value: &serde_yaml::Value) -> Result<Money, MoneyParseError> {
    scaled_from_yaml(value, 2).map(Money)
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 1900 bps = 19%. A rate is a ratio
/// constrained to `0 ≤ rate ≤ 1`; anything above 10000 bps is a fatal
/// configuration error, never a document-validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points, rejecting rates above 100%.
    pub fn from_bps(bps: u32) -> CoreResult<Self> {
        if bps > 10_000 {
            return Err(CoreError::TaxRateOutOfRange { bps });
        }
        Ok(TaxRate(bps))
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: allows negative values for corrections
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **No float constructor**: exact decimal strings or integer minor units
///   only; the currency itself is fixed by configuration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units (cents).
    #[inline]
    pub const fn from_minor_units(units: i64) -> Self {
        Money(units)
    }

    /// Parses an exact decimal string ("12.50") into minor units.
    ///
    /// Fails, never truncates, on more than two fractional digits or on a
    /// value outside the i64 range.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::parse("12.50").unwrap().minor_units(), 1250);
    /// assert!(Money::parse("12.505").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, MoneyParseError> {
        parse_scaled(raw, 2).map(Money)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Returns the major-unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor-unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies by a unitless quantity. Exact, no rounding.
    #[inline]
    pub const fn mul_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies by a tax rate, rounding half-to-even at the minor unit.
    ///
    /// ## Round Half to Even
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  Standard rounding always rounds 0.5 UP, causing systematic bias:   │
    /// │    1.25 → 1.3, 1.35 → 1.4, 1.45 → 1.5  (always up = +bias)          │
    /// │                                                                     │
    /// │  Half-to-even rounds a tie to the nearest EVEN minor unit:          │
    /// │    12.5 ct → 12 ct, 13.5 ct → 14 ct    (alternates = no bias)       │
    /// │                                                                     │
    /// │  Over many line items this prevents systematic drift; the error    │
    /// │  per multiplication never exceeds half a minor unit.                │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::{Money, TaxRate};
    ///
    /// let cost = Money::from_minor_units(3000); // 30.00
    /// let rate = TaxRate::from_bps(1900).unwrap();
    /// assert_eq!(cost.tax(rate).minor_units(), 570); // 5.70
    /// ```
    pub fn tax(&self, rate: TaxRate) -> Money {
        // i128 widening prevents overflow on large amounts.
        Money(div_round_half_even(
            self.0 as i128 * rate.bps() as i128,
            10_000,
        ))
    }

    /// Renders the plain decimal spelling ("30.00") used for storage inside
    /// the document tree.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }

    /// Renders the value with the configured currency's conventions.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::config::Currency;
    /// use tally_core::money::Money;
    ///
    /// let euro = Currency::default();
    /// assert_eq!(Money::from_minor_units(123456).format_with(&euro), "1.234,56 €");
    /// ```
    pub fn format_with(&self, currency: &Currency) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let major = self.major().abs().to_string();

        let grouped = match currency.thousands_separator {
            None => major,
            Some(sep) => {
                let digits: Vec<char> = major.chars().rev().collect();
                let mut grouped = String::new();
                for (i, c) in digits.iter().enumerate() {
                    if i > 0 && i % 3 == 0 {
                        grouped.push(sep);
                    }
                    grouped.push(*c);
                }
                grouped.chars().rev().collect()
            }
        };

        let amount = format!(
            "{sign}{grouped}{}{:02}",
            currency.decimal_separator,
            self.minor_part()
        );
        if currency.symbol_leads {
            format!("{}{amount}", currency.symbol)
        } else {
            format!("{amount} {}", currency.symbol)
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the plain decimal spelling. Use `format_with` for
/// currency-aware rendering.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

/// Addition of two Money values. Exact, no rounding.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values. Exact, no rounding.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact_decimal() {
        assert_eq!(Money::parse("10.00").unwrap().minor_units(), 1000);
        assert_eq!(Money::parse("2.5").unwrap().minor_units(), 250);
        assert_eq!(Money::parse("7").unwrap().minor_units(), 700);
        assert_eq!(Money::parse("-5.50").unwrap().minor_units(), -550);
        assert_eq!(Money::parse("10.000").unwrap().minor_units(), 1000);
    }

    #[test]
    fn test_parse_rejects_fractional_minor_units() {
        assert_eq!(
            Money::parse("10.005"),
            Err(MoneyParseError::FractionalMinorUnit("10.005".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_garbage_and_overflow() {
        assert!(matches!(
            Money::parse("ten"),
            Err(MoneyParseError::Malformed(_))
        ));
        assert!(matches!(Money::parse(""), Err(MoneyParseError::Malformed(_))));
        assert!(matches!(
            Money::parse("99999999999999999999"),
            Err(MoneyParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_addition_is_exact_associative_commutative() {
        let a = Money::from_minor_units(1001);
        let b = Money::from_minor_units(2003);
        let c = Money::from_minor_units(4007);
        assert_eq!(a + b, b + a);
        assert_eq!((a + b) + c, a + (b + c));
        assert_eq!((a + b + c).minor_units(), 7011);
    }

    #[test]
    fn test_quantity_multiplication_is_exact() {
        let price = Money::from_minor_units(1000);
        assert_eq!(price.mul_quantity(5).minor_units(), 5000);
        assert_eq!(price.mul_quantity(0).minor_units(), 0);
    }

    #[test]
    fn test_tax_exact_case() {
        // 30.00 × 19% = 5.70 with no rounding needed
        let cost = Money::from_minor_units(3000);
        let rate = TaxRate::from_bps(1900).unwrap();
        assert_eq!(cost.tax(rate).minor_units(), 570);
    }

    #[test]
    fn test_tax_rounds_half_to_even() {
        let rate = TaxRate::from_bps(1000).unwrap(); // 10%
        // 1.25 × 10% = 12.5 ct → 12 (down to even)
        assert_eq!(Money::from_minor_units(125).tax(rate).minor_units(), 12);
        // 1.35 × 10% = 13.5 ct → 14 (up to even)
        assert_eq!(Money::from_minor_units(135).tax(rate).minor_units(), 14);
        // Non-tie rounds normally: 1.26 × 10% = 12.6 ct → 13
        assert_eq!(Money::from_minor_units(126).tax(rate).minor_units(), 13);
    }

    #[test]
    fn test_tax_error_bounded_by_half_minor_unit() {
        let rate = TaxRate::from_bps(1900).unwrap();
        for units in [1, 99, 1234, 3001, 99999] {
            let exact = units as i128 * 1900;
            let rounded = Money::from_minor_units(units).tax(rate).minor_units() as i128;
            // |rounded × 10000 − exact| ≤ 5000  ⇔  error ≤ half a minor unit
            assert!((rounded * 10_000 - exact).abs() <= 5_000);
        }
    }

    #[test]
    fn test_tax_rate_range_is_enforced() {
        assert!(TaxRate::from_bps(0).is_ok());
        assert!(TaxRate::from_bps(10_000).is_ok());
        assert!(matches!(
            TaxRate::from_bps(10_001),
            Err(CoreError::TaxRateOutOfRange { bps: 10_001 })
        ));
    }

    #[test]
    fn test_decimal_string_round_trip() {
        for raw in ["0.00", "10.99", "-5.50", "1234.05"] {
            assert_eq!(Money::parse(raw).unwrap().to_decimal_string(), raw);
        }
    }

    #[test]
    fn test_format_with_currency() {
        let euro = Currency::default();
        assert_eq!(Money::from_minor_units(1250).format_with(&euro), "12,50 €");
        assert_eq!(
            Money::from_minor_units(123456).format_with(&euro),
            "1.234,56 €"
        );
        assert_eq!(Money::from_minor_units(-550).format_with(&euro), "-5,50 €");

        let dollar = Currency {
            symbol: "$".to_string(),
            decimal_separator: '.',
            thousands_separator: Some(','),
            symbol_leads: true,
        };
        assert_eq!(
            Money::from_minor_units(123456).format_with(&dollar),
            "$1,234.56"
        );
    }

    #[test]
    fn test_scalars_from_decoded_documents() {
        let int: serde_yaml::Value = serde_yaml::from_str("10").unwrap();
        assert_eq!(money_from_yaml(&int).unwrap().minor_units(), 1000);

        let float: serde_yaml::Value = serde_yaml::from_str("2.5").unwrap();
        assert_eq!(money_from_yaml(&float).unwrap().minor_units(), 250);

        let string: serde_yaml::Value = serde_yaml::from_str("\"12.34\"").unwrap();
        assert_eq!(money_from_yaml(&string).unwrap().minor_units(), 1234);

        let too_precise: serde_yaml::Value = serde_yaml::from_str("2.505").unwrap();
        assert!(money_from_yaml(&too_precise).is_err());

        let not_a_number: serde_yaml::Value = serde_yaml::from_str("[1, 2]").unwrap();
        assert!(money_from_yaml(&not_a_number).is_err());
    }

    #[test]
    fn test_parse_scaled_for_centi_hours() {
        assert_eq!(parse_scaled("2.6", 2).unwrap(), 260);
        assert_eq!(parse_scaled("5", 2).unwrap(), 500);
        assert!(parse_scaled("2.555", 2).is_err());
    }
}
