use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use thiserror::Error;

/// Number of fractional digits carried by every ledger amount.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// A signed ledger amount in currency minor units (cents).
///
/// Debits are positive and credits negative. All clearing arithmetic
/// happens on the integer representation, so tolerance checks never
/// drift the way floating point sums would.
///
/// # Examples
///
/// ```
/// use gl_clearing::core::amount::Amount;
///
/// let debit = Amount::parse("1.234,56").unwrap();
/// let credit = Amount::parse("1234.56-").unwrap();
/// assert_eq!(debit + credit, Amount::ZERO);
/// assert_eq!(debit.to_string(), "1234.56");
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

/// Errors arising from amount parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,
    #[error("'{0}' is not a number")]
    NotNumeric(String),
    #[error("'{0}' has more than {MINOR_UNIT_SCALE} decimal places")]
    TooPrecise(String),
    #[error("'{0}' does not fit into the amount range")]
    Overflow(String),
    #[error("'{0}' is ambiguous: use a decimal comma when dots separate thousands")]
    AmbiguousSeparator(String),
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Create an amount from a count of minor units.
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_debit(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Exact sum of `amounts`, or `None` if it does not fit an amount.
    ///
    /// Unlike `Sum`, which saturates, intermediate totals may leave the
    /// `i64` range as long as the final one fits.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        let total: i128 = amounts.into_iter().map(|a| i128::from(a.0)).sum();
        i64::try_from(total).ok().map(Self)
    }

    /// True if `|self| <= tolerance` (tolerance in minor units).
    pub fn within(self, tolerance: u64) -> bool {
        self.0.unsigned_abs() <= tolerance
    }

    /// Convert to a decimal in major units.
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MINOR_UNIT_SCALE)
    }

    /// Build from a decimal in major units. Fails if the value carries
    /// sub-minor-unit precision.
    pub fn from_decimal(value: Decimal) -> Result<Self, AmountError> {
        let scaled = value * Decimal::from(10_i64.pow(MINOR_UNIT_SCALE));
        if !scaled.fract().is_zero() {
            return Err(AmountError::TooPrecise(value.to_string()));
        }
        scaled
            .to_i64()
            .map(Self)
            .ok_or_else(|| AmountError::Overflow(value.to_string()))
    }

    /// Parse a ledger amount.
    ///
    /// Accepts plain decimals (`-1234.56`) and SAP list notation
    /// (`1.234,56-`): when a comma is present it is the decimal
    /// separator and dots are thousands separators. A trailing `-`
    /// negates the value.
    ///
    /// A comma-less value with exactly three digits after a single dot
    /// (`1.000`) could be either notation and is rejected.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }

        let (body, negative) = match trimmed.strip_suffix('-') {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };

        let normalized = if body.contains(',') {
            body.replace('.', "").replace(',', ".")
        } else {
            if is_thousands_grouped(body) {
                return Err(AmountError::AmbiguousSeparator(input.to_string()));
            }
            body.to_string()
        };

        let mut value: Decimal = normalized
            .parse()
            .map_err(|_| AmountError::NotNumeric(input.to_string()))?;
        if negative {
            if value.is_sign_negative() {
                return Err(AmountError::NotNumeric(input.to_string()));
            }
            value = -value;
        }
        Self::from_decimal(value)
    }
}

/// `1.000`, `-12.500`: one dot, three fraction digits, a nonzero whole part.
fn is_thousands_grouped(body: &str) -> bool {
    let (whole, fraction) = match body.split_once('.') {
        Some(parts) => parts,
        None => return false,
    };
    let digits = whole.trim_start_matches(['-', '+']);
    fraction.len() == 3
        && fraction.bytes().all(|b| b.is_ascii_digit())
        && !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && digits.bytes().any(|b| b != b'0')
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(self.0.saturating_neg())
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.copied().sum()
    }
}

impl From<i64> for Amount {
    fn from(minor: i64) -> Self {
        Self(minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_plain_decimal() {
        assert_eq!(Amount::parse("1234.56").unwrap(), Amount::from_minor(123_456));
        assert_eq!(Amount::parse("-0.05").unwrap(), Amount::from_minor(-5));
        assert_eq!(Amount::parse("100").unwrap(), Amount::from_minor(10_000));
    }

    #[test]
    fn test_parse_sap_notation() {
        assert_eq!(Amount::parse("1.234,56-").unwrap(), Amount::from_minor(-123_456));
        assert_eq!(Amount::parse("  12,00 ").unwrap(), Amount::from_minor(1_200));
        assert_eq!(Amount::parse("1.000.000,00").unwrap(), Amount::from_minor(100_000_000));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Amount::parse(""), Err(AmountError::Empty));
        assert!(matches!(Amount::parse("abc"), Err(AmountError::NotNumeric(_))));
        assert!(matches!(Amount::parse("--5"), Err(AmountError::NotNumeric(_))));
        assert!(matches!(Amount::parse("0.005"), Err(AmountError::TooPrecise(_))));
    }

    #[test]
    fn test_parse_rejects_dot_grouped_thousands() {
        for input in ["1.000", "12.500-", "-1.005"] {
            assert_eq!(
                Amount::parse(input),
                Err(AmountError::AmbiguousSeparator(input.to_string()))
            );
        }
        assert_eq!(Amount::parse("0.000").unwrap(), Amount::ZERO);
        assert_eq!(Amount::parse("1.000,00").unwrap(), Amount::from_minor(100_000));
        assert_eq!(Amount::parse("1.50").unwrap(), Amount::from_minor(150));
    }

    #[test]
    fn test_checked_sum_is_exact() {
        let amounts = [i64::MAX, 1, -i64::MAX].map(Amount::from_minor);
        let saturated: Amount = amounts.iter().sum();
        assert_eq!(saturated, Amount::ZERO);
        assert_eq!(Amount::checked_sum(amounts), Some(Amount::from_minor(1)));

        let too_big = [i64::MAX, 1].map(Amount::from_minor);
        assert_eq!(Amount::checked_sum(too_big), None);
        assert_eq!(Amount::from_minor(i64::MAX).checked_add(Amount::from_minor(1)), None);
    }

    #[test]
    fn test_decimal_conversion() {
        let amount = Amount::from_decimal(dec!(19.99)).unwrap();
        assert_eq!(amount.minor(), 1_999);
        assert_eq!(amount.to_decimal(), dec!(19.99));
    }

    #[test]
    fn test_within_tolerance() {
        assert!(Amount::from_minor(3).within(5));
        assert!(Amount::from_minor(-5).within(5));
        assert!(!Amount::from_minor(-6).within(5));
        assert!(Amount::ZERO.within(0));
    }

    #[test]
    fn test_sum_and_display() {
        let total: Amount = [150, -50, -100].into_iter().map(Amount::from_minor).sum();
        assert!(total.is_zero());
        assert_eq!(Amount::from_minor(-1_050).to_string(), "-10.50");
    }
}
