//! Money type
//!
//! Domain primitive for monetary values. Amounts are fixed-point decimals
//! validated at construction time, and every arithmetic or comparison
//! operation is currency-aware.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Maximum allowed value (1 trillion in major units)
const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Maximum decimal places (minor units)
const MAX_SCALE: u32 = 2;

/// ISO-4217 currency code, always three upper-case ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Nigerian naira, the platform's settlement currency.
    pub fn ngn() -> Self {
        Self("NGN".to_string())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

/// Errors that can occur when creating or combining Money values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    #[error("Subtraction would produce a negative amount")]
    NegativeResult,

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

/// Money represents a validated, non-negative amount in a single currency.
///
/// # Invariants
/// - Amount is zero or positive
/// - Maximum 2 decimal places
/// - Maximum value is 1 trillion
///
/// Equality is value based, so `100` and `100.00` NGN are equal; values in
/// different currencies are never equal and never ordered.
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use daily_savings::domain::{Currency, Money};
///
/// let a = Money::new(Decimal::new(100, 0), Currency::ngn()).unwrap();
/// let b = Money::new(Decimal::new(5000, 2), Currency::ngn()).unwrap();
/// assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMoney")]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

/// Wire shape of `Money` before validation
#[derive(Deserialize)]
struct RawMoney {
    amount: Decimal,
    currency: Currency,
}

impl TryFrom<RawMoney> for Money {
    type Error = MoneyError;

    fn try_from(raw: RawMoney) -> Result<Self, Self::Error> {
        Money::new(raw.amount, raw.currency)
    }
}

impl Money {
    /// Create a new Money value with validation.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        if amount < Decimal::ZERO {
            return Err(MoneyError::Negative(amount));
        }

        let normalized = amount.normalize();
        if normalized.scale() > MAX_SCALE {
            return Err(MoneyError::TooManyDecimals(normalized.scale()));
        }

        if amount > Decimal::from(MAX_AMOUNT) {
            return Err(MoneyError::Overflow);
        }

        Ok(Self { amount, currency })
    }

    /// Zero in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Whole major units; any `u32` is within range, so this cannot fail.
    pub fn from_major(units: u32, currency: Currency) -> Self {
        Self {
            amount: Decimal::from(units),
            currency,
        }
    }

    /// Parse a decimal string such as `"150.50"`.
    pub fn parse(amount: &str, currency: Currency) -> Result<Self, MoneyError> {
        let value = Decimal::from_str(amount.trim())
            .map_err(|e| MoneyError::ParseError(e.to_string()))?;
        Money::new(value, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Money::new(self.amount + other.amount, self.currency.clone())
    }

    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let result = self.amount - other.amount;
        if result < Decimal::ZERO {
            return Err(MoneyError::NegativeResult);
        }
        Money::new(result, self.currency.clone())
    }

    pub fn is_greater_than(&self, other: &Money) -> Result<bool, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount > other.amount)
    }

    /// Currency-aware equality; differing currencies are an error rather
    /// than silently unequal.
    pub fn equals(&self, other: &Money) -> Result<bool, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount == other.amount)
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        self.amount.partial_cmp(&other.amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ngn(amount: Decimal) -> Money {
        Money::new(amount, Currency::ngn()).unwrap()
    }

    #[test]
    fn test_money_rejects_negative() {
        let result = Money::new(dec!(-1), Currency::ngn());
        assert!(matches!(result, Err(MoneyError::Negative(_))));
    }

    #[test]
    fn test_money_zero_allowed() {
        assert!(Money::new(Decimal::ZERO, Currency::ngn()).unwrap().is_zero());
    }

    #[test]
    fn test_money_too_many_decimals() {
        let result = Money::new(dec!(1.005), Currency::ngn());
        assert!(matches!(result, Err(MoneyError::TooManyDecimals(3))));
    }

    #[test]
    fn test_money_trailing_zeros_are_not_extra_precision() {
        assert!(Money::new(dec!(1.5000), Currency::ngn()).is_ok());
    }

    #[test]
    fn test_money_overflow() {
        assert!(matches!(
            Money::new(dec!(1000000000000.01), Currency::ngn()),
            Err(MoneyError::Overflow)
        ));
        assert!(Money::new(dec!(1000000000000), Currency::ngn()).is_ok());
    }

    #[test]
    fn test_add_and_subtract() {
        let a = ngn(dec!(950));
        let b = ngn(dec!(50));
        assert_eq!(a.add(&b).unwrap().amount(), dec!(1000));
        assert_eq!(a.subtract(&b).unwrap().amount(), dec!(900));
    }

    #[test]
    fn test_subtract_below_zero_fails() {
        let result = ngn(dec!(40)).subtract(&ngn(dec!(50)));
        assert_eq!(result, Err(MoneyError::NegativeResult));
    }

    #[test]
    fn test_currency_mismatch() {
        let naira = ngn(dec!(10));
        let dollars = Money::new(dec!(10), Currency::new("usd").unwrap()).unwrap();

        assert!(matches!(naira.add(&dollars), Err(MoneyError::CurrencyMismatch { .. })));
        assert!(matches!(naira.subtract(&dollars), Err(MoneyError::CurrencyMismatch { .. })));
        assert!(naira.equals(&dollars).is_err());
        assert_ne!(naira, dollars);
        assert_eq!(naira.partial_cmp(&dollars), None);
    }

    #[test]
    fn test_equality_ignores_scale() {
        assert_eq!(ngn(dec!(100)), ngn(dec!(100.00)));
        assert!(ngn(dec!(100)).equals(&ngn(dec!(100.00))).unwrap());
    }

    #[test]
    fn test_is_greater_than() {
        assert!(ngn(dec!(100.01)).is_greater_than(&ngn(dec!(100))).unwrap());
        assert!(!ngn(dec!(100)).is_greater_than(&ngn(dec!(100))).unwrap());
    }

    #[test]
    fn test_currency_validation() {
        assert_eq!(Currency::new("ngn").unwrap().code(), "NGN");
        assert!(Currency::new("NAIRA").is_err());
        assert!(Currency::new("N1N").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        for bad in [
            r#"{"amount": "-5", "currency": "NGN"}"#,
            r#"{"amount": "1.005", "currency": "NGN"}"#,
            r#"{"amount": "10", "currency": "NAIRA"}"#,
        ] {
            assert!(serde_json::from_str::<Money>(bad).is_err(), "accepted {}", bad);
        }

        let money: Money =
            serde_json::from_str(r#"{"amount": "12.50", "currency": "NGN"}"#).unwrap();
        assert_eq!(money, ngn(dec!(12.5)));
    }

    #[test]
    fn test_money_serde_shape() {
        let json = serde_json::to_value(ngn(dec!(150.50))).unwrap();
        assert_eq!(json["amount"], "150.50");
        assert_eq!(json["currency"], "NGN");

        let back: Money = serde_json::from_value(json).unwrap();
        assert_eq!(back, ngn(dec!(150.5)));
    }

    #[test]
    fn test_parse() {
        let money = Money::parse("123.45", Currency::ngn()).unwrap();
        assert_eq!(money.amount(), dec!(123.45));
        assert!(matches!(
            Money::parse("abc", Currency::ngn()),
            Err(MoneyError::ParseError(_))
        ));
    }
}
