//! Money type with exact minor-unit precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are held as an integer count of minor units (cents). Conversion to
//! and from `rust_decimal::Decimal` is exact: values with more fractional digits
//! than the currency allows are rejected, never rounded.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while constructing or combining money values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The two operands are in different currencies.
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left operand.
        left: Currency,
        /// Currency of the right operand.
        right: Currency,
    },

    /// The amount has more fractional digits than the currency supports.
    #[error("Amount {amount} has more precision than {currency} allows")]
    ExcessPrecision {
        /// The offending amount.
        amount: Decimal,
        /// The currency the amount was interpreted in.
        currency: Currency,
    },

    /// The result does not fit in 64-bit minor units.
    #[error("Money arithmetic overflow")]
    Overflow,

    /// The input string is not a decimal number.
    #[error("Invalid decimal amount: {0}")]
    Parse(String),
}

/// Represents a monetary amount with currency.
///
/// `minor` counts the smallest currency unit (e.g., cents for USD, yen for JPY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MoneyRepr", into = "MoneyRepr")]
pub struct Money {
    /// The amount in the smallest currency unit.
    pub minor: i64,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

/// ISO 4217 currency codes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// Pound Sterling
    Gbp,
    /// Indian Rupee
    Inr,
    /// Indonesian Rupiah
    Idr,
    /// Singapore Dollar
    Sgd,
    /// Japanese Yen
    Jpy,
}

impl Currency {
    /// Number of decimal digits in one major unit.
    #[must_use]
    pub const fn minor_exponent(self) -> u32 {
        match self {
            Self::Jpy => 0,
            Self::Usd | Self::Eur | Self::Gbp | Self::Inr | Self::Idr | Self::Sgd => 2,
        }
    }

    /// Minor units per major unit (100 for cents).
    #[must_use]
    pub const fn minor_per_major(self) -> i64 {
        10_i64.pow(self.minor_exponent())
    }
}

impl Money {
    /// Creates a new Money instance from minor units.
    #[must_use]
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Converts an exact decimal into minor units.
    ///
    /// # Errors
    ///
    /// Returns `ExcessPrecision` if the decimal cannot be represented exactly,
    /// or `Overflow` if it does not fit in 64-bit minor units.
    pub fn from_decimal(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        let scaled = amount
            .checked_mul(Decimal::from(currency.minor_per_major()))
            .ok_or(MoneyError::Overflow)?;
        if !scaled.fract().is_zero() {
            return Err(MoneyError::ExcessPrecision { amount, currency });
        }
        let minor = scaled.trunc().to_i64().ok_or(MoneyError::Overflow)?;
        Ok(Self::new(minor, currency))
    }

    /// Parses an exact decimal string such as `"100.01"`.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed input, otherwise the errors of [`Money::from_decimal`].
    pub fn parse(amount: &str, currency: Currency) -> Result<Self, MoneyError> {
        let decimal = Decimal::from_str_exact(amount.trim())
            .map_err(|_| MoneyError::Parse(amount.to_string()))?;
        Self::from_decimal(decimal, currency)
    }

    /// Returns the amount as an exact decimal in major units.
    #[must_use]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.minor, self.currency.minor_exponent())
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.minor > 0
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Adds two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` or `Overflow`.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.ensure_same_currency(other)?;
        self.minor
            .checked_add(other.minor)
            .map(|minor| Self::new(minor, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Subtracts `other` from `self`.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` or `Overflow`.
    pub fn checked_sub(self, other: Self) -> Result<Self, MoneyError> {
        self.ensure_same_currency(other)?;
        self.minor
            .checked_sub(other.minor)
            .map(|minor| Self::new(minor, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Returns the additive inverse.
    ///
    /// # Errors
    ///
    /// Returns `Overflow` for `i64::MIN` minor units.
    pub fn negate(self) -> Result<Self, MoneyError> {
        self.minor
            .checked_neg()
            .map(|minor| Self::new(minor, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Compares two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` when the currencies differ.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, MoneyError> {
        self.ensure_same_currency(*other)?;
        Ok(self.minor.cmp(&other.minor))
    }

    /// Sums an iterator of amounts, starting from zero in `currency`.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` or `Overflow`.
    pub fn sum<I>(amounts: I, currency: Currency) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::zero(currency), Self::checked_add)
    }

    /// Divides the amount into `parts` shares that differ by at most one minor unit.
    ///
    /// The remainder is handed out one unit at a time to the first shares, so the
    /// caller controls who receives it by choosing the order. The shares always sum
    /// to the original amount. Returns an empty vector when `parts` is zero.
    #[must_use]
    pub fn split_evenly(self, parts: usize) -> Vec<Self> {
        if parts == 0 {
            return vec![];
        }
        let Ok(count) = i64::try_from(parts) else {
            return vec![];
        };

        let base = self.minor.div_euclid(count);
        let remainder = self.minor.rem_euclid(count);

        (0..count)
            .map(|i| {
                let extra = i64::from(i < remainder);
                Self::new(base + extra, self.currency)
            })
            .collect()
    }

    fn ensure_same_currency(self, other: Self) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            })
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.to_decimal(), self.currency)
    }
}

/// Wire shape of [`Money`]: an exact decimal string plus the currency code.
#[derive(Serialize, Deserialize)]
struct MoneyRepr {
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    currency: Currency,
}

impl From<Money> for MoneyRepr {
    fn from(money: Money) -> Self {
        Self {
            amount: money.to_decimal(),
            currency: money.currency,
        }
    }
}

impl TryFrom<MoneyRepr> for Money {
    type Error = MoneyError;

    fn try_from(repr: MoneyRepr) -> Result<Self, Self::Error> {
        Self::from_decimal(repr.amount, repr.currency)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usd => write!(f, "USD"),
            Self::Eur => write!(f, "EUR"),
            Self::Gbp => write!(f, "GBP"),
            Self::Inr => write!(f, "INR"),
            Self::Idr => write!(f, "IDR"),
            Self::Sgd => write!(f, "SGD"),
            Self::Jpy => write!(f, "JPY"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "INR" => Ok(Self::Inr),
            "IDR" => Ok(Self::Idr),
            "SGD" => Ok(Self::Sgd),
            "JPY" => Ok(Self::Jpy),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}
