//! Value Objects for the storefront

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self { Self(Uuid::now_v7()) }
            pub const fn from_uuid(uuid: Uuid) -> Self { Self(uuid) }
            pub const fn into_uuid(self) -> Uuid { self.0 }
        }

        impl Default for $name {
            fn default() -> Self { Self::new() }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self { Self(uuid) }
        }

        impl FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> { Uuid::parse_str(s).map(Self) }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(&self.0, f) }
        }
    };
}

id_type!(
    /// Authenticated shopper identity
    UserId
);
id_type!(
    /// Catalog product reference
    ProductId
);
id_type!(OrderId);
id_type!(ReviewId);

/// Money value object
///
/// Amounts are fixed-point decimals; nothing is rounded until [`Money::rounded`]
/// is called for presentation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    /// Digits after the decimal point in a minor unit (paise, cents).
    pub const MINOR_UNIT_SCALE: u32 = 2;

    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_uppercase() } }
    pub fn inr(amount: Decimal) -> Self { Self::new(amount, "INR") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn from_minor_units(minor: i64, currency: &str) -> Self {
        Self::new(Decimal::new(minor, Self::MINOR_UNIT_SCALE), currency)
    }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_negative(&self) -> bool { self.amount.is_sign_negative() && !self.amount.is_zero() }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(Money::new(self.amount - other.amount, &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    pub fn scale(&self, factor: Decimal) -> Money { Money::new(self.amount * factor, &self.currency) }

    /// Rounded to minor units, half away from zero.
    pub fn rounded(&self) -> Money {
        let amount = self
            .amount
            .round_dp_with_strategy(Self::MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        Money::new(amount, &self.currency)
    }

    /// Whole minor units, as payment gateways and the database expect them.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        let minor = self.rounded().amount * Decimal::from(100);
        i64::try_from(minor.trunc()).map_err(|_| MoneyError::OutOfRange)
    }

    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch { left: self.currency.clone(), right: other.currency.clone() });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.rounded().amount, self.currency)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
    #[error("amount out of range")]
    OutOfRange,
}

/// Positive item quantity. Zero is unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    pub const ONE: Quantity = Quantity(NonZeroU32::MIN);

    pub fn new(value: u32) -> Result<Self, ValueError> {
        NonZeroU32::new(value).map(Self).ok_or(ValueError::ZeroQuantity)
    }
    pub fn value(&self) -> u32 { self.0.get() }

    /// Applies a signed delta. `Ok(None)` means the item dropped to zero or below.
    pub fn apply(self, delta: i64) -> Result<Option<Self>, ValueError> {
        let next = i64::from(self.value()) + delta;
        if next <= 0 {
            return Ok(None);
        }
        let next = u32::try_from(next).map_err(|_| ValueError::QuantityOverflow)?;
        Ok(Some(Self::new(next)?))
    }
}

impl TryFrom<u32> for Quantity {
    type Error = ValueError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.value() }
}

/// Fractional markdown applied uniformly to unit prices, in `[0, 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct DiscountRate(Decimal);

impl DiscountRate {
    pub const NONE: DiscountRate = DiscountRate(Decimal::ZERO);

    pub fn new(rate: Decimal) -> Result<Self, ValueError> {
        if rate.is_sign_negative() || rate >= Decimal::ONE {
            return Err(ValueError::DiscountOutOfRange(rate));
        }
        Ok(Self(rate))
    }

    /// Builds a rate from a whole percentage, e.g. `25` for 25%.
    pub fn from_percent(percent: u32) -> Result<Self, ValueError> {
        Self::new(Decimal::new(i64::from(percent), 2))
    }

    pub fn value(&self) -> Decimal { self.0 }

    /// Multiplier applied to a unit price: `1 - rate`.
    pub fn complement(&self) -> Decimal { Decimal::ONE - self.0 }
}

impl TryFrom<Decimal> for DiscountRate {
    type Error = ValueError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<DiscountRate> for Decimal {
    fn from(rate: DiscountRate) -> Self { rate.0 }
}

impl FromStr for DiscountRate {
    type Err = ValueError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rate = Decimal::from_str(s.trim()).map_err(|_| ValueError::Unparseable(s.to_string()))?;
        Self::new(rate)
    }
}

/// Review star rating, 1 to 5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;

    pub fn new(stars: u8) -> Result<Self, ValueError> {
        if !(1..=Self::MAX).contains(&stars) { return Err(ValueError::RatingOutOfRange(stars)); }
        Ok(Self(stars))
    }
    pub fn stars(&self) -> u8 { self.0 }
}

impl TryFrom<u8> for Rating {
    type Error = ValueError;
    fn try_from(value: u8) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> Self { r.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("quantity overflow")]
    QuantityOverflow,
    #[error("discount rate {0} must be in [0, 1)")]
    DiscountOutOfRange(Decimal),
    #[error("rating {0} must be between 1 and 5")]
    RatingOutOfRange(u8),
    #[error("cannot parse {0:?}")]
    Unparseable(String),
}
