//! NextBuy Commerce
//!
//! Storefront backend for the NextBuy shop.
//!
//! ## Features
//! - Product catalog with reviews
//! - Per-user shopping cart with atomic quantity updates
//! - Discount pricing over live catalog prices
//! - Checkout through a payment gateway, immutable order history
//! - Per-user wishlist and saved contact details
//! - Profile activity totals and transactional email

use thiserror::Error;

pub mod bus;
pub mod config;
pub mod domain;
pub mod http;
pub mod mail;
pub mod payments;
pub mod pricing;
pub mod service;
pub mod store;

use domain::aggregates::{CartError, OrderError, ProductError, WishlistError};
use domain::value_objects::{MoneyError, ValueError};
use pricing::PricingError;

// =============================================================================
// Error Types
// =============================================================================

/// Errors surfaced by every service operation. None of them is fatal to the
/// process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommerceError {
    /// A product, cart item or order reference is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Data contradicts an invariant, e.g. a cart line without a catalog entry.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A concurrent or duplicate write lost; the caller may retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, CommerceError>;

impl From<CartError> for CommerceError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ItemNotFound(_) => Self::NotFound(err.to_string()),
            CartError::InvalidDelta(_) | CartError::Quantity(_) => Self::InvalidState(err.to_string()),
        }
    }
}

impl From<WishlistError> for CommerceError {
    fn from(err: WishlistError) -> Self { Self::NotFound(err.to_string()) }
}

impl From<PricingError> for CommerceError {
    fn from(err: PricingError) -> Self { Self::InvalidState(err.to_string()) }
}

impl From<MoneyError> for CommerceError {
    fn from(err: MoneyError) -> Self { Self::InvalidState(err.to_string()) }
}

impl From<ValueError> for CommerceError {
    fn from(err: ValueError) -> Self { Self::Validation(err.to_string()) }
}

impl From<OrderError> for CommerceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NoItems | OrderError::FinalStatus(_) | OrderError::UnknownStatus(_) => Self::InvalidState(err.to_string()),
        }
    }
}

impl From<ProductError> for CommerceError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::AlreadyReviewed => Self::Conflict(err.to_string()),
            ProductError::MissingTitle | ProductError::NegativePrice | ProductError::EmptyComment => Self::Validation(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for CommerceError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return Self::NotFound("row not found".to_string());
        }
        match err.as_database_error().map(|e| e.kind()) {
            Some(sqlx::error::ErrorKind::UniqueViolation) => Self::Conflict(err.to_string()),
            Some(sqlx::error::ErrorKind::ForeignKeyViolation) => Self::NotFound(err.to_string()),
            Some(sqlx::error::ErrorKind::CheckViolation) => Self::InvalidState(err.to_string()),
            _ => Self::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::value_objects::ProductId;

    #[test]
    fn test_cart_errors_map_to_taxonomy() {
        let missing = CommerceError::from(CartError::ItemNotFound(ProductId::new()));
        assert!(matches!(missing, CommerceError::NotFound(_)));
        assert!(matches!(CommerceError::from(CartError::InvalidDelta(0)), CommerceError::InvalidState(_)));
        assert!(matches!(CommerceError::from(PricingError::MissingProduct(ProductId::new())), CommerceError::InvalidState(_)));
    }

    #[test]
    fn test_row_not_found_is_not_found() {
        assert!(matches!(CommerceError::from(sqlx::Error::RowNotFound), CommerceError::NotFound(_)));
        assert!(matches!(CommerceError::from(sqlx::Error::PoolTimedOut), CommerceError::Storage(_)));
    }
}
