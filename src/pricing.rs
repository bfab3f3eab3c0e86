//! Pricing Engine
//!
//! Turns cart items and a catalog snapshot into line totals and a subtotal.
//! Everything here is synchronous and free of I/O; callers fetch the snapshot
//! first. Amounts stay unrounded until [`PricedCart::rounded`] is called for
//! presentation.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::aggregates::{CartItem, ProductSnapshot};
use crate::domain::value_objects::{DiscountRate, Money, MoneyError, ProductId, Quantity};

/// Point-in-time view of the products a cart references.
pub type CatalogSnapshot = HashMap<ProductId, ProductSnapshot>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub title: String,
    pub image: Option<String>,
    pub unit_price: Money,
    pub discounted_unit_price: Money,
    pub quantity: Quantity,
    pub line_total: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub discount_rate: DiscountRate,
    /// Sum of undiscounted line totals.
    pub original_subtotal: Money,
    pub savings: Money,
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("product {0} is missing from the catalog snapshot")]
    MissingProduct(ProductId),
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Pricing policy: the uniform discount and the currency totals are kept in.
#[derive(Clone, Debug, PartialEq)]
pub struct PricingEngine {
    discount: DiscountRate,
    currency: String,
}

impl PricingEngine {
    pub fn new(discount: DiscountRate, currency: &str) -> Self {
        Self { discount, currency: currency.to_uppercase() }
    }

    pub fn discount(&self) -> DiscountRate { self.discount }
    pub fn currency(&self) -> &str { &self.currency }

    pub fn price(&self, items: &[CartItem], catalog: &CatalogSnapshot) -> Result<PricedCart, PricingError> {
        price(items, catalog, self.discount, &self.currency)
    }
}

/// Prices `items` against `catalog`.
///
/// Fails on the first item whose product is absent from the snapshot; the
/// caller decides whether to drop that line and retry or abort.
pub fn price(items: &[CartItem], catalog: &CatalogSnapshot, discount: DiscountRate, currency: &str) -> Result<PricedCart, PricingError> {
    let mut lines = Vec::with_capacity(items.len());
    let mut original_subtotal = Money::zero(currency);
    let mut subtotal = Money::zero(currency);

    for item in items {
        let product = catalog.get(&item.product_id).ok_or(PricingError::MissingProduct(item.product_id))?;
        let discounted_unit_price = product.price.scale(discount.complement());
        let line_total = discounted_unit_price.multiply(item.quantity.value());

        original_subtotal = original_subtotal.add(&product.price.multiply(item.quantity.value()))?;
        subtotal = subtotal.add(&line_total)?;

        lines.push(PricedLine {
            product_id: item.product_id,
            title: product.title.clone(),
            image: product.image.clone(),
            unit_price: product.price.clone(),
            discounted_unit_price,
            quantity: item.quantity,
            line_total,
        });
    }

    let savings = original_subtotal.subtract(&subtotal)?;
    Ok(PricedCart { lines, discount_rate: discount, original_subtotal, savings, subtotal })
}

impl PricedCart {
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn item_count(&self) -> u32 { self.lines.iter().map(|l| l.quantity.value()).sum() }

    /// Copy with every amount rounded to minor units, for display only.
    pub fn rounded(&self) -> PricedCart {
        PricedCart {
            lines: self.lines.iter().map(|l| PricedLine {
                unit_price: l.unit_price.rounded(),
                discounted_unit_price: l.discounted_unit_price.rounded(),
                line_total: l.line_total.rounded(),
                ..l.clone()
            }).collect(),
            discount_rate: self.discount_rate,
            original_subtotal: self.original_subtotal.rounded(),
            savings: self.savings.rounded(),
            subtotal: self.subtotal.rounded(),
        }
    }
}
