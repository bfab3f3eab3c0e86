//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ProductId, Quantity, UserId, ValueError};

/// One user's in-progress selection. Product references are unique and items
/// keep the order they were first added in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    owner: UserId,
    items: Vec<CartItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl Cart {
    pub fn new(owner: UserId) -> Self {
        let now = Utc::now();
        Self { owner, items: vec![], created_at: now, updated_at: now }
    }

    /// Rebuilds a cart from storage, merging any duplicate product rows.
    pub fn restore(owner: UserId, items: Vec<CartItem>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Result<Self, CartError> {
        let mut cart = Self { owner, items: Vec::with_capacity(items.len()), created_at, updated_at };
        for item in items {
            match cart.position(item.product_id) {
                Some(idx) => {
                    let merged = cart.items[idx].quantity.value().checked_add(item.quantity.value()).ok_or(ValueError::QuantityOverflow)?;
                    cart.items[idx].quantity = Quantity::new(merged)?;
                }
                None => cart.items.push(item),
            }
        }
        Ok(cart)
    }

    pub fn owner(&self) -> UserId { self.owner }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<Quantity> {
        self.items.iter().find(|i| i.product_id == product_id).map(|i| i.quantity)
    }

    pub fn product_ids(&self) -> Vec<ProductId> { self.items.iter().map(|i| i.product_id).collect() }

    /// +1 for the product, inserting it at quantity 1 when absent.
    pub fn add(&mut self, product_id: ProductId) -> Result<Quantity, CartError> {
        self.apply_delta(product_id, 1)?.ok_or(CartError::InvalidDelta(1))
    }

    /// -1 for the product; an item at quantity 1 is removed. Returns the
    /// remaining quantity, `None` once removed.
    pub fn decrease(&mut self, product_id: ProductId) -> Result<Option<Quantity>, CartError> {
        self.apply_delta(product_id, -1)
    }

    /// Applies a signed quantity delta atomically against this aggregate.
    ///
    /// Absent items accept only positive deltas. Items reaching zero are removed,
    /// never stored at 0.
    pub fn apply_delta(&mut self, product_id: ProductId, delta: i64) -> Result<Option<Quantity>, CartError> {
        if delta == 0 { return Err(CartError::InvalidDelta(delta)); }
        let result = match self.position(product_id) {
            Some(idx) => match self.items[idx].quantity.apply(delta)? {
                Some(q) => { self.items[idx].quantity = q; Some(q) }
                None => { self.items.remove(idx); None }
            },
            None if delta > 0 => {
                let quantity = u32::try_from(delta).map_err(|_| ValueError::QuantityOverflow).and_then(Quantity::new)?;
                self.items.push(CartItem { product_id, quantity });
                Some(quantity)
            }
            None => return Err(CartError::ItemNotFound(product_id)),
        };
        self.touch();
        Ok(result)
    }

    pub fn remove(&mut self, product_id: ProductId) -> Result<Quantity, CartError> {
        let idx = self.position(product_id).ok_or(CartError::ItemNotFound(product_id))?;
        let removed = self.items.remove(idx);
        self.touch();
        Ok(removed.quantity)
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.items.iter().position(|i| i.product_id == product_id)
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("product {0} is not in the cart")]
    ItemNotFound(ProductId),
    #[error("quantity delta {0} is not allowed")]
    InvalidDelta(i64),
    #[error(transparent)]
    Quantity(#[from] ValueError),
}
