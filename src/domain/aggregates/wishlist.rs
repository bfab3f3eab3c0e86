//! Wishlist Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ProductId, UserId};

/// Products a user saved for later. Each product appears at most once, oldest
/// first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wishlist {
    owner: UserId,
    items: Vec<WishlistItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub product_id: ProductId,
    pub added_at: DateTime<Utc>,
}

impl Wishlist {
    pub fn new(owner: UserId) -> Self { Self { owner, items: vec![] } }

    /// Rebuilds a wishlist from storage, keeping the first row per product.
    pub fn restore(owner: UserId, items: Vec<WishlistItem>) -> Self {
        let mut wishlist = Self::new(owner);
        for item in items {
            if !wishlist.contains(item.product_id) { wishlist.items.push(item); }
        }
        wishlist
    }

    pub fn owner(&self) -> UserId { self.owner }
    pub fn items(&self) -> &[WishlistItem] { &self.items }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn product_ids(&self) -> Vec<ProductId> { self.items.iter().map(|i| i.product_id).collect() }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }

    /// Saves the product. Returns `false` when it was already listed.
    pub fn add(&mut self, product_id: ProductId) -> bool {
        if self.contains(product_id) { return false; }
        self.items.push(WishlistItem { product_id, added_at: Utc::now() });
        true
    }

    pub fn remove(&mut self, product_id: ProductId) -> Result<(), WishlistError> {
        let idx = self.items.iter().position(|i| i.product_id == product_id).ok_or(WishlistError::NotListed(product_id))?;
        self.items.remove(idx);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WishlistError {
    #[error("product {0} is not in the wishlist")]
    NotListed(ProductId),
}
