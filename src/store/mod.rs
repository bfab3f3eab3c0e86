//! Persistence boundary.
//!
//! Services only see these traits. Every cart mutation must be atomic per
//! user: two concurrent deltas for the same cart are applied in some serial
//! order and neither is lost.

use std::collections::HashMap;

use async_trait::async_trait;
use mockall::automock;

use crate::domain::aggregates::{Cart, Order, OrderStatus, PendingPayment, Product, ProductSnapshot, Review, UserProfile, Wishlist};
use crate::domain::value_objects::{OrderId, ProductId, UserId};
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[automock]
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Current cart, `None` when the user never added anything.
    async fn load_cart(&self, user: UserId) -> Result<Option<Cart>>;

    /// Applies a signed quantity delta in one atomic step and returns the
    /// resulting cart. Creates the cart on the first positive delta.
    async fn apply_delta(&self, user: UserId, product: ProductId, delta: i64) -> Result<Cart>;

    /// Deletes one item regardless of quantity.
    async fn remove_item(&self, user: UserId, product: ProductId) -> Result<Cart>;

    /// Empties the cart, keeping the record. Succeeds for unknown users.
    async fn clear_cart(&self, user: UserId) -> Result<()>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: ProductSort,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

#[automock]
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, ProductSnapshot>>;

    async fn get_product(&self, id: ProductId) -> Result<Product>;

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;

    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Appends a review and returns the updated product. A second review by the
    /// same user is a `Conflict`.
    async fn add_review(&self, product: ProductId, review: &Review) -> Result<Product>;
}

#[automock]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. A payment reference that was already used is a `Conflict`.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    async fn get_order(&self, id: OrderId) -> Result<Order>;

    /// Orders of one user, newest first.
    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>>;

    /// Compare-and-set on the status. `Conflict` when the stored status is no
    /// longer `expected`.
    async fn update_status(&self, id: OrderId, expected: OrderStatus, order: &Order) -> Result<()>;

    /// Records a gateway order opened at checkout. Reusing a gateway order id
    /// is a `Conflict`.
    async fn insert_pending_payment(&self, pending: &PendingPayment) -> Result<()>;

    /// `NotFound` for gateway orders this service never opened.
    async fn pending_payment(&self, gateway_order_id: &str) -> Result<PendingPayment>;
}

#[automock]
#[async_trait]
pub trait WishlistStore: Send + Sync {
    /// Empty for users who never saved anything.
    async fn load_wishlist(&self, user: UserId) -> Result<Wishlist>;

    /// Saving a product that is already listed changes nothing.
    async fn add_to_wishlist(&self, user: UserId, product: ProductId) -> Result<Wishlist>;

    /// `NotFound` when the product is not listed.
    async fn remove_from_wishlist(&self, user: UserId, product: ProductId) -> Result<Wishlist>;
}

#[automock]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_profile(&self, user: UserId) -> Result<Option<UserProfile>>;

    /// Inserts or replaces the user's profile.
    async fn save_profile(&self, profile: &UserProfile) -> Result<()>;
}

pub(crate) fn matches_filter(product: &Product, filter: &ProductFilter) -> bool {
    if let Some(category) = &filter.category {
        if !product.category().eq_ignore_ascii_case(category) { return false; }
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        if !product.title().to_lowercase().contains(&needle) && !product.description().to_lowercase().contains(&needle) {
            return false;
        }
    }
    true
}

pub(crate) fn sort_products(products: &mut [Product], sort: ProductSort) {
    match sort {
        ProductSort::Newest => products.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        ProductSort::PriceAsc => products.sort_by(|a, b| a.price().amount().cmp(&b.price().amount())),
        ProductSort::PriceDesc => products.sort_by(|a, b| b.price().amount().cmp(&a.price().amount())),
    }
}
