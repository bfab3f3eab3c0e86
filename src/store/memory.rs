//! In-process store used for development and tests.
//!
//! Each cart sits behind its own mutex; the user map lock is only held long
//! enough to find or create that mutex, so different users never contend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::{matches_filter, sort_products, CartStore, Catalog, OrderStore, ProductFilter, ProfileStore, WishlistStore};
use crate::domain::aggregates::{Cart, Order, OrderStatus, PendingPayment, Product, ProductSnapshot, Review, UserProfile, Wishlist, WishlistError};
use crate::domain::value_objects::{OrderId, ProductId, UserId};
use crate::{CommerceError, Result};

#[derive(Debug, Default)]
pub struct MemoryStore {
    carts: RwLock<HashMap<UserId, Arc<Mutex<Cart>>>>,
    products: RwLock<HashMap<ProductId, Product>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    pending_payments: RwLock<HashMap<String, PendingPayment>>,
    wishlists: RwLock<HashMap<UserId, Wishlist>>,
    profiles: RwLock<HashMap<UserId, UserProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Seeds the catalog, replacing products with the same id.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        {
            let mut map = store.products.write();
            for p in products { map.insert(p.id(), p); }
        }
        store
    }

    fn cart_slot(&self, user: UserId) -> Option<Arc<Mutex<Cart>>> {
        self.carts.read().get(&user).cloned()
    }

    fn cart_slot_or_create(&self, user: UserId) -> Arc<Mutex<Cart>> {
        if let Some(slot) = self.cart_slot(user) { return slot; }
        self.carts.write().entry(user).or_insert_with(|| Arc::new(Mutex::new(Cart::new(user)))).clone()
    }
}

fn cart_not_found(user: UserId) -> CommerceError {
    CommerceError::NotFound(format!("cart for user {user}"))
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn load_cart(&self, user: UserId) -> Result<Option<Cart>> {
        match self.cart_slot(user) {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn apply_delta(&self, user: UserId, product: ProductId, delta: i64) -> Result<Cart> {
        let slot = if delta > 0 {
            self.cart_slot_or_create(user)
        } else {
            self.cart_slot(user).ok_or_else(|| cart_not_found(user))?
        };
        let mut cart = slot.lock().await;
        cart.apply_delta(product, delta)?;
        Ok(cart.clone())
    }

    async fn remove_item(&self, user: UserId, product: ProductId) -> Result<Cart> {
        let slot = self.cart_slot(user).ok_or_else(|| cart_not_found(user))?;
        let mut cart = slot.lock().await;
        cart.remove(product)?;
        Ok(cart.clone())
    }

    async fn clear_cart(&self, user: UserId) -> Result<()> {
        if let Some(slot) = self.cart_slot(user) {
            slot.lock().await.clear();
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, ProductSnapshot>> {
        let products = self.products.read();
        Ok(ids.iter().filter_map(|id| products.get(id)).map(|p| (p.id(), p.snapshot())).collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.products.read().get(&id).cloned().ok_or_else(|| CommerceError::NotFound(format!("product {id}")))
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self.products.read().values().filter(|p| matches_filter(p, filter)).cloned().collect();
        sort_products(&mut products, filter.sort);
        Ok(products)
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut products = self.products.write();
        if products.contains_key(&product.id()) {
            return Err(CommerceError::Conflict(format!("product {} already exists", product.id())));
        }
        products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn add_review(&self, product: ProductId, review: &Review) -> Result<Product> {
        let mut products = self.products.write();
        let entry = products.get_mut(&product).ok_or_else(|| CommerceError::NotFound(format!("product {product}")))?;
        entry.push_review(review.clone())?;
        Ok(entry.clone())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write();
        let gateway_order_id = &order.payment().gateway_order_id;
        if orders.contains_key(&order.id()) || orders.values().any(|o| &o.payment().gateway_order_id == gateway_order_id) {
            return Err(CommerceError::Conflict(format!("payment order {gateway_order_id} already recorded")));
        }
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.orders.read().get(&id).cloned().ok_or_else(|| CommerceError::NotFound(format!("order {id}")))
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.orders.read().values().filter(|o| o.user_id() == user).cloned().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn update_status(&self, id: OrderId, expected: OrderStatus, order: &Order) -> Result<()> {
        let mut orders = self.orders.write();
        let stored = orders.get_mut(&id).ok_or_else(|| CommerceError::NotFound(format!("order {id}")))?;
        if stored.status() != expected {
            return Err(CommerceError::Conflict(format!("order {id} is {} not {expected}", stored.status())));
        }
        *stored = order.clone();
        Ok(())
    }

    async fn insert_pending_payment(&self, pending: &PendingPayment) -> Result<()> {
        let mut pending_payments = self.pending_payments.write();
        if pending_payments.contains_key(&pending.gateway_order_id) {
            return Err(CommerceError::Conflict(format!("payment order {} already opened", pending.gateway_order_id)));
        }
        pending_payments.insert(pending.gateway_order_id.clone(), pending.clone());
        Ok(())
    }

    async fn pending_payment(&self, gateway_order_id: &str) -> Result<PendingPayment> {
        self.pending_payments
            .read()
            .get(gateway_order_id)
            .cloned()
            .ok_or_else(|| CommerceError::NotFound(format!("payment order {gateway_order_id}")))
    }
}

#[async_trait]
impl WishlistStore for MemoryStore {
    async fn load_wishlist(&self, user: UserId) -> Result<Wishlist> {
        Ok(self.wishlists.read().get(&user).cloned().unwrap_or_else(|| Wishlist::new(user)))
    }

    async fn add_to_wishlist(&self, user: UserId, product: ProductId) -> Result<Wishlist> {
        let mut wishlists = self.wishlists.write();
        let wishlist = wishlists.entry(user).or_insert_with(|| Wishlist::new(user));
        wishlist.add(product);
        Ok(wishlist.clone())
    }

    async fn remove_from_wishlist(&self, user: UserId, product: ProductId) -> Result<Wishlist> {
        let mut wishlists = self.wishlists.write();
        let wishlist = wishlists.get_mut(&user).ok_or(WishlistError::NotListed(product))?;
        wishlist.remove(product)?;
        Ok(wishlist.clone())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load_profile(&self, user: UserId) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().get(&user).cloned())
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.profiles.write().insert(profile.user_id(), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;
    use crate::domain::value_objects::{Money, Rating, ReviewId};
    use crate::store::ProductSort;

    fn product(title: &str, price: i64, category: &str) -> Product {
        Product::create(title, Money::inr(Decimal::new(price, 0)), category).unwrap()
    }

    #[tokio::test]
    async fn decrease_without_cart_does_not_create_one() {
        let store = MemoryStore::new();
        let user = UserId::new();

        let result = store.apply_delta(user, ProductId::new(), -1).await;

        assert!(matches!(result, Err(CommerceError::NotFound(_))), "got {result:?}");
        assert!(store.load_cart(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_unknown_user_succeeds() -> TestResult {
        let store = MemoryStore::new();

        store.clear_cart(UserId::new()).await?;

        Ok(())
    }

    #[tokio::test]
    async fn carts_are_isolated_per_user() -> TestResult {
        let store = MemoryStore::new();
        let (alice, bob) = (UserId::new(), UserId::new());
        let p = ProductId::new();

        store.apply_delta(alice, p, 1).await?;
        store.apply_delta(alice, p, 1).await?;
        let bobs = store.apply_delta(bob, p, 1).await?;

        assert_eq!(bobs.quantity_of(p).map(|q| q.value()), Some(1));
        assert_eq!(store.load_cart(alice).await?.and_then(|c| c.quantity_of(p)).map(|q| q.value()), Some(2));

        Ok(())
    }

    #[tokio::test]
    async fn list_products_filters_and_sorts() -> TestResult {
        let store = MemoryStore::with_products([
            product("Linen Shirt", 900, "clothing"),
            product("Denim Jacket", 2500, "clothing"),
            product("Desk Lamp", 1200, "home"),
        ]);
        let filter = ProductFilter { category: Some("Clothing".into()), sort: ProductSort::PriceDesc, ..Default::default() };

        let listed = store.list_products(&filter).await?;

        let titles: Vec<&str> = listed.iter().map(Product::title).collect();
        assert_eq!(titles, vec!["Denim Jacket", "Linen Shirt"]);

        let search = ProductFilter { search: Some("lamp".into()), ..Default::default() };
        assert_eq!(store.list_products(&search).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn review_is_stored_as_given_and_duplicate_conflicts() -> TestResult {
        let p = product("Kettle", 40, "home");
        let id = p.id();
        let store = MemoryStore::with_products([p]);
        let review = Review {
            id: ReviewId::new(), user_id: UserId::new(), name: "Asha".into(),
            rating: Rating::new(4)?, comment: "boils fast".into(), created_at: chrono::Utc::now(),
        };

        let updated = store.add_review(id, &review).await?;
        let again = store.add_review(id, &review).await;

        assert_eq!(updated.reviews(), std::slice::from_ref(&review));
        assert!(matches!(again, Err(CommerceError::Conflict(_))), "got {again:?}");

        Ok(())
    }

    #[tokio::test]
    async fn pending_payment_is_recorded_once() -> TestResult {
        let store = MemoryStore::new();
        let pending = PendingPayment {
            gateway_order_id: "order_1".into(), user_id: UserId::new(), amount: 9900, currency: "INR".into(), created_at: chrono::Utc::now(),
        };

        store.insert_pending_payment(&pending).await?;
        let again = store.insert_pending_payment(&pending).await;

        assert_eq!(store.pending_payment("order_1").await?, pending);
        assert!(matches!(again, Err(CommerceError::Conflict(_))), "got {again:?}");
        assert!(matches!(store.pending_payment("order_2").await, Err(CommerceError::NotFound(_))));

        Ok(())
    }

    #[tokio::test]
    async fn wishlist_remove_absent_is_not_found() -> TestResult {
        let store = MemoryStore::new();
        let user = UserId::new();
        let p = ProductId::new();

        store.add_to_wishlist(user, p).await?;
        let listed = store.add_to_wishlist(user, p).await?;
        let missing = store.remove_from_wishlist(user, ProductId::new()).await;

        assert_eq!(listed.product_ids(), vec![p]);
        assert!(matches!(missing, Err(CommerceError::NotFound(_))), "got {missing:?}");
        assert!(store.remove_from_wishlist(user, p).await?.is_empty());
        assert!(store.load_wishlist(UserId::new()).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn products_by_ids_skips_unknown() -> TestResult {
        let p = product("Mug", 5, "home");
        let id = p.id();
        let store = MemoryStore::with_products([p]);

        let found = store.products_by_ids(&[id, ProductId::new()]).await?;

        assert_eq!(found.len(), 1);
        assert!(found.contains_key(&id));

        Ok(())
    }
}
