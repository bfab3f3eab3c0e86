use std::sync::Arc;

use serde::Serialize;

use crate::domain::aggregates::{Cart, CartItem};
use crate::domain::value_objects::{ProductId, UserId};
use crate::pricing::{PricedCart, PricingEngine};
use crate::store::{CartStore, Catalog};
use crate::{CommerceError, Result};

/// Cart as shown to its owner.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartView {
    pub user_id: UserId,
    pub priced: PricedCart,
    /// Items whose product was deleted from the catalog. Never priced.
    pub unavailable: Vec<CartItem>,
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn Catalog>,
    pricing: PricingEngine,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn Catalog>, pricing: PricingEngine) -> Self {
        Self { carts, catalog, pricing }
    }

    pub fn pricing(&self) -> &PricingEngine { &self.pricing }

    /// One more unit of `product`.
    #[tracing::instrument(skip(self), fields(%user, %product))]
    pub async fn add(&self, user: UserId, product: ProductId) -> Result<Cart> {
        let known = self.catalog.products_by_ids(&[product]).await?;
        if !known.contains_key(&product) {
            return Err(CommerceError::NotFound(format!("product {product}")));
        }
        let cart = self.carts.apply_delta(user, product, 1).await?;
        tracing::debug!(items = cart.item_count(), "added to cart");
        Ok(cart)
    }

    /// One unit less; the item disappears at zero.
    #[tracing::instrument(skip(self), fields(%user, %product))]
    pub async fn decrease(&self, user: UserId, product: ProductId) -> Result<Cart> {
        self.carts.apply_delta(user, product, -1).await.map_err(|e| match e {
            CommerceError::NotFound(_) => CommerceError::NotFound(format!("product {product} is not in the cart")),
            other => other,
        })
    }

    #[tracing::instrument(skip(self), fields(%user, %product))]
    pub async fn remove(&self, user: UserId, product: ProductId) -> Result<Cart> {
        self.carts.remove_item(user, product).await.map_err(|e| match e {
            CommerceError::NotFound(_) => CommerceError::NotFound(format!("product {product} is not in the cart")),
            other => other,
        })
    }

    #[tracing::instrument(skip(self), fields(%user))]
    pub async fn clear(&self, user: UserId) -> Result<()> {
        self.carts.clear_cart(user).await
    }

    /// Cart priced against live catalog prices. Lines for deleted products
    /// are split off into `unavailable`.
    #[tracing::instrument(skip(self), fields(%user))]
    pub async fn get(&self, user: UserId) -> Result<CartView> {
        let cart = self.carts.load_cart(user).await?.unwrap_or_else(|| Cart::new(user));
        let snapshot = self.catalog.products_by_ids(&cart.product_ids()).await?;
        let (available, unavailable): (Vec<CartItem>, Vec<CartItem>) =
            cart.items().iter().cloned().partition(|item| snapshot.contains_key(&item.product_id));
        if !unavailable.is_empty() {
            tracing::warn!(count = unavailable.len(), "cart references deleted products");
        }
        let priced = self.pricing.price(&available, &snapshot)?;
        Ok(CartView { user_id: user, priced, unavailable })
    }

    /// Cart priced for payment. Any line without a product is an error
    /// rather than being dropped silently.
    pub async fn priced(&self, user: UserId) -> Result<PricedCart> {
        let Some(cart) = self.carts.load_cart(user).await? else {
            return Err(CommerceError::InvalidState("cart is empty".into()));
        };
        if cart.is_empty() {
            return Err(CommerceError::InvalidState("cart is empty".into()));
        }
        let snapshot = self.catalog.products_by_ids(&cart.product_ids()).await?;
        Ok(self.pricing.price(cart.items(), &snapshot)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use mockall::predicate::eq;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;
    use crate::domain::aggregates::Product;
    use crate::domain::value_objects::{DiscountRate, Money};
    use crate::store::{MemoryStore, MockCartStore, MockCatalog};

    fn engine() -> PricingEngine { PricingEngine::new(DiscountRate::from_percent(25).unwrap(), "INR") }

    fn service_with(products: Vec<Product>) -> (CartService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_products(products));
        (CartService::new(store.clone(), store.clone(), engine()), store)
    }

    fn product(price: i64) -> Product {
        Product::create("Cotton Tee", Money::inr(Decimal::new(price, 0)), "clothing").unwrap()
    }

    #[tokio::test]
    async fn add_counts_calls() -> TestResult {
        let p = product(100);
        let id = p.id();
        let (service, _) = service_with(vec![p]);
        let user = UserId::new();

        for _ in 0..3 {
            service.add(user, id).await?;
        }

        let view = service.get(user).await?;
        assert_eq!(view.priced.item_count(), 3);
        assert_eq!(view.priced.rounded().subtotal.amount(), Decimal::new(22500, 2));

        Ok(())
    }

    #[tokio::test]
    async fn add_unknown_product_is_not_found() {
        let (service, store) = service_with(vec![]);
        let user = UserId::new();

        let result = service.add(user, ProductId::new()).await;

        assert!(matches!(result, Err(CommerceError::NotFound(_))), "got {result:?}");
        assert!(store.load_cart(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn decrease_to_zero_removes_item() -> TestResult {
        let p = product(10);
        let id = p.id();
        let (service, _) = service_with(vec![p]);
        let user = UserId::new();
        service.add(user, id).await?;
        service.add(user, id).await?;

        service.decrease(user, id).await?;
        let cart = service.decrease(user, id).await?;

        assert!(cart.quantity_of(id).is_none());
        assert!(cart.is_empty());
        assert!(matches!(service.decrease(user, id).await, Err(CommerceError::NotFound(_))));

        Ok(())
    }

    #[tokio::test]
    async fn get_without_cart_is_empty_view() -> TestResult {
        let (service, _) = service_with(vec![]);

        let view = service.get(UserId::new()).await?;

        assert!(view.priced.is_empty());
        assert!(view.unavailable.is_empty());
        assert_eq!(view.priced.subtotal, Money::zero("INR"));

        Ok(())
    }

    #[tokio::test]
    async fn deleted_products_are_flagged_not_priced() -> TestResult {
        let kept = product(100);
        let kept_id = kept.id();
        let gone = ProductId::new();
        let user = UserId::new();
        let mut carts = MockCartStore::new();
        carts.expect_load_cart().with(eq(user)).returning(move |_| {
            let mut cart = Cart::new(user);
            cart.add(kept_id).unwrap();
            cart.add(gone).unwrap();
            Ok(Some(cart))
        });
        let snapshot = kept.snapshot();
        let mut catalog = MockCatalog::new();
        catalog.expect_products_by_ids().returning(move |_| Ok(HashMap::from([(kept_id, snapshot.clone())])));
        let service = CartService::new(Arc::new(carts), Arc::new(catalog), engine());

        let view = service.get(user).await?;

        assert_eq!(view.priced.lines.len(), 1);
        assert_eq!(view.unavailable.len(), 1);
        assert_eq!(view.unavailable[0].product_id, gone);
        assert_eq!(view.priced.subtotal.amount(), Decimal::new(75, 0));

        Ok(())
    }

    #[tokio::test]
    async fn priced_rejects_missing_products() {
        let gone = ProductId::new();
        let user = UserId::new();
        let mut carts = MockCartStore::new();
        carts.expect_load_cart().returning(move |_| {
            let mut cart = Cart::new(user);
            cart.add(gone).unwrap();
            Ok(Some(cart))
        });
        let mut catalog = MockCatalog::new();
        catalog.expect_products_by_ids().returning(|_| Ok(HashMap::new()));
        let service = CartService::new(Arc::new(carts), Arc::new(catalog), engine());

        let result = service.priced(user).await;

        assert!(matches!(result, Err(CommerceError::InvalidState(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn storage_errors_pass_through() {
        let mut carts = MockCartStore::new();
        carts.expect_clear_cart().returning(|_| Err(CommerceError::Storage("connection reset".into())));
        let service = CartService::new(Arc::new(carts), Arc::new(MockCatalog::new()), engine());

        let result = service.clear(UserId::new()).await;

        assert_eq!(result, Err(CommerceError::Storage("connection reset".into())));
    }
}
