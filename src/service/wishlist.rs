use std::sync::Arc;

use serde::Serialize;

use crate::domain::aggregates::ProductSnapshot;
use crate::domain::value_objects::{ProductId, UserId};
use crate::store::{Catalog, WishlistStore};
use crate::{CommerceError, Result};

/// Wishlist as shown to its owner, oldest entry first.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WishlistView {
    pub user_id: UserId,
    pub products: Vec<ProductSnapshot>,
    /// Saved products that were deleted from the catalog.
    pub unavailable: Vec<ProductId>,
}

#[derive(Clone)]
pub struct WishlistService {
    wishlists: Arc<dyn WishlistStore>,
    catalog: Arc<dyn Catalog>,
}

impl WishlistService {
    pub fn new(wishlists: Arc<dyn WishlistStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self { wishlists, catalog }
    }

    #[tracing::instrument(skip(self), fields(%user, %product))]
    pub async fn add(&self, user: UserId, product: ProductId) -> Result<WishlistView> {
        let known = self.catalog.products_by_ids(&[product]).await?;
        if !known.contains_key(&product) {
            return Err(CommerceError::NotFound(format!("product {product}")));
        }
        let wishlist = self.wishlists.add_to_wishlist(user, product).await?;
        self.view(user, wishlist.product_ids()).await
    }

    #[tracing::instrument(skip(self), fields(%user, %product))]
    pub async fn remove(&self, user: UserId, product: ProductId) -> Result<WishlistView> {
        let wishlist = self.wishlists.remove_from_wishlist(user, product).await?;
        self.view(user, wishlist.product_ids()).await
    }

    pub async fn get(&self, user: UserId) -> Result<WishlistView> {
        let wishlist = self.wishlists.load_wishlist(user).await?;
        self.view(user, wishlist.product_ids()).await
    }

    async fn view(&self, user: UserId, ids: Vec<ProductId>) -> Result<WishlistView> {
        let mut snapshot = self.catalog.products_by_ids(&ids).await?;
        let mut products = Vec::with_capacity(ids.len());
        let mut unavailable = Vec::new();
        for id in ids {
            match snapshot.remove(&id) {
                Some(p) => products.push(p),
                None => unavailable.push(id),
            }
        }
        Ok(WishlistView { user_id: user, products, unavailable })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;
    use crate::domain::aggregates::{Product, Wishlist};
    use crate::domain::value_objects::Money;
    use crate::store::{MemoryStore, MockCatalog, MockWishlistStore};

    fn product(title: &str) -> Product {
        Product::create(title, Money::inr(Decimal::new(500, 0)), "home").unwrap()
    }

    #[tokio::test]
    async fn add_list_and_remove() -> TestResult {
        let (lamp, rug) = (product("Lamp"), product("Rug"));
        let (lamp_id, rug_id) = (lamp.id(), rug.id());
        let store = Arc::new(MemoryStore::with_products([lamp, rug]));
        let service = WishlistService::new(store.clone(), store);
        let user = UserId::new();

        service.add(user, rug_id).await?;
        service.add(user, lamp_id).await?;
        let view = service.add(user, rug_id).await?;

        let titles: Vec<&str> = view.products.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Rug", "Lamp"]);
        let view = service.remove(user, rug_id).await?;
        assert_eq!(view.products.len(), 1);
        assert!(matches!(service.remove(user, rug_id).await, Err(CommerceError::NotFound(_))));

        Ok(())
    }

    #[tokio::test]
    async fn unknown_product_is_not_saved() -> TestResult {
        let store = Arc::new(MemoryStore::new());
        let service = WishlistService::new(store.clone(), store);
        let user = UserId::new();

        let result = service.add(user, ProductId::new()).await;

        assert!(matches!(result, Err(CommerceError::NotFound(_))), "got {result:?}");
        assert!(service.get(user).await?.products.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn deleted_products_are_flagged() -> TestResult {
        let user = UserId::new();
        let gone = ProductId::new();
        let mut wishlists = MockWishlistStore::new();
        wishlists.expect_load_wishlist().returning(move |u| {
            let mut wishlist = Wishlist::new(u);
            wishlist.add(gone);
            Ok(wishlist)
        });
        let mut catalog = MockCatalog::new();
        catalog.expect_products_by_ids().returning(|_| Ok(HashMap::new()));
        let service = WishlistService::new(Arc::new(wishlists), Arc::new(catalog));

        let view = service.get(user).await?;

        assert!(view.products.is_empty());
        assert_eq!(view.unavailable, vec![gone]);

        Ok(())
    }
}
