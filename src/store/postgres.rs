//! PostgreSQL store.
//!
//! Cart mutations run in one transaction that locks the owning `carts` row
//! first, so deltas for the same user serialize while other users proceed.
//! Quantities are changed with relative updates, never read-then-write.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{CartStore, Catalog, OrderStore, ProductFilter, ProductSort, ProfileStore, WishlistStore};
use crate::domain::aggregates::{
    Cart, CartError, CartItem, ContactDetails, Order, OrderLine, OrderPricing, OrderStatus, PaymentRef, PendingPayment, Product,
    ProductSnapshot, Review, UserProfile, Wishlist, WishlistError, WishlistItem,
};
use crate::domain::value_objects::{Money, OrderId, ProductId, Quantity, Rating, ReviewId, UserId};
use crate::{CommerceError, Result};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow { user_id: Uuid, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow { product_id: Uuid, quantity: i32 }

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid, title: String, description: String, price_minor: i64, currency: String,
    category: String, image: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: Uuid, product_id: Uuid, user_id: Uuid, name: String, rating: i16, comment: String, created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid, user_id: Uuid, items: Json<Vec<OrderLine>>, currency: String,
    subtotal_minor: i64, discount_minor: i64, total_minor: i64, status: String,
    gateway_order_id: String, payment_id: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PendingPaymentRow { gateway_order_id: String, user_id: Uuid, amount_minor: i64, currency: String, created_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct WishlistItemRow { product_id: Uuid, added_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid, phone: Option<String>, address: Option<String>, city: Option<String>,
    state: Option<String>, pincode: Option<String>, country: Option<String>, updated_at: DateTime<Utc>,
}

const PRODUCT_COLUMNS: &str = "id, title, description, price_minor, currency, category, image, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, items, currency, subtotal_minor, discount_minor, total_minor, status, gateway_order_id, payment_id, created_at, updated_at";

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(url: &str, max_connections: u32) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn fetch_cart(tx: &mut Transaction<'_, Postgres>, user: UserId) -> Result<Option<Cart>> {
        let Some(row) = sqlx::query_as::<_, CartRow>("SELECT user_id, created_at, updated_at FROM carts WHERE user_id = $1")
            .bind(user.into_uuid())
            .fetch_optional(&mut **tx)
            .await?
        else {
            return Ok(None);
        };
        let items = sqlx::query_as::<_, CartItemRow>("SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY seq")
            .bind(user.into_uuid())
            .fetch_all(&mut **tx)
            .await?
            .into_iter()
            .map(CartItem::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Cart::restore(UserId::from_uuid(row.user_id), items, row.created_at, row.updated_at)?))
    }

    /// Locks the cart row for the rest of the transaction.
    async fn lock_cart(tx: &mut Transaction<'_, Postgres>, user: UserId) -> Result<bool> {
        let locked: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM carts WHERE user_id = $1 FOR UPDATE")
            .bind(user.into_uuid())
            .fetch_optional(&mut **tx)
            .await?;
        Ok(locked.is_some())
    }

    async fn touch_cart(tx: &mut Transaction<'_, Postgres>, user: UserId) -> Result<Cart> {
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE user_id = $1")
            .bind(user.into_uuid())
            .execute(&mut **tx)
            .await?;
        Self::fetch_cart(tx, user).await?.ok_or_else(|| cart_not_found(user))
    }

    async fn reviews_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Review>>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT id, product_id, user_id, name, rating, comment, created_at FROM reviews WHERE product_id = ANY($1) ORDER BY created_at",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        let mut grouped: HashMap<Uuid, Vec<Review>> = HashMap::new();
        for row in rows {
            let product_id = row.product_id;
            grouped.entry(product_id).or_default().push(Review::try_from(row)?);
        }
        Ok(grouped)
    }

    async fn fetch_wishlist(&self, user: UserId) -> Result<Wishlist> {
        let items = sqlx::query_as::<_, WishlistItemRow>("SELECT product_id, added_at FROM wishlist_items WHERE user_id = $1 ORDER BY added_at")
            .bind(user.into_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| WishlistItem { product_id: ProductId::from_uuid(row.product_id), added_at: row.added_at })
            .collect();
        Ok(Wishlist::restore(user, items))
    }

    async fn hydrate(&self, rows: Vec<ProductRow>) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut reviews = self.reviews_for(&ids).await?;
        Ok(rows.into_iter().map(|row| {
            let product_reviews = reviews.remove(&row.id).unwrap_or_default();
            row.into_product(product_reviews)
        }).collect())
    }
}

impl From<PendingPaymentRow> for PendingPayment {
    fn from(row: PendingPaymentRow) -> Self {
        PendingPayment {
            gateway_order_id: row.gateway_order_id,
            user_id: UserId::from_uuid(row.user_id),
            amount: row.amount_minor,
            currency: row.currency,
            created_at: row.created_at,
        }
    }
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        let details = ContactDetails {
            phone: row.phone, address: row.address, city: row.city,
            state: row.state, pincode: row.pincode, country: row.country,
        };
        UserProfile::restore(UserId::from_uuid(row.user_id), details, row.updated_at)
    }
}

fn cart_not_found(user: UserId) -> CommerceError {
    CommerceError::NotFound(format!("cart for user {user}"))
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = CommerceError;
    fn try_from(row: CartItemRow) -> Result<Self> {
        let quantity = u32::try_from(row.quantity).map_err(|_| CommerceError::InvalidState(format!("negative quantity for {}", row.product_id)))?;
        Ok(CartItem { product_id: ProductId::from_uuid(row.product_id), quantity: Quantity::new(quantity)? })
    }
}

impl TryFrom<ReviewRow> for Review {
    type Error = CommerceError;
    fn try_from(row: ReviewRow) -> Result<Self> {
        let stars = u8::try_from(row.rating).map_err(|_| CommerceError::InvalidState(format!("rating {} out of range", row.rating)))?;
        Ok(Review {
            id: ReviewId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            name: row.name,
            rating: Rating::new(stars)?,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

impl ProductRow {
    fn price(&self) -> Money { Money::from_minor_units(self.price_minor, &self.currency) }

    fn into_product(self, reviews: Vec<Review>) -> Product {
        let price = self.price();
        Product::restore(
            ProductId::from_uuid(self.id), self.title, self.description, price, self.category,
            self.image, reviews, self.created_at, self.updated_at,
        )
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = CommerceError;
    fn try_from(row: OrderRow) -> Result<Self> {
        let pricing = OrderPricing {
            subtotal: Money::from_minor_units(row.subtotal_minor, &row.currency),
            discount: Money::from_minor_units(row.discount_minor, &row.currency),
            total: Money::from_minor_units(row.total_minor, &row.currency),
        };
        Ok(Order::restore(
            OrderId::from_uuid(row.id),
            UserId::from_uuid(row.user_id),
            row.items.0,
            pricing,
            row.status.parse::<OrderStatus>()?,
            PaymentRef { gateway_order_id: row.gateway_order_id, payment_id: row.payment_id },
            row.created_at,
            row.updated_at,
        ))
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn load_cart(&self, user: UserId) -> Result<Option<Cart>> {
        let mut tx = self.pool.begin().await?;
        let cart = Self::fetch_cart(&mut tx, user).await?;
        tx.commit().await?;
        Ok(cart)
    }

    #[tracing::instrument(skip(self), fields(%user, %product))]
    async fn apply_delta(&self, user: UserId, product: ProductId, delta: i64) -> Result<Cart> {
        if delta == 0 {
            return Err(CartError::InvalidDelta(delta).into());
        }
        let delta = i32::try_from(delta).map_err(|_| CommerceError::from(CartError::InvalidDelta(delta)))?;
        let mut tx = self.pool.begin().await?;

        if delta > 0 {
            sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
                .bind(user.into_uuid())
                .execute(&mut *tx)
                .await?;
        }
        if !Self::lock_cart(&mut tx, user).await? {
            return Err(cart_not_found(user));
        }

        if delta > 0 {
            sqlx::query(
                "INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3) \
                 ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity",
            )
            .bind(user.into_uuid())
            .bind(product.into_uuid())
            .bind(delta)
            .execute(&mut *tx)
            .await?;
        } else {
            let updated = sqlx::query(
                "UPDATE cart_items SET quantity = quantity + $3 WHERE user_id = $1 AND product_id = $2 AND quantity + $3 > 0",
            )
            .bind(user.into_uuid())
            .bind(product.into_uuid())
            .bind(delta)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                let deleted = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
                    .bind(user.into_uuid())
                    .bind(product.into_uuid())
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
                if deleted == 0 {
                    return Err(CartError::ItemNotFound(product).into());
                }
            }
        }

        let cart = Self::touch_cart(&mut tx, user).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn remove_item(&self, user: UserId, product: ProductId) -> Result<Cart> {
        let mut tx = self.pool.begin().await?;
        if !Self::lock_cart(&mut tx, user).await? {
            return Err(cart_not_found(user));
        }
        let deleted = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.into_uuid())
            .bind(product.into_uuid())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(CartError::ItemNotFound(product).into());
        }
        let cart = Self::touch_cart(&mut tx, user).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn clear_cart(&self, user: UserId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        if Self::lock_cart(&mut tx, user).await? {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
                .bind(user.into_uuid())
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE carts SET updated_at = NOW() WHERE user_id = $1")
                .bind(user.into_uuid())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, ProductSnapshot>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.into_uuid()).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"))
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| {
            let id = ProductId::from_uuid(row.id);
            (id, ProductSnapshot { id, price: row.price(), title: row.title, image: row.image, category: row.category })
        }).collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("product {id}")))?;
        let mut products = self.hydrate(vec![row]).await?;
        products.pop().ok_or_else(|| CommerceError::NotFound(format!("product {id}")))
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let order_by = match filter.sort {
            ProductSort::Newest => "created_at DESC",
            ProductSort::PriceAsc => "price_minor ASC",
            ProductSort::PriceDesc => "price_minor DESC",
        };
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1::TEXT IS NULL OR lower(category) = lower($1)) \
               AND ($2::TEXT IS NULL OR title ILIKE '%' || $2 || '%' OR description ILIKE '%' || $2 || '%') \
             ORDER BY {order_by}"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(filter.category.as_deref())
            .bind(filter.search.as_deref())
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, title, description, price_minor, currency, category, image, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(product.id().into_uuid())
        .bind(product.title())
        .bind(product.description())
        .bind(product.price().to_minor_units()?)
        .bind(product.price().currency())
        .bind(product.category())
        .bind(product.image())
        .bind(product.created_at())
        .bind(product.updated_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_review(&self, product: ProductId, review: &Review) -> Result<Product> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(product.into_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(CommerceError::NotFound(format!("product {product}")));
        }
        sqlx::query(
            "INSERT INTO reviews (id, product_id, user_id, name, rating, comment, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(review.id.into_uuid())
        .bind(product.into_uuid())
        .bind(review.user_id.into_uuid())
        .bind(&review.name)
        .bind(i16::from(review.rating.stars()))
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE products SET updated_at = NOW() WHERE id = $1")
            .bind(product.into_uuid())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        self.get_product(product).await
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let pricing = order.pricing();
        sqlx::query(&format!("INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"))
            .bind(order.id().into_uuid())
            .bind(order.user_id().into_uuid())
            .bind(Json(order.items()))
            .bind(pricing.total.currency())
            .bind(pricing.subtotal.to_minor_units()?)
            .bind(pricing.discount.to_minor_units()?)
            .bind(pricing.total.to_minor_units()?)
            .bind(order.status().as_str())
            .bind(&order.payment().gateway_order_id)
            .bind(&order.payment().payment_id)
            .bind(order.created_at())
            .bind(order.updated_at())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("order {id}")))?
            .try_into()
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"))
            .bind(user.into_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Order::try_from)
            .collect()
    }

    async fn update_status(&self, id: OrderId, expected: OrderStatus, order: &Order) -> Result<()> {
        let updated = sqlx::query("UPDATE orders SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2")
            .bind(id.into_uuid())
            .bind(expected.as_str())
            .bind(order.status().as_str())
            .bind(order.updated_at())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            let current = self.get_order(id).await?;
            return Err(CommerceError::Conflict(format!("order {id} is {} not {expected}", current.status())));
        }
        Ok(())
    }

    async fn insert_pending_payment(&self, pending: &PendingPayment) -> Result<()> {
        sqlx::query("INSERT INTO pending_payments (gateway_order_id, user_id, amount_minor, currency, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(&pending.gateway_order_id)
            .bind(pending.user_id.into_uuid())
            .bind(pending.amount)
            .bind(&pending.currency)
            .bind(pending.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn pending_payment(&self, gateway_order_id: &str) -> Result<PendingPayment> {
        sqlx::query_as::<_, PendingPaymentRow>(
            "SELECT gateway_order_id, user_id, amount_minor, currency, created_at FROM pending_payments WHERE gateway_order_id = $1",
        )
        .bind(gateway_order_id)
        .fetch_optional(&self.pool)
        .await?
        .map(PendingPayment::from)
        .ok_or_else(|| CommerceError::NotFound(format!("payment order {gateway_order_id}")))
    }
}

#[async_trait]
impl WishlistStore for PgStore {
    async fn load_wishlist(&self, user: UserId) -> Result<Wishlist> {
        self.fetch_wishlist(user).await
    }

    async fn add_to_wishlist(&self, user: UserId, product: ProductId) -> Result<Wishlist> {
        sqlx::query("INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2) ON CONFLICT (user_id, product_id) DO NOTHING")
            .bind(user.into_uuid())
            .bind(product.into_uuid())
            .execute(&self.pool)
            .await?;
        self.fetch_wishlist(user).await
    }

    async fn remove_from_wishlist(&self, user: UserId, product: ProductId) -> Result<Wishlist> {
        let deleted = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.into_uuid())
            .bind(product.into_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(WishlistError::NotListed(product).into());
        }
        self.fetch_wishlist(user).await
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn load_profile(&self, user: UserId) -> Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT user_id, phone, address, city, state, pincode, country, updated_at FROM user_profiles WHERE user_id = $1",
        )
        .bind(user.into_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserProfile::from))
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let details = profile.details();
        sqlx::query(
            "INSERT INTO user_profiles (user_id, phone, address, city, state, pincode, country, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, NOW())) \
             ON CONFLICT (user_id) DO UPDATE SET phone = EXCLUDED.phone, address = EXCLUDED.address, city = EXCLUDED.city, \
             state = EXCLUDED.state, pincode = EXCLUDED.pincode, country = EXCLUDED.country, updated_at = EXCLUDED.updated_at",
        )
        .bind(profile.user_id().into_uuid())
        .bind(details.phone.as_deref())
        .bind(details.address.as_deref())
        .bind(details.city.as_deref())
        .bind(details.state.as_deref())
        .bind(details.pincode.as_deref())
        .bind(details.country.as_deref())
        .bind(profile.updated_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
