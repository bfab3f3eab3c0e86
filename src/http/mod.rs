//! HTTP surface.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use validator::Validate;

use crate::bus::EventPublisher;
use crate::mail::Mailer;
use crate::payments::PaymentGateway;
use crate::pricing::PricingEngine;
use crate::service::{CartService, CatalogService, CheckoutService, ProfileService, WishlistService};
use crate::store::{CartStore, Catalog, OrderStore, ProfileStore, WishlistStore};

pub mod auth;
mod cart;
pub mod error;
mod payment;
mod products;
mod profile;
mod wishlist;

pub use auth::CurrentUser;
pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub profile: ProfileService,
    pub wishlist: WishlistService,
}

/// Adapters the services are wired to.
pub struct Backends {
    pub carts: Arc<dyn CartStore>,
    pub catalog: Arc<dyn Catalog>,
    pub orders: Arc<dyn OrderStore>,
    pub wishlists: Arc<dyn WishlistStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub events: Arc<dyn EventPublisher>,
}

impl AppState {
    pub fn new(backends: Backends, pricing: PricingEngine) -> Self {
        let currency = pricing.currency().to_string();
        let carts = CartService::new(backends.carts, backends.catalog.clone(), pricing);
        Self {
            wishlist: WishlistService::new(backends.wishlists, backends.catalog.clone()),
            catalog: CatalogService::new(backends.catalog, backends.events.clone(), &currency),
            checkout: CheckoutService::new(carts.clone(), backends.orders.clone(), backends.gateway, backends.mailer, backends.events),
            profile: ProfileService::new(backends.orders, backends.profiles, &currency),
            carts,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({ "status": "healthy", "service": "nextbuy-commerce" })) }))
        .route("/product/products", get(products::list).post(products::create))
        .route("/product/products/getProductById/:id", get(products::get))
        .route("/product/productsbycategory/:category", get(products::by_category))
        .route("/product/products/:id/reviews", get(products::reviews).post(products::add_review))
        .route("/cart/getCart", get(cart::get))
        .route("/cart/add", post(cart::add))
        .route("/cart/decrease", post(cart::decrease))
        .route("/cart/remove/:id", delete(cart::remove))
        .route("/cart/clear", delete(cart::clear))
        .route("/payment/create-order", post(payment::create_order))
        .route("/payment/verify-payment", post(payment::verify_payment))
        .route("/payment/orders", get(payment::orders))
        .route("/payment/orders/:id", get(payment::order))
        .route("/payment/orders/:id/advance", post(payment::advance))
        .route("/wishlist/", get(wishlist::get).post(wishlist::add))
        .route("/wishlist/remove/:id", delete(wishlist::remove))
        .route("/profile/", get(profile::get).put(profile::update))
        .route("/profile/activities", get(profile::activities))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// JSON body that has passed its `validator` rules.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}
