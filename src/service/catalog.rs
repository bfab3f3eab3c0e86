use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::bus::{publish_all, EventPublisher};
use crate::domain::aggregates::{Product, Review, ReviewSummary};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, ProductId, Rating, UserId};
use crate::store::{Catalog, ProductFilter};
use crate::Result;

#[derive(Clone, Debug)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewsView {
    pub reviews: Vec<Review>,
    pub summary: ReviewSummary,
}

#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn Catalog>,
    events: Arc<dyn EventPublisher>,
    currency: String,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn Catalog>, events: Arc<dyn EventPublisher>, currency: &str) -> Self {
        Self { catalog, events, currency: currency.to_uppercase() }
    }

    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        self.catalog.list_products(filter).await
    }

    pub async fn get(&self, id: ProductId) -> Result<Product> {
        self.catalog.get_product(id).await
    }

    #[tracing::instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create(&self, input: NewProduct) -> Result<Product> {
        let mut product = Product::create(input.title, Money::new(input.price, &self.currency), input.category)?
            .with_description(input.description);
        if let Some(image) = input.image {
            product = product.with_image(image);
        }
        self.catalog.insert_product(&product).await?;
        tracing::info!(product_id = %product.id(), "product created");
        publish_all(self.events.as_ref(), product.take_events()).await;
        Ok(product)
    }

    /// Adds the user's review and returns every review with the new summary.
    #[tracing::instrument(skip(self, name, comment), fields(%product, %user))]
    pub async fn add_review(&self, product: ProductId, user: UserId, name: String, rating: Rating, comment: String) -> Result<ReviewsView> {
        // domain checks run before the write
        let mut draft = self.catalog.get_product(product).await?;
        let review = draft.add_review(user, name, rating, comment)?;

        let updated = self.catalog.add_review(product, &review).await?;
        publish_all(
            self.events.as_ref(),
            vec![DomainEvent::Product(ProductEvent::Reviewed { product_id: product, rating: rating.stars() })],
        )
        .await;
        Ok(ReviewsView { summary: updated.review_summary(), reviews: updated.reviews().to_vec() })
    }

    pub async fn reviews(&self, product: ProductId) -> Result<ReviewsView> {
        let p = self.catalog.get_product(product).await?;
        Ok(ReviewsView { summary: p.review_summary(), reviews: p.reviews().to_vec() })
    }
}
