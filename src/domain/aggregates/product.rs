//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, ProductId, Rating, ReviewId, UserId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    title: String,
    description: String,
    price: Money,
    category: String,
    image: Option<String>,
    reviews: Vec<Review>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub name: String,
    pub rating: Rating,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Read-only view of the fields pricing needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub title: String,
    pub price: Money,
    pub image: Option<String>,
    pub category: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub total: usize,
    pub average: Decimal,
    /// Five to one star, in that order.
    pub distribution: Vec<StarBucket>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StarBucket {
    pub stars: u8,
    pub count: usize,
    pub percent: u32,
}

impl Product {
    pub fn create(title: impl Into<String>, price: Money, category: impl Into<String>) -> Result<Self, ProductError> {
        let title = title.into().trim().to_string();
        if title.is_empty() { return Err(ProductError::MissingTitle); }
        if price.is_negative() { return Err(ProductError::NegativePrice); }
        let now = Utc::now();
        let mut product = Self {
            id: ProductId::new(), title, description: String::new(), price,
            category: category.into(), image: None, reviews: vec![],
            created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: product.id }));
        Ok(product)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ProductId, title: String, description: String, price: Money, category: String,
        image: Option<String>, reviews: Vec<Review>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, title, description, price, category, image, reviews, created_at, updated_at, events: vec![] }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self { self.description = description.into(); self }
    pub fn with_image(mut self, image: impl Into<String>) -> Self { self.image = Some(image.into()); self }

    pub fn id(&self) -> ProductId { self.id }
    pub fn title(&self) -> &str { &self.title }
    pub fn description(&self) -> &str { &self.description }
    pub fn price(&self) -> &Money { &self.price }
    pub fn category(&self) -> &str { &self.category }
    pub fn image(&self) -> Option<&str> { self.image.as_deref() }
    pub fn reviews(&self) -> &[Review] { &self.reviews }
    pub fn num_reviews(&self) -> usize { self.reviews.len() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Mean star rating, zero without reviews.
    pub fn rating(&self) -> Decimal {
        if self.reviews.is_empty() { return Decimal::ZERO; }
        let sum: u32 = self.reviews.iter().map(|r| u32::from(r.rating.stars())).sum();
        Decimal::from(sum) / Decimal::from(self.reviews.len())
    }

    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id, title: self.title.clone(), price: self.price.clone(),
            image: self.image.clone(), category: self.category.clone(),
        }
    }

    /// Appends a new review. Each user reviews a product at most once.
    pub fn add_review(&mut self, user_id: UserId, name: impl Into<String>, rating: Rating, comment: impl Into<String>) -> Result<Review, ProductError> {
        let review = Review { id: ReviewId::new(), user_id, name: name.into(), rating, comment: comment.into().trim().to_string(), created_at: Utc::now() };
        self.push_review(review.clone())?;
        self.raise_event(DomainEvent::Product(ProductEvent::Reviewed { product_id: self.id, rating: rating.stars() }));
        Ok(review)
    }

    /// Appends an already built review as is, under the same rules as `add_review`.
    pub fn push_review(&mut self, review: Review) -> Result<(), ProductError> {
        if review.comment.trim().is_empty() { return Err(ProductError::EmptyComment); }
        if self.reviews.iter().any(|r| r.user_id == review.user_id) { return Err(ProductError::AlreadyReviewed); }
        self.reviews.push(review);
        self.touch();
        Ok(())
    }

    pub fn review_summary(&self) -> ReviewSummary { ReviewSummary::from_reviews(&self.reviews) }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

impl ReviewSummary {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        let total = reviews.len();
        let distribution = (1..=Rating::MAX)
            .rev()
            .map(|stars| {
                let count = reviews.iter().filter(|r| r.rating.stars() == stars).count();
                StarBucket { stars, count, percent: whole_percent(count, total) }
            })
            .collect();
        let average = if total == 0 {
            Decimal::ZERO
        } else {
            let sum: u32 = reviews.iter().map(|r| u32::from(r.rating.stars())).sum();
            (Decimal::from(sum) / Decimal::from(total)).round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        };
        Self { total, average, distribution }
    }
}

fn whole_percent(count: usize, total: usize) -> u32 {
    if total == 0 { return 0; }
    let pct = (Decimal::from(count) * Decimal::from(100) / Decimal::from(total))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    u32::try_from(pct).unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("product title is required")]
    MissingTitle,
    #[error("price cannot be negative")]
    NegativePrice,
    #[error("review comment is required")]
    EmptyComment,
    #[error("product already reviewed by this user")]
    AlreadyReviewed,
}
