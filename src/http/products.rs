use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{ApiResult, AppState, CurrentUser, ValidatedJson};
use crate::domain::aggregates::{Product, Review, ReviewSummary};
use crate::domain::value_objects::{Money, ProductId, Rating};
use crate::service::{NewProduct, ReviewsView};
use crate::store::{ProductFilter, ProductSort};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: Money,
    pub category: String,
    pub image: Option<String>,
    pub rating: Decimal,
    pub num_reviews: usize,
}

impl From<&Product> for ProductResponse {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id(),
            title: p.title().to_string(),
            description: p.description().to_string(),
            price: p.price().clone(),
            category: p.category().to_string(),
            image: p.image().map(str::to_string),
            rating: p.review_summary().average,
            num_reviews: p.num_reviews(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductResponse,
    pub reviews: Vec<Review>,
    pub summary: ReviewSummary,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(custom = "non_negative")]
    pub price: Decimal,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(url)]
    pub image: Option<String>,
}

fn non_negative(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReview {
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    #[validate(length(min = 1, max = 2000))]
    pub comment: String,
    #[validate(length(max = 100))]
    pub name: Option<String>,
}

pub async fn list(State(state): State<AppState>, Query(params): Query<ListParams>) -> ApiResult<Json<Vec<ProductResponse>>> {
    let filter = ProductFilter { category: params.category, search: params.search, sort: params.sort };
    let products = state.catalog.list(&filter).await?;
    let limit = params.limit.unwrap_or(usize::MAX);
    Ok(Json(products.iter().take(limit).map(ProductResponse::from).collect()))
}

pub async fn by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<ProductResponse>>> {
    list(State(state), Query(ListParams { category: Some(category), ..params })).await
}

pub async fn get(State(state): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<Json<ProductDetail>> {
    let product = state.catalog.get(id).await?;
    Ok(Json(ProductDetail {
        product: ProductResponse::from(&product),
        reviews: product.reviews().to_vec(),
        summary: product.review_summary(),
    }))
}

pub async fn create(
    State(state): State<AppState>,
    _user: CurrentUser,
    ValidatedJson(body): ValidatedJson<CreateProduct>,
) -> ApiResult<(StatusCode, Json<ProductResponse>)> {
    let product = state
        .catalog
        .create(NewProduct { title: body.title, description: body.description, price: body.price, category: body.category, image: body.image })
        .await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from(&product))))
}

pub async fn reviews(State(state): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<Json<ReviewsView>> {
    Ok(Json(state.catalog.reviews(id).await?))
}

pub async fn add_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<ProductId>,
    ValidatedJson(body): ValidatedJson<CreateReview>,
) -> ApiResult<(StatusCode, Json<ReviewsView>)> {
    let rating = Rating::new(body.rating).map_err(crate::CommerceError::from)?;
    let name = body.name.unwrap_or_else(|| "Customer".to_string());
    let view = state.catalog.add_review(id, user, name, rating, body.comment).await?;
    Ok((StatusCode::CREATED, Json(view)))
}
