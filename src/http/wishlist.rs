use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use super::{ApiResult, AppState, CurrentUser, ValidatedJson};
use crate::domain::value_objects::ProductId;
use crate::service::WishlistView;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub product_id: ProductId,
}

pub async fn get(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<WishlistView>> {
    Ok(Json(state.wishlist.get(user).await?))
}

pub async fn add(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(body): ValidatedJson<WishlistRequest>,
) -> ApiResult<(StatusCode, Json<WishlistView>)> {
    Ok((StatusCode::CREATED, Json(state.wishlist.add(user, body.product_id).await?)))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product): Path<ProductId>,
) -> ApiResult<Json<WishlistView>> {
    Ok(Json(state.wishlist.remove(user, product).await?))
}
