use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use super::{ApiResult, AppState, CurrentUser, ValidatedJson};
use crate::domain::value_objects::ProductId;
use crate::service::CartView;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    pub product_id: ProductId,
}

fn present(view: CartView) -> Json<CartView> {
    Json(CartView { priced: view.priced.rounded(), ..view })
}

pub async fn get(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<CartView>> {
    Ok(present(state.carts.get(user).await?))
}

pub async fn add(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(body): ValidatedJson<CartItemRequest>,
) -> ApiResult<Json<CartView>> {
    state.carts.add(user, body.product_id).await?;
    Ok(present(state.carts.get(user).await?))
}

pub async fn decrease(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(body): ValidatedJson<CartItemRequest>,
) -> ApiResult<Json<CartView>> {
    state.carts.decrease(user, body.product_id).await?;
    Ok(present(state.carts.get(user).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product): Path<ProductId>,
) -> ApiResult<Json<CartView>> {
    state.carts.remove(user, product).await?;
    Ok(present(state.carts.get(user).await?))
}

pub async fn clear(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<StatusCode> {
    state.carts.clear(user).await?;
    Ok(StatusCode::NO_CONTENT)
}
