use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use super::{ApiResult, AppState, CurrentUser, ValidatedJson};
use crate::domain::aggregates::Order;
use crate::domain::value_objects::OrderId;
use crate::service::{CheckoutSession, PaymentConfirmation};

/// Callback fields as the payment widget reports them.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPayment {
    #[validate(length(min = 1))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1))]
    pub razorpay_payment_id: String,
    #[validate(length(equal = 64))]
    pub razorpay_signature: String,
    #[validate(email)]
    pub email: Option<String>,
}

pub async fn create_order(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<CheckoutSession>> {
    Ok(Json(state.checkout.begin(user).await?))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(body): ValidatedJson<VerifyPayment>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let confirmation = PaymentConfirmation {
        gateway_order_id: body.razorpay_order_id,
        payment_id: body.razorpay_payment_id,
        signature: body.razorpay_signature,
        email: body.email,
    };
    let order = state.checkout.confirm(user, confirmation).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn orders(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.checkout.orders(user).await?))
}

pub async fn order(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<OrderId>) -> ApiResult<Json<Order>> {
    Ok(Json(state.checkout.get_order(user, id).await?))
}

pub async fn advance(State(state): State<AppState>, _user: CurrentUser, Path(id): Path<OrderId>) -> ApiResult<Json<Order>> {
    Ok(Json(state.checkout.advance_order(id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::domain::value_objects::UserId;
    use crate::http::test_support::{app, product, send, SECRET};
    use crate::payments::signature;

    #[tokio::test]
    async fn verified_payment_creates_order_and_clears_cart() {
        let p = product("Blender", 4000, "kitchen");
        let id = p.id();
        let app = app(vec![p]);
        let user = Some(UserId::new());
        send(&app, "POST", "/cart/add", user, Some(json!({ "productId": id }))).await;
        let (status, session) = send(&app, "POST", "/payment/create-order", user, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["amount"], 300_000);
        let order_id = session["gateway_order_id"].as_str().unwrap();
        let sig = signature(SECRET, order_id, "pay_xyz").unwrap();

        let (status, order) = send(
            &app,
            "POST",
            "/payment/verify-payment",
            user,
            Some(json!({ "razorpay_order_id": order_id, "razorpay_payment_id": "pay_xyz", "razorpay_signature": sig })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "confirmed");
        assert_eq!(order["pricing"]["total"]["amount"], "3000.00");
        let (_, cart) = send(&app, "GET", "/cart/getCart", user, None).await;
        assert!(cart["priced"]["lines"].as_array().unwrap().is_empty());
        let (_, orders) = send(&app, "GET", "/payment/orders", user, None).await;
        assert_eq!(orders.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forged_signature_is_rejected() {
        let p = product("Blender", 4000, "kitchen");
        let id = p.id();
        let app = app(vec![p]);
        let user = Some(UserId::new());
        send(&app, "POST", "/cart/add", user, Some(json!({ "productId": id }))).await;
        let forged = signature("wrong", "order_abc", "pay_xyz").unwrap();

        let (status, _) = send(
            &app,
            "POST",
            "/payment/verify-payment",
            user,
            Some(json!({ "razorpay_order_id": "order_abc", "razorpay_payment_id": "pay_xyz", "razorpay_signature": forged })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, orders) = send(&app, "GET", "/payment/orders", user, None).await;
        assert!(orders.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cart_changed_after_create_order_is_409() {
        let p = product("Blender", 4000, "kitchen");
        let id = p.id();
        let app = app(vec![p]);
        let user = Some(UserId::new());
        send(&app, "POST", "/cart/add", user, Some(json!({ "productId": id }))).await;
        let (_, session) = send(&app, "POST", "/payment/create-order", user, None).await;
        let order_id = session["gateway_order_id"].as_str().unwrap();
        for _ in 0..9 {
            send(&app, "POST", "/cart/add", user, Some(json!({ "productId": id }))).await;
        }
        let sig = signature(SECRET, order_id, "pay_xyz").unwrap();

        let (status, _) = send(
            &app,
            "POST",
            "/payment/verify-payment",
            user,
            Some(json!({ "razorpay_order_id": order_id, "razorpay_payment_id": "pay_xyz", "razorpay_signature": sig })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        let (_, orders) = send(&app, "GET", "/payment/orders", user, None).await;
        assert!(orders.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_order_with_empty_cart_is_422() {
        let app = app(vec![]);

        let (status, _) = send(&app, "POST", "/payment/create-order", Some(UserId::new()), None).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
