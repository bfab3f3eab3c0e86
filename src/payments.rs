//! Payment gateway client.
//!
//! Checkout creates a gateway order for the cart total, the browser collects
//! the payment, and the gateway hands back `order_id`, `payment_id` and an
//! HMAC-SHA256 signature over `"{order_id}|{payment_id}"` keyed with the
//! account secret.

use async_trait::async_trait;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::CommerceError;

const RAZORPAY_API: &str = "https://api.razorpay.com/v1";

/// Order as created on the gateway side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("payment amount must be positive, got {0}")]
    InvalidAmount(i64),
}

impl From<PaymentError> for CommerceError {
    fn from(err: PaymentError) -> Self { Self::Payment(err.to_string()) }
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key the client needs to open the checkout widget.
    fn key_id(&self) -> String;

    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, PaymentError>;

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Hex HMAC-SHA256 of `"{order_id}|{payment_id}"`.
pub fn signature(secret: &str, order_id: &str, payment_id: &str) -> Result<String, InvalidLength> {
    Ok(hex::encode(signer(secret, order_id, payment_id)?.finalize().into_bytes()))
}

/// Constant-time check of a hex signature.
pub fn verify(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else { return false };
    let Ok(mac) = signer(secret, order_id, payment_id) else { return false };
    mac.verify_slice(&expected).is_ok()
}

fn signer(secret: &str, order_id: &str, payment_id: &str) -> Result<Hmac<Sha256>, InvalidLength> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(mac)
}

#[derive(Clone, Debug)]
pub struct RazorpayGateway {
    http: Client,
    key_id: String,
    key_secret: String,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

impl RazorpayGateway {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self { http: Client::new(), key_id: key_id.into(), key_secret: key_secret.into() }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> String { self.key_id.clone() }

    #[tracing::instrument(skip(self))]
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, PaymentError> {
        if amount_minor <= 0 {
            return Err(PaymentError::InvalidAmount(amount_minor));
        }
        let response = self
            .http
            .post(format!("{RAZORPAY_API}/orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderRequest { amount: amount_minor, currency, receipt })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected { status, body });
        }

        let order: GatewayOrder = response.json().await?;
        tracing::info!(gateway_order_id = %order.id, amount = order.amount, "gateway order created");
        Ok(order)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify(&self.key_secret, order_id, payment_id, signature)
    }
}
