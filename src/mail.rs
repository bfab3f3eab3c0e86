//! Transactional email.

use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::domain::aggregates::Order;

const BREVO_API: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[automock]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug)]
pub struct BrevoMailer {
    http: Client,
    api_key: String,
    sender: Sender,
}

#[derive(Serialize)]
struct Address<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender: Address<'a>,
    to: [Address<'a>; 1],
    subject: &'a str,
    html_content: &'a str,
}

impl BrevoMailer {
    pub fn new(api_key: impl Into<String>, sender: Sender) -> Self {
        Self { http: Client::new(), api_key: api_key.into(), sender }
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    #[tracing::instrument(skip(self, html))]
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let body = SendRequest {
            sender: Address { name: Some(&self.sender.name), email: &self.sender.email },
            to: [Address { name: None, email: to }],
            subject,
            html_content: html,
        };
        let response = self.http.post(BREVO_API).header("api-key", &self.api_key).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body });
        }
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), MailError> {
        tracing::info!(to, subject, "email not sent, no mail provider configured");
        Ok(())
    }
}

pub fn order_confirmation_subject(order: &Order) -> String {
    format!("Your NextBuy order {} is confirmed", order.id())
}

pub fn order_confirmation_html(order: &Order) -> String {
    let rows: String = order
        .items()
        .iter()
        .map(|l| format!("<tr><td>{}</td><td>{}</td><td>{}</td></tr>", escape(&l.title), l.quantity, l.line_total.rounded()))
        .collect();
    format!(
        "<h2>Thank you for shopping with NextBuy</h2>\
         <p>Order <strong>{}</strong> is {}.</p>\
         <table><tr><th>Item</th><th>Qty</th><th>Total</th></tr>{rows}</table>\
         <p>Subtotal: {}<br>Discount: {}<br><strong>Total: {}</strong></p>",
        order.id(),
        order.status(),
        order.pricing().subtotal.rounded(),
        order.pricing().discount.rounded(),
        order.total().rounded(),
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
