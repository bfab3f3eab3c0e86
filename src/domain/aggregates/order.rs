//! Order Aggregate
//!
//! Orders are snapshots taken at checkout. Line prices never change after
//! creation; only the status moves, forward one step at a time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, MoneyError, OrderId, ProductId, UserId};
use crate::pricing::PricedCart;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    items: Vec<OrderLine>,
    pricing: OrderPricing,
    status: OrderStatus,
    payment: PaymentRef,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub image: Option<String>,
    pub unit_price: Money,
    pub discounted_unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderPricing {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

/// Gateway identifiers proving the order was paid for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRef {
    pub gateway_order_id: String,
    pub payment_id: String,
}

/// Gateway order opened at checkout, before the customer has paid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub gateway_order_id: String,
    pub user_id: UserId,
    /// Minor units, as charged by the gateway.
    pub amount: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl PendingPayment {
    /// Whether `total` is exactly the amount this payment was opened for.
    pub fn covers(&self, total: &Money) -> Result<bool, MoneyError> {
        Ok(total.currency().eq_ignore_ascii_case(&self.currency) && total.to_minor_units()? == self.amount)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Shipped, Delivered }

impl OrderStatus {
    /// The only status reachable from this one.
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl Order {
    /// Snapshots a priced cart into a confirmed order.
    pub fn from_priced_cart(user_id: UserId, priced: &PricedCart, payment: PaymentRef) -> Result<Self, OrderError> {
        if priced.lines.is_empty() { return Err(OrderError::NoItems); }
        let items = priced.lines.iter().map(|l| OrderLine {
            product_id: l.product_id,
            title: l.title.clone(),
            image: l.image.clone(),
            unit_price: l.unit_price.clone(),
            discounted_unit_price: l.discounted_unit_price.clone(),
            quantity: l.quantity.value(),
            line_total: l.line_total.clone(),
        }).collect();
        let pricing = OrderPricing {
            subtotal: priced.original_subtotal.clone(),
            discount: priced.savings.clone(),
            total: priced.subtotal.clone(),
        };
        let now = Utc::now();
        let mut order = Self {
            id: OrderId::new(), user_id, items, pricing, status: OrderStatus::Pending, payment,
            created_at: now, updated_at: now, events: vec![],
        };
        order.advance()?;
        Ok(order)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OrderId, user_id: UserId, items: Vec<OrderLine>, pricing: OrderPricing, status: OrderStatus,
        payment: PaymentRef, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, user_id, items, pricing, status, payment, created_at, updated_at, events: vec![] }
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn user_id(&self) -> UserId { self.user_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[OrderLine] { &self.items }
    pub fn pricing(&self) -> &OrderPricing { &self.pricing }
    pub fn total(&self) -> &Money { &self.pricing.total }
    pub fn payment(&self) -> &PaymentRef { &self.payment }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Moves the order one step forward. There is no way back.
    pub fn advance(&mut self) -> Result<OrderStatus, OrderError> {
        let (to, event) = match self.status {
            OrderStatus::Pending => (
                OrderStatus::Confirmed,
                OrderEvent::Confirmed { order_id: self.id, user_id: self.user_id, total: self.pricing.total.amount() },
            ),
            OrderStatus::Confirmed => (OrderStatus::Shipped, OrderEvent::Shipped { order_id: self.id }),
            OrderStatus::Shipped => (OrderStatus::Delivered, OrderEvent::Delivered { order_id: self.id }),
            OrderStatus::Delivered => return Err(OrderError::FinalStatus(OrderStatus::Delivered)),
        };
        self.status = to;
        self.touch();
        self.raise_event(DomainEvent::Order(event));
        Ok(to)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("order is already {0}")]
    FinalStatus(OrderStatus),
    #[error("unknown order status {0:?}")]
    UnknownStatus(String),
}
