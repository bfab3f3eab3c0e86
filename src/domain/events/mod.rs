//! Domain events
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{OrderId, ProductId, UserId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: ProductId },
    Reviewed { product_id: ProductId, rating: u8 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Confirmed { order_id: OrderId, user_id: UserId, total: Decimal },
    Shipped { order_id: OrderId },
    Delivered { order_id: OrderId },
}

impl DomainEvent {
    /// Message subject suffix, e.g. `orders.confirmed`.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::Created { .. }) => "products.created",
            Self::Product(ProductEvent::Reviewed { .. }) => "products.reviewed",
            Self::Order(OrderEvent::Confirmed { .. }) => "orders.confirmed",
            Self::Order(OrderEvent::Shipped { .. }) => "orders.shipped",
            Self::Order(OrderEvent::Delivered { .. }) => "orders.delivered",
        }
    }
}
