use std::sync::Arc;

use async_trait::async_trait;
use nextbuy_commerce::bus::{BusError, EventPublisher};
use nextbuy_commerce::domain::aggregates::{OrderStatus, Product};
use nextbuy_commerce::domain::events::{DomainEvent, OrderEvent};
use nextbuy_commerce::domain::value_objects::{DiscountRate, Money, UserId};
use nextbuy_commerce::mail::LogMailer;
use nextbuy_commerce::payments::{self, GatewayOrder, MockPaymentGateway};
use nextbuy_commerce::pricing::PricingEngine;
use nextbuy_commerce::service::{CartService, CheckoutService, PaymentConfirmation, ProfileService};
use nextbuy_commerce::store::{CartStore, MemoryStore};
use nextbuy_commerce::CommerceError;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use testresult::TestResult;

const SECRET: &str = "whsec_test";

#[derive(Default)]
struct Recorder(Mutex<Vec<DomainEvent>>);

#[async_trait]
impl EventPublisher for Recorder {
    async fn publish(&self, event: &DomainEvent) -> Result<(), BusError> {
        self.0.lock().push(event.clone());
        Ok(())
    }
}

fn gateway() -> MockPaymentGateway {
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_key_id().return_const("rzp_test_key".to_string());
    gateway
        .expect_create_order()
        .returning(|amount, currency, receipt| Ok(GatewayOrder { id: "order_Nx1".into(), amount, currency: currency.into(), receipt: Some(receipt.into()) }));
    gateway
        .expect_verify_signature()
        .returning(|order_id, payment_id, sig| payments::verify(SECRET, order_id, payment_id, sig));
    gateway
}

#[tokio::test]
async fn cart_to_order_to_profile() -> TestResult {
    let shoes = Product::create("Running Shoes", Money::inr(Decimal::new(349999, 2)), "footwear")?;
    let socks = Product::create("Socks", Money::inr(Decimal::new(19900, 2)), "footwear")?;
    let (shoes_id, socks_id) = (shoes.id(), socks.id());
    let store = Arc::new(MemoryStore::with_products([shoes, socks]));
    let events = Arc::new(Recorder::default());
    let carts = CartService::new(store.clone(), store.clone(), PricingEngine::new(DiscountRate::from_percent(25)?, "INR"));
    let checkout = CheckoutService::new(carts.clone(), store.clone(), Arc::new(gateway()), Arc::new(LogMailer), events.clone());
    let profile = ProfileService::new(store.clone(), store.clone(), "INR");
    let user = UserId::new();

    carts.add(user, shoes_id).await?;
    carts.add(user, socks_id).await?;
    carts.add(user, socks_id).await?;

    let session = checkout.begin(user).await?;
    // (3499.99 + 2 * 199.00) * 0.75 = 2923.4925
    assert_eq!(session.amount, 292_349);
    assert_eq!(session.currency, "INR");
    assert_eq!(session.key_id, "rzp_test_key");

    let sig = payments::signature(SECRET, &session.gateway_order_id, "pay_Q7")?;
    let order = checkout
        .confirm(user, PaymentConfirmation { gateway_order_id: session.gateway_order_id.clone(), payment_id: "pay_Q7".into(), signature: sig, email: None })
        .await?;

    assert_eq!(order.status(), OrderStatus::Confirmed);
    assert_eq!(order.items().len(), 2);
    assert_eq!(order.total().rounded().amount(), Decimal::new(292349, 2));
    assert!(carts.get(user).await?.priced.is_empty());
    assert!(events.0.lock().iter().any(|e| matches!(e, DomainEvent::Order(OrderEvent::Confirmed { order_id, .. }) if *order_id == order.id())));

    let activities = profile.activities(user).await?;
    assert_eq!(activities.total_orders, 1);
    assert_eq!(activities.total_spent.rounded().amount(), Decimal::new(292349, 2));
    assert_eq!(activities.order_history[0].id(), order.id());

    Ok(())
}

#[tokio::test]
async fn order_keeps_prices_from_checkout_time() -> TestResult {
    let lamp = Product::create("Lamp", Money::inr(Decimal::new(1000, 0)), "home")?;
    let lamp_id = lamp.id();
    let store = Arc::new(MemoryStore::with_products([lamp]));
    let carts = CartService::new(store.clone(), store.clone(), PricingEngine::new(DiscountRate::NONE, "INR"));
    let checkout = CheckoutService::new(carts.clone(), store.clone(), Arc::new(gateway()), Arc::new(LogMailer), Arc::new(Recorder::default()));
    let user = UserId::new();
    carts.add(user, lamp_id).await?;

    let session = checkout.begin(user).await?;
    let sig = payments::signature(SECRET, &session.gateway_order_id, "pay_1")?;
    let order = checkout
        .confirm(user, PaymentConfirmation { gateway_order_id: session.gateway_order_id, payment_id: "pay_1".into(), signature: sig, email: None })
        .await?;
    let shipped = checkout.advance_order(order.id()).await?;

    assert_eq!(shipped.status(), OrderStatus::Shipped);
    assert_eq!(shipped.items(), order.items());
    assert_eq!(shipped.total(), order.total());

    Ok(())
}

#[tokio::test]
async fn confirm_refuses_cart_that_outgrew_the_payment() -> TestResult {
    let headphones = Product::create("Headphones", Money::inr(Decimal::new(2000, 0)), "audio")?;
    let id = headphones.id();
    let store = Arc::new(MemoryStore::with_products([headphones]));
    let carts = CartService::new(store.clone(), store.clone(), PricingEngine::new(DiscountRate::from_percent(25)?, "INR"));
    let checkout = CheckoutService::new(carts.clone(), store.clone(), Arc::new(gateway()), Arc::new(LogMailer), Arc::new(Recorder::default()));
    let user = UserId::new();
    carts.add(user, id).await?;

    let session = checkout.begin(user).await?;
    for _ in 0..9 {
        carts.add(user, id).await?;
    }
    let sig = payments::signature(SECRET, &session.gateway_order_id, "pay_9")?;
    let result = checkout
        .confirm(user, PaymentConfirmation { gateway_order_id: session.gateway_order_id.clone(), payment_id: "pay_9".into(), signature: sig, email: None })
        .await;

    assert_eq!(session.amount, 150_000);
    assert!(matches!(result, Err(CommerceError::Conflict(_))), "got {result:?}");
    assert!(checkout.orders(user).await?.is_empty());
    assert_eq!(store.load_cart(user).await?.and_then(|c| c.quantity_of(id)).map(|q| q.value()), Some(10));

    Ok(())
}
