use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::bus::{publish_all, EventPublisher};
use crate::domain::aggregates::{Order, PaymentRef, PendingPayment};
use crate::domain::value_objects::{Money, OrderId, UserId};
use crate::mail::{order_confirmation_html, order_confirmation_subject, Mailer};
use crate::payments::PaymentGateway;
use crate::service::CartService;
use crate::store::OrderStore;
use crate::{CommerceError, Result};

/// What the client needs to open the gateway's payment widget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub gateway_order_id: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub gateway_order_id: String,
    pub payment_id: String,
    pub signature: String,
    /// Receipt address; no email is sent without one.
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct CheckoutService {
    carts: CartService,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    events: Arc<dyn EventPublisher>,
}

impl CheckoutService {
    pub fn new(
        carts: CartService,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { carts, orders, gateway, mailer, events }
    }

    /// Prices the cart and opens a gateway order for its total. The opened
    /// amount is remembered so `confirm` can check the cart still matches it.
    #[tracing::instrument(skip(self), fields(%user))]
    pub async fn begin(&self, user: UserId) -> Result<CheckoutSession> {
        let priced = self.carts.priced(user).await?;
        let amount = priced.subtotal.to_minor_units()?;
        let currency = priced.subtotal.currency().to_string();
        let receipt = format!("rcpt_{}", user.into_uuid().simple());

        let order = self.gateway.create_order(amount, &currency, &receipt).await?;
        let pending = PendingPayment {
            gateway_order_id: order.id.clone(),
            user_id: user,
            amount: order.amount,
            currency: order.currency.clone(),
            created_at: Utc::now(),
        };
        self.orders.insert_pending_payment(&pending).await?;
        tracing::info!(gateway_order_id = %order.id, amount, "checkout started");
        Ok(CheckoutSession { gateway_order_id: order.id, amount: order.amount, currency: order.currency, key_id: self.gateway.key_id() })
    }

    /// Records a paid order and empties the cart. Nothing is written when the
    /// signature does not verify, the gateway order belongs to someone else,
    /// or the cart no longer totals what was charged.
    #[tracing::instrument(skip(self, payment), fields(%user, gateway_order_id = %payment.gateway_order_id))]
    pub async fn confirm(&self, user: UserId, payment: PaymentConfirmation) -> Result<Order> {
        if !self.gateway.verify_signature(&payment.gateway_order_id, &payment.payment_id, &payment.signature) {
            tracing::warn!("payment signature mismatch");
            return Err(CommerceError::Validation("payment signature does not match".into()));
        }

        let pending = self.orders.pending_payment(&payment.gateway_order_id).await?;
        if pending.user_id != user {
            tracing::warn!(owner = %pending.user_id, "payment order opened by another user");
            return Err(CommerceError::NotFound(format!("payment order {}", payment.gateway_order_id)));
        }

        let priced = self.carts.priced(user).await?;
        if !pending.covers(&priced.subtotal)? {
            tracing::warn!(paid = pending.amount, cart = %priced.subtotal.rounded(), "cart changed after checkout started");
            let charged = Money::from_minor_units(pending.amount, &pending.currency);
            return Err(CommerceError::Conflict(format!(
                "cart total {} differs from {charged} charged for payment order {}",
                priced.subtotal, pending.gateway_order_id
            )));
        }
        let payment_ref = PaymentRef { gateway_order_id: payment.gateway_order_id, payment_id: payment.payment_id };
        let mut order = Order::from_priced_cart(user, &priced, payment_ref)?;

        self.orders.insert_order(&order).await?;
        self.carts.clear(user).await?;
        tracing::info!(order_id = %order.id(), total = %order.total().rounded(), "order confirmed");

        publish_all(self.events.as_ref(), order.take_events()).await;
        if let Some(to) = payment.email.as_deref() {
            if let Err(error) = self.mailer.send(to, &order_confirmation_subject(&order), &order_confirmation_html(&order)).await {
                tracing::warn!(%error, order_id = %order.id(), "confirmation email not sent");
            }
        }
        Ok(order)
    }

    /// Moves an order one status forward.
    #[tracing::instrument(skip(self), fields(%order_id))]
    pub async fn advance_order(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self.orders.get_order(order_id).await?;
        let from = order.status();
        let to = order.advance()?;
        self.orders.update_status(order_id, from, &order).await?;
        tracing::info!(%from, %to, "order advanced");
        publish_all(self.events.as_ref(), order.take_events()).await;
        Ok(order)
    }

    /// One of the user's orders. Other users' orders are reported missing.
    pub async fn get_order(&self, user: UserId, order_id: OrderId) -> Result<Order> {
        let order = self.orders.get_order(order_id).await?;
        if order.user_id() != user {
            return Err(CommerceError::NotFound(format!("order {order_id}")));
        }
        Ok(order)
    }

    pub async fn orders(&self, user: UserId) -> Result<Vec<Order>> {
        self.orders.orders_for_user(user).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;
    use crate::bus::LogPublisher;
    use crate::domain::aggregates::{OrderStatus, Product};
    use crate::domain::value_objects::{DiscountRate, Money, ProductId};
    use crate::mail::{LogMailer, MailError, MockMailer};
    use crate::payments::{GatewayOrder, MockPaymentGateway};
    use crate::pricing::PricingEngine;
    use crate::store::{CartStore, MemoryStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        carts: CartService,
        product: ProductId,
    }

    fn fixture() -> Fixture {
        let product = Product::create("Headphones", Money::inr(Decimal::new(2000, 0)), "audio").unwrap();
        let id = product.id();
        let store = Arc::new(MemoryStore::with_products([product]));
        let engine = PricingEngine::new(DiscountRate::from_percent(25).unwrap(), "INR");
        Fixture { carts: CartService::new(store.clone(), store.clone(), engine), store, product: id }
    }

    fn accepting_gateway() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_order()
            .returning(|amount, currency, _| Ok(GatewayOrder { id: "order_1".into(), amount, currency: currency.into(), receipt: None }));
        gateway.expect_key_id().return_const("rzp_test".to_string());
        gateway.expect_verify_signature().returning(|_, _, _| true);
        gateway
    }

    fn service(f: &Fixture, gateway: MockPaymentGateway, mailer: Arc<dyn Mailer>) -> CheckoutService {
        CheckoutService::new(f.carts.clone(), f.store.clone(), Arc::new(gateway), mailer, Arc::new(LogPublisher))
    }

    fn confirmation(email: Option<&str>) -> PaymentConfirmation {
        PaymentConfirmation {
            gateway_order_id: "order_1".into(),
            payment_id: "pay_1".into(),
            signature: "sig".into(),
            email: email.map(str::to_string),
        }
    }

    async fn pay(checkout: &CheckoutService, user: UserId, email: Option<&str>) -> Result<Order> {
        checkout.begin(user).await?;
        checkout.confirm(user, confirmation(email)).await
    }

    #[tokio::test]
    async fn begin_charges_discounted_total() -> TestResult {
        let f = fixture();
        let user = UserId::new();
        f.carts.add(user, f.product).await?;
        f.carts.add(user, f.product).await?;
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_order()
            .withf(|amount, currency, _| *amount == 300_000 && currency == "INR")
            .returning(|amount, currency, _| Ok(GatewayOrder { id: "order_1".into(), amount, currency: currency.into(), receipt: None }));
        gateway.expect_key_id().return_const("rzp_test".to_string());

        let session = service(&f, gateway, Arc::new(LogMailer)).begin(user).await?;

        assert_eq!(session.amount, 300_000);
        assert_eq!(session.gateway_order_id, "order_1");
        assert_eq!(session.key_id, "rzp_test");
        let pending = f.store.pending_payment("order_1").await?;
        assert_eq!((pending.user_id, pending.amount), (user, 300_000));

        Ok(())
    }

    #[tokio::test]
    async fn begin_with_empty_cart_is_invalid() {
        let f = fixture();

        let result = service(&f, MockPaymentGateway::new(), Arc::new(LogMailer)).begin(UserId::new()).await;

        assert!(matches!(result, Err(CommerceError::InvalidState(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn confirm_snapshots_order_and_clears_cart() -> TestResult {
        let f = fixture();
        let user = UserId::new();
        f.carts.add(user, f.product).await?;
        let checkout = service(&f, accepting_gateway(), Arc::new(LogMailer));

        let order = pay(&checkout, user, None).await?;

        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.total().amount(), Decimal::new(1500, 0));
        assert_eq!(order.items()[0].title, "Headphones");
        assert!(f.store.load_cart(user).await?.is_some_and(|c| c.is_empty()));
        assert_eq!(checkout.orders(user).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn bad_signature_writes_nothing() -> TestResult {
        let f = fixture();
        let user = UserId::new();
        f.carts.add(user, f.product).await?;
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_verify_signature().returning(|_, _, _| false);
        let checkout = service(&f, gateway, Arc::new(LogMailer));

        let result = checkout.confirm(user, confirmation(None)).await;

        assert!(matches!(result, Err(CommerceError::Validation(_))), "got {result:?}");
        assert!(checkout.orders(user).await?.is_empty());
        assert_eq!(f.store.load_cart(user).await?.map(|c| c.item_count()), Some(1));

        Ok(())
    }

    #[tokio::test]
    async fn cart_grown_after_begin_is_conflict() -> TestResult {
        let f = fixture();
        let user = UserId::new();
        f.carts.add(user, f.product).await?;
        let checkout = service(&f, accepting_gateway(), Arc::new(LogMailer));
        let session = checkout.begin(user).await?;
        for _ in 0..9 {
            f.carts.add(user, f.product).await?;
        }

        let result = checkout.confirm(user, confirmation(None)).await;

        assert_eq!(session.amount, 150_000);
        assert!(matches!(result, Err(CommerceError::Conflict(_))), "got {result:?}");
        assert!(checkout.orders(user).await?.is_empty());
        assert_eq!(f.store.load_cart(user).await?.and_then(|c| c.quantity_of(f.product)).map(|q| q.value()), Some(10));

        Ok(())
    }

    #[tokio::test]
    async fn payment_order_must_be_opened_by_the_same_user() -> TestResult {
        let f = fixture();
        let (owner, other) = (UserId::new(), UserId::new());
        f.carts.add(owner, f.product).await?;
        f.carts.add(other, f.product).await?;
        let checkout = service(&f, accepting_gateway(), Arc::new(LogMailer));

        let never_opened = checkout.confirm(other, confirmation(None)).await;
        checkout.begin(owner).await?;
        let foreign = checkout.confirm(other, confirmation(None)).await;

        assert!(matches!(never_opened, Err(CommerceError::NotFound(_))), "got {never_opened:?}");
        assert!(matches!(foreign, Err(CommerceError::NotFound(_))), "got {foreign:?}");
        assert!(checkout.orders(other).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn replayed_payment_is_conflict() -> TestResult {
        let f = fixture();
        let user = UserId::new();
        let checkout = service(&f, accepting_gateway(), Arc::new(LogMailer));
        f.carts.add(user, f.product).await?;
        pay(&checkout, user, None).await?;
        f.carts.add(user, f.product).await?;

        let replay = checkout.confirm(user, confirmation(None)).await;

        assert!(matches!(replay, Err(CommerceError::Conflict(_))), "got {replay:?}");
        assert_eq!(checkout.orders(user).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_checkout() -> TestResult {
        let f = fixture();
        let user = UserId::new();
        f.carts.add(user, f.product).await?;
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|to, subject, _| to == "asha@example.com" && subject.contains("confirmed"))
            .times(1)
            .returning(|_, _, _| Err(MailError::Rejected { status: 401, body: "bad key".into() }));

        let order = pay(&service(&f, accepting_gateway(), Arc::new(mailer)), user, Some("asha@example.com")).await?;

        assert_eq!(order.status(), OrderStatus::Confirmed);

        Ok(())
    }

    #[tokio::test]
    async fn advance_moves_forward_until_delivered() -> TestResult {
        let f = fixture();
        let user = UserId::new();
        f.carts.add(user, f.product).await?;
        let checkout = service(&f, accepting_gateway(), Arc::new(LogMailer));
        let id = pay(&checkout, user, None).await?.id();

        assert_eq!(checkout.advance_order(id).await?.status(), OrderStatus::Shipped);
        assert_eq!(checkout.advance_order(id).await?.status(), OrderStatus::Delivered);
        let past_end = checkout.advance_order(id).await;

        assert!(matches!(past_end, Err(CommerceError::InvalidState(_))), "got {past_end:?}");
        assert_eq!(checkout.get_order(user, id).await?.status(), OrderStatus::Delivered);

        Ok(())
    }

    #[tokio::test]
    async fn other_users_orders_are_hidden() -> TestResult {
        let f = fixture();
        let user = UserId::new();
        f.carts.add(user, f.product).await?;
        let checkout = service(&f, accepting_gateway(), Arc::new(LogMailer));
        let id = pay(&checkout, user, None).await?.id();

        let result = checkout.get_order(UserId::new(), id).await;

        assert!(matches!(result, Err(CommerceError::NotFound(_))));

        Ok(())
    }
}
