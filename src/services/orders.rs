//! Order lifecycle operations against the store

use std::sync::Arc;

use crate::domain::aggregates::{Order, OrderError, OrderStatus, PaymentStatus};
use crate::services::EventPublisher;
use crate::store::{self, DocumentStore, Filter, ORDERS};
use crate::{Result, StorefrontError};

/// Loads an order, applies one transition and writes back only the mutable
/// fields. Concurrent admin edits are last-write-wins.
pub struct OrderService {
    store: Arc<dyn DocumentStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.debug_struct("OrderService").finish_non_exhaustive() }
}

impl OrderService {
    pub fn new(store: Arc<dyn DocumentStore>, publisher: Arc<dyn EventPublisher>) -> Self { Self { store, publisher } }

    pub async fn get(&self, order_id: &str) -> Result<Order> {
        store::fetch(self.store.as_ref(), ORDERS, order_id)
            .await?
            .ok_or_else(|| StorefrontError::OrderNotFound(order_id.to_string()))
    }

    /// A customer's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = store::fetch_all(self.store.as_ref(), ORDERS, &[Filter::eq("userId", user_id)]).await?;
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(orders)
    }

    pub async fn cancel(&self, order_id: &str, user_id: &str) -> Result<Order> {
        self.apply(order_id, |o| o.cancel_by_customer(user_id).map(|()| true)).await
    }

    pub async fn confirm(&self, order_id: &str) -> Result<Order> {
        self.apply(order_id, |o| o.confirm().map(|()| true)).await
    }

    pub async fn ship(&self, order_id: &str, tracking_number: &str) -> Result<Order> {
        self.apply(order_id, |o| o.ship(tracking_number).map(|()| true)).await
    }

    pub async fn deliver(&self, order_id: &str) -> Result<Order> {
        self.apply(order_id, |o| o.deliver().map(|()| true)).await
    }

    pub async fn set_status(&self, order_id: &str, status: OrderStatus) -> Result<Order> {
        self.apply(order_id, |o| o.admin_set_status(status)).await
    }

    pub async fn correct_status(&self, order_id: &str, status: OrderStatus, reason: &str) -> Result<Order> {
        self.apply(order_id, |o| o.correct_status(status, reason)).await
    }

    pub async fn set_payment_status(&self, order_id: &str, status: PaymentStatus) -> Result<Order> {
        self.apply(order_id, |o| Ok(o.set_payment_status(status))).await
    }

    async fn apply<F>(&self, order_id: &str, transition: F) -> Result<Order>
    where
        F: FnOnce(&mut Order) -> std::result::Result<bool, OrderError>,
    {
        let mut order = self.get(order_id).await?;
        let from = order.status();
        if !transition(&mut order)? {
            tracing::debug!(order = order_id, status = %from, "transition left order unchanged");
            return Ok(order);
        }
        self.store.update(ORDERS, order_id, order.mutable_fields()).await?;
        tracing::info!(order = order_id, %from, to = %order.status(), payment = %order.payment_status(), "order updated");
        self.publisher.publish(order.take_events()).await;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Address, Attributes, CartItem, NewProduct, PaymentMethod, Product, ProductVariant};
    use crate::domain::value_objects::{Money, Sku};
    use crate::services::publisher::testing::RecordingPublisher;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    async fn seeded() -> std::result::Result<(OrderService, Arc<MemoryStore>, Arc<RecordingPublisher>, Order), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let product = Product::create(NewProduct { name: "Sunscreen".into(), brand: "B".into(), ..NewProduct::default() })?;
        let variant = ProductVariant::new(product.id(), Sku::new("B-VAR-001")?, Attributes::new().with("Size", "50ml"), Money::npr(Decimal::from(800))).with_stock(4);
        let address = Address::new("Hari", "9811111111", "New Road", "Pokhara", "Gandaki");
        let order = Order::place("user-1", vec![CartItem::new(&product, &variant, 1)], address, PaymentMethod::Esewa, Money::npr(Decimal::from(100)))?;
        store::save(store.as_ref(), ORDERS, order.id().as_str(), &order).await?;
        Ok((OrderService::new(store.clone(), publisher.clone()), store, publisher, order))
    }

    #[tokio::test]
    async fn admin_path_persists_each_step() -> TestResult {
        let (orders, _, publisher, placed) = seeded().await?;
        let id = placed.id().as_str();
        orders.confirm(id).await?;
        orders.set_status(id, OrderStatus::Processing).await?;
        orders.ship(id, "NCM-123").await?;
        orders.deliver(id).await?;
        orders.set_payment_status(id, PaymentStatus::Paid).await?;

        let stored = orders.get(id).await?;
        assert_eq!(stored.status(), OrderStatus::Delivered);
        assert_eq!(stored.payment_status(), PaymentStatus::Paid);
        assert_eq!(stored.tracking_number(), Some("NCM-123"));
        assert_eq!(stored.items(), placed.items());
        assert_eq!(stored.total(), placed.total());
        assert!(publisher.subjects().contains(&"storefront.order.shipped".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn customer_cancel_rules_hold_through_the_store() -> TestResult {
        let (orders, _, _, placed) = seeded().await?;
        let id = placed.id().as_str();
        orders.confirm(id).await?;
        orders.ship(id, "NCM-1").await?;
        let err = orders.cancel(id, "user-1").await;
        assert!(matches!(err, Err(StorefrontError::Order(OrderError::CannotCancel(OrderStatus::Shipped)))));
        assert_eq!(orders.get(id).await?.status(), OrderStatus::Shipped);
        Ok(())
    }

    #[tokio::test]
    async fn customer_can_cancel_pending_order() -> TestResult {
        let (orders, _, _, placed) = seeded().await?;
        let cancelled = orders.cancel(placed.id().as_str(), "user-1").await?;
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(orders.get(placed.id().as_str()).await?.status(), OrderStatus::Cancelled);
        Ok(())
    }

    #[tokio::test]
    async fn backward_move_requires_correction() -> TestResult {
        let (orders, _, publisher, placed) = seeded().await?;
        let id = placed.id().as_str();
        orders.set_status(id, OrderStatus::Shipped).await?;
        assert!(matches!(orders.set_status(id, OrderStatus::Pending).await, Err(StorefrontError::Order(OrderError::BackwardTransition { .. }))));
        let corrected = orders.correct_status(id, OrderStatus::Pending, "wrong parcel").await?;
        assert_eq!(corrected.status(), OrderStatus::Pending);
        assert!(publisher.subjects().contains(&"storefront.order.status_corrected".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn repeated_status_is_a_no_op() -> TestResult {
        let (orders, _, publisher, placed) = seeded().await?;
        let id = placed.id().as_str();
        orders.set_status(id, OrderStatus::Pending).await?;
        assert!(publisher.events().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn lookups() -> TestResult {
        let (orders, _, _, placed) = seeded().await?;
        assert!(matches!(orders.get("ORD-missing").await, Err(StorefrontError::OrderNotFound(_))));
        assert_eq!(orders.list_for_user("user-1").await?.len(), 1);
        assert!(orders.list_for_user("user-2").await?.is_empty());
        assert_eq!(orders.get(placed.id().as_str()).await?.payment_method(), PaymentMethod::Esewa);
        Ok(())
    }
}
