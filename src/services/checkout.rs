//! Checkout: turns a cart into a pending order

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

use crate::domain::aggregates::{Address, CartError, CartLedger, Order, OrderError, PaymentMethod, ShippingPolicy};
use crate::domain::value_objects::MoneyError;
use crate::services::{EventPublisher, StockError, StockLedger, StockLine};
use crate::store::{self, DocumentStore, StoreError, ORDERS};

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    pub shipping_address: Option<Address>,
    pub payment_method: PaymentMethod,
}

pub struct CheckoutService {
    store: Arc<dyn DocumentStore>,
    stock: Arc<StockLedger>,
    publisher: Arc<dyn EventPublisher>,
    shipping: ShippingPolicy,
}

impl std::fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService").field("shipping", &self.shipping).finish_non_exhaustive()
    }
}

impl CheckoutService {
    pub fn new(store: Arc<dyn DocumentStore>, stock: Arc<StockLedger>, publisher: Arc<dyn EventPublisher>, shipping: ShippingPolicy) -> Self {
        Self { store, stock, publisher, shipping }
    }

    pub fn shipping(&self) -> &ShippingPolicy { &self.shipping }

    /// Validates, reserves stock, persists the order and clears the cart.
    ///
    /// Checks run in order: address selected, address valid, cart not empty,
    /// then every line against live variant state. Nothing is written
    /// unless all of them pass.
    pub async fn place_order(&self, cart: &mut CartLedger, request: CheckoutRequest) -> Result<Order, CheckoutError> {
        let address = request.shipping_address.as_ref().ok_or(CheckoutError::MissingAddress)?;
        address.validate().map_err(|e| CheckoutError::InvalidAddress(e.to_string()))?;
        if cart.is_empty() { return Err(CheckoutError::EmptyCart); }
        request.validate().map_err(|e| CheckoutError::InvalidRequest(e.to_string()))?;

        let subtotal = cart.total();
        let shipping_fee = self.shipping.fee_for(&subtotal)?;
        let lines: Vec<StockLine> = cart
            .items()
            .iter()
            .map(|i| StockLine { variant_id: i.variant_id.clone(), quantity: i.quantity })
            .collect();

        let reservation = self.stock.reserve(&lines).await?;

        let placed = Order::place(&request.user_id, cart.items().to_vec(), address.clone(), request.payment_method, shipping_fee);
        let mut order = match placed {
            Ok(order) => order,
            Err(e) => {
                self.undo(&reservation).await;
                return Err(e.into());
            }
        };
        if let Err(e) = store::save(self.store.as_ref(), ORDERS, order.id().as_str(), &order).await {
            tracing::error!(error = %e, "could not persist order, returning reserved stock");
            self.undo(&reservation).await;
            return Err(e.into());
        }

        tracing::info!(order = %order.id(), user = %order.user_id(), total = %order.total(), lines = order.items().len(), "order placed");
        if let Err(e) = cart.clear().await {
            tracing::error!(order = %order.id(), slot = %cart.slot(), error = %e, "order placed but cart slot still holds its lines");
        }
        self.publisher.publish(order.take_events()).await;
        Ok(order)
    }

    async fn undo(&self, reservation: &crate::services::Reservation) {
        if let Err(e) = self.stock.release(reservation).await {
            tracing::error!(error = %e, "could not return reserved stock");
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Select a delivery address")]
    MissingAddress,
    #[error("Delivery address is incomplete: {0}")]
    InvalidAddress(String),
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Invalid checkout request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Stock(StockError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error("Could not place the order, please try again")]
    Store(#[source] StoreError),
}

impl From<StockError> for CheckoutError {
    fn from(e: StockError) -> Self {
        match e {
            StockError::Store(e) => Self::Store(e),
            other => Self::Stock(other),
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(e: StoreError) -> Self { Self::Store(e) }
}
