//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::aggregates::{Address, CartItem};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, MoneyError, OrderId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled,
    ];

    pub fn is_terminal(self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Customers may cancel only before processing starts.
    pub fn customer_can_cancel(self) -> bool { matches!(self, Self::Pending | Self::Confirmed) }

    fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }

    /// Forward along the fulfillment path, or into `cancelled` from a live state.
    pub fn is_forward_to(self, to: OrderStatus) -> bool {
        if self.is_terminal() || self == to { return false; }
        match (self.rank(), to.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed }

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Self::Pending => "pending", Self::Paid => "paid", Self::Failed => "failed" })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { Cod, Esewa, Khalti, Fonepay }

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    user_id: String,
    items: Vec<CartItem>,
    subtotal: Money,
    shipping_fee: Money,
    total: Money,
    shipping_address: Address,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    status: OrderStatus,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Order {
    /// Freezes cart lines into a new pending order.
    pub fn place(
        user_id: impl Into<String>,
        items: Vec<CartItem>,
        shipping_address: Address,
        payment_method: PaymentMethod,
        shipping_fee: Money,
    ) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        let subtotal = items.iter().try_fold(Money::zero(shipping_fee.currency()), |acc, i| acc.add(&i.line_total()))?;
        let total = subtotal.add(&shipping_fee)?;
        let now = Utc::now();
        let mut order = Self {
            id: OrderId::generate(), user_id: user_id.into(), items, subtotal, shipping_fee, total,
            shipping_address, payment_method, payment_status: PaymentStatus::Pending,
            status: OrderStatus::Pending, tracking_number: None, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id.to_string(), user_id: order.user_id.clone(), total: order.total.amount(),
        }));
        Ok(order)
    }

    pub fn id(&self) -> &OrderId { &self.id }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn shipping_fee(&self) -> &Money { &self.shipping_fee }
    pub fn total(&self) -> &Money { &self.total }
    pub fn shipping_address(&self) -> &Address { &self.shipping_address }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn tracking_number(&self) -> Option<&str> { self.tracking_number.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Customer cancellation, allowed from `pending` or `confirmed` only.
    pub fn cancel_by_customer(&mut self, user_id: &str) -> Result<(), OrderError> {
        if self.user_id != user_id { return Err(OrderError::NotOwner); }
        if !self.status.customer_can_cancel() { return Err(OrderError::CannotCancel(self.status)); }
        self.status = OrderStatus::Cancelled;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id.to_string(), by_customer: true }));
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.require(&[OrderStatus::Pending], "confirm")?;
        self.move_to(OrderStatus::Confirmed);
        Ok(())
    }

    /// Attaches the tracking number and marks the order shipped.
    pub fn ship(&mut self, tracking_number: &str) -> Result<(), OrderError> {
        self.require(&[OrderStatus::Confirmed, OrderStatus::Processing], "ship")?;
        let tracking = tracking_number.trim();
        if tracking.is_empty() { return Err(OrderError::MissingTrackingNumber); }
        self.tracking_number = Some(tracking.to_string());
        self.move_to(OrderStatus::Shipped);
        self.raise_event(DomainEvent::Order(OrderEvent::Shipped { order_id: self.id.to_string(), tracking: tracking.to_string() }));
        Ok(())
    }

    pub fn deliver(&mut self) -> Result<(), OrderError> {
        self.require(&[OrderStatus::Shipped], "deliver")?;
        self.move_to(OrderStatus::Delivered);
        Ok(())
    }

    /// Admin status selection. Forward moves apply, setting the current
    /// status is a no-op, and anything else must go through
    /// [`Order::correct_status`]. Returns whether the status changed.
    pub fn admin_set_status(&mut self, to: OrderStatus) -> Result<bool, OrderError> {
        if to == self.status { return Ok(false); }
        if !self.status.is_forward_to(to) {
            return Err(OrderError::BackwardTransition { from: self.status, to });
        }
        if to == OrderStatus::Cancelled {
            self.status = to;
            self.touch();
            self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id.to_string(), by_customer: false }));
        } else {
            self.move_to(to);
        }
        Ok(true)
    }

    /// Explicit admin correction: any target, including backward moves and
    /// reopening terminal orders.
    pub fn correct_status(&mut self, to: OrderStatus, reason: &str) -> Result<bool, OrderError> {
        if to == self.status { return Ok(false); }
        let reason = reason.trim();
        if reason.is_empty() { return Err(OrderError::MissingReason); }
        let from = self.status;
        tracing::warn!(order = %self.id, %from, %to, reason, "order status corrected");
        self.status = to;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusCorrected {
            order_id: self.id.to_string(), from, to, reason: reason.to_string(),
        }));
        Ok(true)
    }

    /// Payment status moves independently of fulfillment.
    pub fn set_payment_status(&mut self, to: PaymentStatus) -> bool {
        if to == self.payment_status { return false; }
        let from = self.payment_status;
        self.payment_status = to;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentStatusChanged { order_id: self.id.to_string(), from, to }));
        true
    }

    /// Fields a lifecycle transition may change, as a partial document.
    pub fn mutable_fields(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "paymentStatus": self.payment_status,
            "trackingNumber": self.tracking_number,
            "updatedAt": self.updated_at,
        })
    }

    fn require(&self, allowed: &[OrderStatus], action: &'static str) -> Result<(), OrderError> {
        if allowed.contains(&self.status) { return Ok(()); }
        Err(OrderError::InvalidTransition { action, from: self.status })
    }

    fn move_to(&mut self, to: OrderStatus) {
        let from = self.status;
        self.status = to;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id.to_string(), from, to }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("No items")]
    NoItems,
    #[error("Cannot cancel an order that is {0}")]
    CannotCancel(OrderStatus),
    #[error("Order belongs to another customer")]
    NotOwner,
    #[error("Cannot {action} an order that is {from}")]
    InvalidTransition { action: &'static str, from: OrderStatus },
    #[error("Moving an order from {from} to {to} is a correction, not progress")]
    BackwardTransition { from: OrderStatus, to: OrderStatus },
    #[error("A tracking number is required to ship")]
    MissingTrackingNumber,
    #[error("A reason is required to correct an order status")]
    MissingReason,
    #[error(transparent)]
    Money(#[from] MoneyError),
}
