//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::{OrderStatus, PaymentStatus};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "lowercase")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    Stock(StockEvent),
}

impl DomainEvent {
    /// Message subject, `storefront.<aggregate>.<event>`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Product(e) => ("product", e.name()),
            Self::Order(e) => ("order", e.name()),
            Self::Stock(e) => ("stock", e.name()),
        };
        format!("storefront.{aggregate}.{name}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ProductEvent {
    Created { product_id: String, name: String },
    Published { product_id: String },
    VariantAdded { product_id: String, variant_id: String, sku: String },
    RatingRecomputed { product_id: String, rating: f64, review_count: u32 },
    Deleted { product_id: String, variants_removed: usize },
}

impl ProductEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Published { .. } => "published",
            Self::VariantAdded { .. } => "variant_added",
            Self::RatingRecomputed { .. } => "rating_recomputed",
            Self::Deleted { .. } => "deleted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OrderEvent {
    Placed { order_id: String, user_id: String, total: Decimal },
    StatusChanged { order_id: String, from: OrderStatus, to: OrderStatus },
    /// Backward move or reopening of a terminal order by an admin.
    StatusCorrected { order_id: String, from: OrderStatus, to: OrderStatus, reason: String },
    Shipped { order_id: String, tracking: String },
    Cancelled { order_id: String, by_customer: bool },
    PaymentStatusChanged { order_id: String, from: PaymentStatus, to: PaymentStatus },
}

impl OrderEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::StatusChanged { .. } => "status_changed",
            Self::StatusCorrected { .. } => "status_corrected",
            Self::Shipped { .. } => "shipped",
            Self::Cancelled { .. } => "cancelled",
            Self::PaymentStatusChanged { .. } => "payment_status_changed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StockEvent {
    /// Absolute overwrite from the admin console.
    Adjusted { variant_id: String, from: u32, to: u32 },
    Reserved { variant_id: String, quantity: u32, remaining: u32 },
    Released { variant_id: String, quantity: u32 },
}

impl StockEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Adjusted { .. } => "adjusted",
            Self::Reserved { .. } => "reserved",
            Self::Released { .. } => "released",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_name_aggregate_and_event() {
        let e = DomainEvent::Order(OrderEvent::Cancelled { order_id: "ORD-1".into(), by_customer: true });
        assert_eq!(e.subject(), "storefront.order.cancelled");
        let e = DomainEvent::Stock(StockEvent::Adjusted { variant_id: "VAR-1".into(), from: 1, to: 0 });
        assert_eq!(e.subject(), "storefront.stock.adjusted");
    }

    #[test]
    fn events_serialize_with_tags() -> Result<(), serde_json::Error> {
        let e = DomainEvent::Order(OrderEvent::StatusChanged {
            order_id: "ORD-1".into(), from: OrderStatus::Pending, to: OrderStatus::Confirmed,
        });
        let json = serde_json::to_value(&e)?;
        assert_eq!(json["aggregate"], "order");
        assert_eq!(json["event"]["type"], "statusChanged");
        assert_eq!(json["event"]["orderId"], "ORD-1");
        assert_eq!(json["event"]["to"], "confirmed");
        Ok(())
    }
}
