//! Application services over the document store
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod publisher;
pub mod stock;

pub use catalog::{CatalogService, NewVariant};
pub use checkout::{CheckoutError, CheckoutRequest, CheckoutService};
pub use orders::OrderService;
pub use publisher::{EventPublisher, NatsPublisher};
pub use stock::{Reservation, StockAlert, StockError, StockLedger, StockLine};
