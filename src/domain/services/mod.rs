//! Domain services that work across aggregates without touching storage
pub mod stock_level;
pub mod variant_resolver;

pub use stock_level::{StockLevel, LOW_STOCK_THRESHOLD};
pub use variant_resolver::{AttributeGroup, AttributeOption, Resolution, ResolveError, VariantResolver};
