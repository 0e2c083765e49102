//! Stock classification for alerting views

use serde::Serialize;
use std::fmt;

/// Below this many units a variant counts as low stock.
pub const LOW_STOCK_THRESHOLD: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel { OutOfStock, LowStock, InStock }

impl StockLevel {
    pub fn classify(stock: u32) -> Self {
        match stock {
            0 => Self::OutOfStock,
            s if s < LOW_STOCK_THRESHOLD => Self::LowStock,
            _ => Self::InStock,
        }
    }

    pub fn needs_alert(self) -> bool { self != Self::InStock }

    pub fn label(self) -> &'static str {
        match self {
            Self::OutOfStock => "out of stock",
            Self::LowStock => "low stock",
            Self::InStock => "in stock",
        }
    }
}

impl fmt::Display for StockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}
