//! GlowCart storefront core
//!
//! Variant-aware catalog, cart, checkout and order lifecycle for a skincare
//! store.
//!
//! ## Features
//! - Variant resolution over attribute selections
//! - Persistent cart ledger
//! - Checkout with oversell protection
//! - Order lifecycle with admin corrections
//! - Stock level classification and alerts

pub mod api;
pub mod config;
pub mod domain;
pub mod services;
pub mod store;

use thiserror::Error;

use crate::domain::aggregates::{CartError, OrderError, ProductError};
use crate::domain::services::ResolveError;
use crate::domain::value_objects::SkuError;
use crate::services::{CheckoutError, StockError};
use crate::store::StoreError;

pub use crate::config::Config;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Product {0} not found")]
    ProductNotFound(String),

    #[error("Order {0} not found")]
    OrderNotFound(String),

    #[error("Variant {0} not found")]
    VariantNotFound(String),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Stock(StockError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Validation(String),
}

impl StorefrontError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Checkout(CheckoutError::Store(e)) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<StockError> for StorefrontError {
    fn from(e: StockError) -> Self {
        match e {
            StockError::Store(e) => Self::Store(e),
            StockError::VariantMissing(id) => Self::VariantNotFound(id.to_string()),
            other => Self::Stock(other),
        }
    }
}

impl From<SkuError> for StorefrontError {
    fn from(e: SkuError) -> Self { Self::Validation(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
