//! Cart Aggregate
//!
//! The cart belongs to one browsing session and lives in a client-local
//! slot. Lines are pinned to frozen product and variant snapshots, so the
//! cart stays displayable after the live records change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::aggregates::{Product, ProductSnapshot, ProductVariant, VariantSnapshot};
use crate::domain::value_objects::{Money, MoneyError, VariantId};
use crate::store::{CartStorage, StoreError};

/// Slot of a single-session client. Server-side sessions append `:{session}`.
pub const DEFAULT_CART_SLOT: &str = "glowcart.cart";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub variant_id: VariantId,
    pub product: ProductSnapshot,
    pub variant: VariantSnapshot,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product: &Product, variant: &ProductVariant, quantity: u32) -> Self {
        Self {
            product_id: product.id().to_string(), variant_id: variant.id().clone(),
            product: product.snapshot(), variant: variant.snapshot(), quantity,
        }
    }

    pub fn unit_price(&self) -> &Money { self.variant.price() }
    pub fn line_total(&self) -> Money { self.variant.price().multiply(self.quantity) }
}

/// Flat delivery fee, waived once the subtotal passes a threshold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub flat_fee: Money,
    pub free_threshold: Money,
}

impl ShippingPolicy {
    /// Free only when `subtotal` is strictly above the threshold.
    pub fn fee_for(&self, subtotal: &Money) -> Result<Money, MoneyError> {
        if subtotal.exceeds(&self.free_threshold)? {
            Ok(Money::zero(self.flat_fee.currency()))
        } else {
            Ok(self.flat_fee.clone())
        }
    }
}

pub struct CartLedger {
    slot: String,
    currency: String,
    items: Vec<CartItem>,
    storage: Arc<dyn CartStorage>,
}

impl std::fmt::Debug for CartLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartLedger")
            .field("slot", &self.slot)
            .field("currency", &self.currency)
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl CartLedger {
    /// Rehydrates the ledger from `slot`. A missing, unreadable or corrupt
    /// slot yields an empty cart. Invalid lines are dropped and repeated
    /// variants are merged into one line.
    pub async fn load(storage: Arc<dyn CartStorage>, slot: impl Into<String>, currency: &str) -> Self {
        let slot = slot.into();
        let currency = currency.to_uppercase();
        let stored = match storage.load(&slot).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<CartItem>>(&raw) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(slot = %slot, error = %e, "discarding unreadable cart");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(slot = %slot, error = %e, "cart storage unavailable, starting empty");
                Vec::new()
            }
        };
        let before = stored.len();
        let mut items: Vec<CartItem> = Vec::with_capacity(before);
        for item in stored.into_iter().filter(|i| i.quantity > 0 && i.variant.price().currency() == currency) {
            match items.iter_mut().find(|i| i.variant_id == item.variant_id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
                None => items.push(item),
            }
        }
        if items.len() != before {
            tracing::warn!(slot = %slot, stored = before, kept = items.len(), "normalized stored cart lines");
        }
        Self { slot, currency, items, storage }
    }

    pub fn slot(&self) -> &str { &self.slot }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn line(&self, variant_id: &VariantId) -> Option<&CartItem> { self.items.iter().find(|i| &i.variant_id == variant_id) }

    /// Adds `quantity` of `variant`, merging into an existing line for the
    /// same variant. Stock is not checked here; checkout re-validates.
    pub async fn add_item(&mut self, product: &Product, variant: &ProductVariant, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        if variant.price().currency() != self.currency {
            return Err(CartError::CurrencyMismatch { expected: self.currency.clone(), found: variant.price().currency().to_string() });
        }
        match self.items.iter_mut().find(|i| &i.variant_id == variant.id()) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(quantity),
            None => self.items.push(CartItem::new(product, variant, quantity)),
        }
        tracing::debug!(slot = %self.slot, variant = %variant.id(), quantity, "cart item added");
        self.persist().await
    }

    /// Replaces a line's quantity; zero removes the line. Unknown variants are ignored.
    pub async fn update_quantity(&mut self, variant_id: &VariantId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return self.remove_item(variant_id).await; }
        match self.items.iter_mut().find(|i| &i.variant_id == variant_id) {
            Some(item) if item.quantity != quantity => item.quantity = quantity,
            _ => return Ok(()),
        }
        self.persist().await
    }

    pub async fn remove_item(&mut self, variant_id: &VariantId) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| &i.variant_id != variant_id);
        if self.items.len() == before { return Ok(()); }
        self.persist().await
    }

    /// Empties the cart and frees its slot. When the slot can't be removed
    /// it is overwritten with an empty cart instead, so a reload never
    /// brings the old lines back.
    pub async fn clear(&mut self) -> Result<(), CartError> {
        self.items.clear();
        if let Err(e) = self.storage.remove(&self.slot).await {
            tracing::warn!(slot = %self.slot, error = %e, "could not remove cart slot, writing an empty cart");
            self.persist().await?;
        }
        Ok(())
    }

    /// Σ price × quantity over the current lines.
    pub fn total(&self) -> Money {
        let amount: Decimal = self.items.iter().map(|i| i.line_total().amount()).sum();
        Money::new(amount, &self.currency)
    }

    /// Σ quantity over the current lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().fold(0u32, |acc, i| acc.saturating_add(i.quantity))
    }

    pub fn shipping_fee(&self, policy: &ShippingPolicy) -> Result<Money, CartError> {
        Ok(policy.fee_for(&self.total())?)
    }

    pub fn grand_total(&self, policy: &ShippingPolicy) -> Result<Money, CartError> {
        Ok(self.total().add(&self.shipping_fee(policy)?)?)
    }

    async fn persist(&self) -> Result<(), CartError> {
        let raw = serde_json::to_string(&self.items).map_err(StoreError::from)?;
        self.storage.save(&self.slot, &raw).await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Cart is priced in {expected}, variant is priced in {found}")]
    CurrencyMismatch { expected: String, found: String },
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error("Could not save cart: {0}")]
    Storage(#[from] StoreError),
}
