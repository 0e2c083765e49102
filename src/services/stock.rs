//! Stock ledger
//!
//! Stock changes are serialized per variant: an admin overwrite and a
//! checkout reservation on the same variant never interleave, so two
//! checkouts can't both spend the last unit.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::aggregates::ProductVariant;
use crate::domain::events::{DomainEvent, StockEvent};
use crate::domain::services::StockLevel;
use crate::domain::value_objects::VariantId;
use crate::services::EventPublisher;
use crate::store::{self, DocumentStore, StoreError, VARIANTS};

/// Units of one variant an order wants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockLine {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// Units taken from stock by a successful [`StockLedger::reserve`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reservation {
    taken: BTreeMap<VariantId, u32>,
}

impl Reservation {
    pub fn quantity(&self, variant_id: &VariantId) -> u32 { self.taken.get(variant_id).copied().unwrap_or(0) }
    pub fn is_empty(&self) -> bool { self.taken.is_empty() }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAlert {
    pub variant_id: VariantId,
    pub product_id: String,
    pub sku: String,
    pub stock: u32,
    pub level: StockLevel,
}

pub struct StockLedger {
    store: Arc<dyn DocumentStore>,
    publisher: Arc<dyn EventPublisher>,
    locks: Mutex<HashMap<VariantId, Arc<AsyncMutex<()>>>>,
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger").field("locked_variants", &self.locks.lock().len()).finish_non_exhaustive()
    }
}

impl StockLedger {
    pub fn new(store: Arc<dyn DocumentStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher, locks: Mutex::new(HashMap::new()) }
    }

    pub async fn variant(&self, variant_id: &VariantId) -> Result<ProductVariant, StockError> {
        store::fetch(self.store.as_ref(), VARIANTS, variant_id.as_str())
            .await?
            .ok_or_else(|| StockError::VariantMissing(variant_id.clone()))
    }

    pub async fn level(&self, variant_id: &VariantId) -> Result<StockLevel, StockError> {
        Ok(StockLevel::classify(self.variant(variant_id).await?.stock()))
    }

    /// Admin overwrite with an absolute stock count.
    pub async fn set_stock(&self, variant_id: &VariantId, stock: u32) -> Result<ProductVariant, StockError> {
        let _guard = self.lock(variant_id).await;
        let mut variant = self.variant(variant_id).await?;
        let from = variant.stock();
        variant.set_stock(stock);
        self.write_stock(variant_id, stock).await?;
        tracing::info!(variant = %variant_id, from, to = stock, level = %StockLevel::classify(stock), "stock adjusted");
        self.publisher
            .publish(vec![DomainEvent::Stock(StockEvent::Adjusted { variant_id: variant_id.to_string(), from, to: stock })])
            .await;
        Ok(variant)
    }

    /// Low and out-of-stock variants, emptiest first.
    pub async fn alerts(&self) -> Result<Vec<StockAlert>, StockError> {
        let variants: Vec<ProductVariant> = store::fetch_all(self.store.as_ref(), VARIANTS, &[]).await?;
        let mut alerts: Vec<StockAlert> = variants
            .into_iter()
            .filter_map(|v| {
                let level = StockLevel::classify(v.stock());
                level.needs_alert().then(|| StockAlert {
                    variant_id: v.id().clone(), product_id: v.product_id().to_string(),
                    sku: v.sku().to_string(), stock: v.stock(), level,
                })
            })
            .collect();
        alerts.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.sku.cmp(&b.sku)));
        Ok(alerts)
    }

    /// Checks every line against live stock and takes the units, all or
    /// nothing. Lines for the same variant are summed.
    pub async fn reserve(&self, lines: &[StockLine]) -> Result<Reservation, StockError> {
        let wanted = Self::aggregate(lines);
        let _guards = self.lock_all(wanted.keys()).await;

        let mut checked = Vec::with_capacity(wanted.len());
        for (variant_id, &quantity) in &wanted {
            let variant = self.variant(variant_id).await?;
            if !variant.is_active() {
                return Err(StockError::VariantInactive { sku: variant.sku().to_string() });
            }
            if variant.stock() < quantity {
                return Err(StockError::InsufficientStock { sku: variant.sku().to_string(), requested: quantity, available: variant.stock() });
            }
            checked.push((variant_id.clone(), variant.stock(), quantity));
        }

        let mut written: Vec<(VariantId, u32)> = Vec::with_capacity(checked.len());
        for (variant_id, stock, quantity) in &checked {
            if let Err(e) = self.write_stock(variant_id, stock - quantity).await {
                self.restore(&written).await;
                return Err(e.into());
            }
            written.push((variant_id.clone(), *stock));
        }

        let events = checked
            .iter()
            .map(|(id, stock, quantity)| {
                DomainEvent::Stock(StockEvent::Reserved { variant_id: id.to_string(), quantity: *quantity, remaining: stock - quantity })
            })
            .collect();
        self.publisher.publish(events).await;
        Ok(Reservation { taken: wanted })
    }

    /// Returns reserved units to stock. Variants deleted since are skipped.
    pub async fn release(&self, reservation: &Reservation) -> Result<(), StockError> {
        let _guards = self.lock_all(reservation.taken.keys()).await;
        let mut events = Vec::new();
        for (variant_id, &quantity) in &reservation.taken {
            let variant = match self.variant(variant_id).await {
                Ok(v) => v,
                Err(StockError::VariantMissing(_)) => {
                    tracing::warn!(variant = %variant_id, quantity, "cannot release stock of deleted variant");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.write_stock(variant_id, variant.stock().saturating_add(quantity)).await?;
            events.push(DomainEvent::Stock(StockEvent::Released { variant_id: variant_id.to_string(), quantity }));
        }
        self.publisher.publish(events).await;
        Ok(())
    }

    fn aggregate(lines: &[StockLine]) -> BTreeMap<VariantId, u32> {
        let mut wanted: BTreeMap<VariantId, u32> = BTreeMap::new();
        for line in lines.iter().filter(|l| l.quantity > 0) {
            let entry = wanted.entry(line.variant_id.clone()).or_default();
            *entry = entry.saturating_add(line.quantity);
        }
        wanted
    }

    async fn restore(&self, written: &[(VariantId, u32)]) {
        for (variant_id, stock) in written {
            if let Err(e) = self.write_stock(variant_id, *stock).await {
                tracing::error!(variant = %variant_id, stock, error = %e, "could not roll back stock reservation");
            }
        }
    }

    async fn write_stock(&self, variant_id: &VariantId, stock: u32) -> Result<(), StoreError> {
        self.store.update(VARIANTS, variant_id.as_str(), json!({ "stock": stock, "updatedAt": Utc::now() })).await
    }

    fn handle(&self, variant_id: &VariantId) -> Arc<AsyncMutex<()>> {
        self.locks.lock().entry(variant_id.clone()).or_default().clone()
    }

    async fn lock(&self, variant_id: &VariantId) -> OwnedMutexGuard<()> { self.handle(variant_id).lock_owned().await }

    /// Takes the locks in id order so concurrent reservations can't deadlock.
    async fn lock_all<'a>(&self, ids: impl Iterator<Item = &'a VariantId>) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted: Vec<&VariantId> = ids.collect();
        sorted.sort();
        sorted.dedup();
        let mut guards = Vec::with_capacity(sorted.len());
        for id in sorted {
            guards.push(self.lock(id).await);
        }
        guards
    }
}

#[derive(Debug, Error)]
pub enum StockError {
    #[error("Variant {0} no longer exists, refresh your cart")]
    VariantMissing(VariantId),
    #[error("{sku} is no longer available, refresh your cart")]
    VariantInactive { sku: String },
    #[error("Only {available} of {sku} left (wanted {requested}), refresh your cart")]
    InsufficientStock { sku: String, requested: u32, available: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}
