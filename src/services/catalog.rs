//! Catalog administration: products, variants and reviews

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::{Validate, ValidationError};

use crate::domain::aggregates::{Attributes, NewProduct, Product, ProductError, ProductVariant, Review};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::services::{Resolution, VariantResolver};
use crate::domain::value_objects::{Money, Sku, VariantId};
use crate::services::EventPublisher;
use crate::store::{self, DocumentStore, Filter, PRODUCTS, REVIEWS, VARIANTS};
use crate::{Result, StorefrontError};

/// Highest price a variant may carry, in store currency units.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Admin input for a new variant. A missing SKU is suggested from the brand.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewVariant {
    #[serde(default)]
    pub sku: Option<String>,
    pub attributes: Attributes,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_price")]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool { true }

fn validate_price(price: &Decimal) -> std::result::Result<(), ValidationError> {
    if *price < Decimal::ZERO {
        return Err(ValidationError::new("negative_price"));
    }
    if *price > MAX_PRICE {
        return Err(ValidationError::new("price_too_large"));
    }
    Ok(())
}

fn check_price(field: &str, price: &Decimal) -> Result<()> {
    validate_price(price).map_err(|e| StorefrontError::Validation(format!("{field}: {e}")))
}

pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
    publisher: Arc<dyn EventPublisher>,
    currency: String,
}

impl std::fmt::Debug for CatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogService").field("currency", &self.currency).finish_non_exhaustive()
    }
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>, publisher: Arc<dyn EventPublisher>, currency: &str) -> Self {
        Self { store, publisher, currency: currency.to_uppercase() }
    }

    pub async fn create_product(&self, input: NewProduct) -> Result<Product> {
        let mut product = Product::create(input)?;
        store::save(self.store.as_ref(), PRODUCTS, product.id(), &product).await?;
        tracing::info!(product = product.id(), name = product.name(), "product created");
        self.publisher.publish(product.take_events()).await;
        Ok(product)
    }

    pub async fn product(&self, product_id: &str) -> Result<Product> {
        store::fetch(self.store.as_ref(), PRODUCTS, product_id)
            .await?
            .ok_or_else(|| StorefrontError::ProductNotFound(product_id.to_string()))
    }

    pub async fn publish(&self, product_id: &str) -> Result<Product> {
        let mut product = self.product(product_id).await?;
        product.publish()?;
        store::save(self.store.as_ref(), PRODUCTS, product.id(), &product).await?;
        self.publisher.publish(product.take_events()).await;
        Ok(product)
    }

    pub async fn variants_of(&self, product_id: &str) -> Result<Vec<ProductVariant>> {
        let mut variants: Vec<ProductVariant> =
            store::fetch_all(self.store.as_ref(), VARIANTS, &[Filter::eq("productId", product_id)]).await?;
        variants.sort_by(|a, b| a.sku().as_str().cmp(b.sku().as_str()));
        Ok(variants)
    }

    pub async fn variant(&self, variant_id: &VariantId) -> Result<ProductVariant> {
        store::fetch(self.store.as_ref(), VARIANTS, variant_id.as_str())
            .await?
            .ok_or_else(|| StorefrontError::VariantNotFound(variant_id.to_string()))
    }

    /// Adds a variant after checking its attributes against the product's
    /// schema and against the combinations already on sale.
    pub async fn add_variant(&self, product_id: &str, input: NewVariant) -> Result<ProductVariant> {
        input.validate().map_err(|e| StorefrontError::Validation(e.to_string()))?;
        let product = self.product(product_id).await?;
        product.check_attributes(&input.attributes)?;
        let existing = self.variants_of(product_id).await?;
        if existing.iter().any(|v| v.attributes() == &input.attributes) {
            return Err(ProductError::DuplicateVariant.into());
        }
        let sku = match input.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(sku) => Sku::new(sku)?,
            None => product.suggest_sku(existing.len()),
        };
        if existing.iter().any(|v| v.sku() == &sku) {
            return Err(StorefrontError::Validation(format!("SKU {sku} already used by this product")));
        }

        let mut variant = ProductVariant::new(product_id, sku, input.attributes, self.money(input.price)).with_stock(input.stock);
        if let Some(original) = input.original_price {
            variant.set_price(self.money(input.price), Some(self.money(original)));
        }
        if !input.active { variant = variant.inactive(); }

        store::save(self.store.as_ref(), VARIANTS, variant.id().as_str(), &variant).await?;
        tracing::info!(product = product_id, variant = %variant.id(), sku = %variant.sku(), "variant added");
        self.publisher
            .publish(vec![DomainEvent::Product(ProductEvent::VariantAdded {
                product_id: product_id.to_string(), variant_id: variant.id().to_string(), sku: variant.sku().to_string(),
            })])
            .await;
        Ok(variant)
    }

    /// Writes only the price fields; stock belongs to the stock ledger.
    pub async fn update_price(&self, variant_id: &VariantId, price: Decimal, original_price: Option<Decimal>) -> Result<ProductVariant> {
        check_price("price", &price)?;
        if let Some(original) = &original_price { check_price("originalPrice", original)?; }
        let mut variant = self.variant(variant_id).await?;
        variant.set_price(self.money(price), original_price.map(|o| self.money(o)));
        let fields = json!({
            "price": variant.price(),
            "originalPrice": variant.original_price(),
            "updatedAt": variant.updated_at(),
        });
        self.store.update(VARIANTS, variant_id.as_str(), fields).await?;
        tracing::info!(variant = %variant_id, price = %variant.price(), "variant repriced");
        self.variant(variant_id).await
    }

    pub async fn set_active(&self, variant_id: &VariantId, active: bool) -> Result<ProductVariant> {
        let mut variant = self.variant(variant_id).await?;
        variant.set_active(active);
        let fields = json!({ "active": variant.is_active(), "updatedAt": variant.updated_at() });
        self.store.update(VARIANTS, variant_id.as_str(), fields).await?;
        self.variant(variant_id).await
    }

    /// Deletes the variants, then the product. Not atomic: a failure part
    /// way leaves the remaining variants in place and can be retried.
    pub async fn delete_product(&self, product_id: &str) -> Result<usize> {
        self.product(product_id).await?;
        let variants = self.variants_of(product_id).await?;
        for variant in &variants {
            self.store.delete(VARIANTS, variant.id().as_str()).await?;
        }
        self.store.delete(PRODUCTS, product_id).await?;
        tracing::info!(product = product_id, variants = variants.len(), "product deleted");
        self.publisher
            .publish(vec![DomainEvent::Product(ProductEvent::Deleted { product_id: product_id.to_string(), variants_removed: variants.len() })])
            .await;
        Ok(variants.len())
    }

    /// Stores a review and recomputes the product's rating from all of them.
    pub async fn add_review(&self, product_id: &str, user_id: &str, rating: Option<u8>, comment: &str) -> Result<Product> {
        let mut product = self.product(product_id).await?;
        let review = Review::new(product_id, user_id, rating, comment)?;
        store::save(self.store.as_ref(), REVIEWS, &review.id, &review).await?;
        let reviews: Vec<Review> = store::fetch_all(self.store.as_ref(), REVIEWS, &[Filter::eq("productId", product_id)]).await?;
        product.apply_reviews(&reviews);
        store::save(self.store.as_ref(), PRODUCTS, product.id(), &product).await?;
        self.publisher.publish(product.take_events()).await;
        Ok(product)
    }

    /// Default selection for a product page.
    pub async fn initial_variant(&self, product_id: &str) -> Result<ProductVariant> {
        let (product, variants) = self.selection_context(product_id).await?;
        let resolver = VariantResolver::new(product.attribute_schema(), &variants);
        Ok(resolver.initial()?.clone())
    }

    /// Applies `key = value` on top of the current variant, if any.
    pub async fn select_variant(&self, product_id: &str, current: Option<&VariantId>, key: &str, value: &str) -> Result<(ProductVariant, bool)> {
        let (product, variants) = self.selection_context(product_id).await?;
        let resolver = VariantResolver::new(product.attribute_schema(), &variants);
        let current = current.and_then(|id| variants.iter().find(|v| v.id() == id));
        let resolution: Resolution<'_> = resolver.select(current, key, value)?;
        Ok((resolution.variant().clone(), resolution.is_fallback()))
    }

    pub async fn selection_context(&self, product_id: &str) -> Result<(Product, Vec<ProductVariant>)> {
        let product = self.product(product_id).await?;
        let variants = self.variants_of(product_id).await?;
        Ok((product, variants))
    }

    fn money(&self, amount: Decimal) -> Money { Money::new(amount, &self.currency) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::AttributeSchema;
    use crate::domain::services::ResolveError;
    use crate::services::publisher::testing::RecordingPublisher;
    use crate::services::{StockLedger, StockLine};
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use testresult::TestResult;

    /// Sells one unit through the stock ledger right after the first variant
    /// read, the way a checkout interleaves with an admin edit.
    struct CheckoutAfterRead {
        inner: Arc<MemoryStore>,
        ledger: StockLedger,
        armed: AtomicBool,
    }

    impl CheckoutAfterRead {
        fn new(inner: Arc<MemoryStore>) -> Self {
            let ledger = StockLedger::new(inner.clone(), Arc::new(RecordingPublisher::default()));
            Self { inner, ledger, armed: AtomicBool::new(true) }
        }
    }

    #[async_trait]
    impl DocumentStore for CheckoutAfterRead {
        async fn get(&self, collection: &str, id: &str) -> std::result::Result<Option<Value>, StoreError> {
            let doc = self.inner.get(collection, id).await?;
            if collection == VARIANTS && self.armed.swap(false, Ordering::SeqCst) {
                self.ledger
                    .reserve(&[StockLine { variant_id: VariantId::from(id), quantity: 1 }])
                    .await
                    .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
            }
            Ok(doc)
        }
        async fn list(&self, collection: &str, filters: &[Filter]) -> std::result::Result<Vec<Value>, StoreError> {
            self.inner.list(collection, filters).await
        }
        async fn put(&self, collection: &str, id: &str, doc: Value) -> std::result::Result<(), StoreError> {
            self.inner.put(collection, id, doc).await
        }
        async fn update(&self, collection: &str, id: &str, partial: Value) -> std::result::Result<(), StoreError> {
            self.inner.update(collection, id, partial).await
        }
        async fn delete(&self, collection: &str, id: &str) -> std::result::Result<(), StoreError> {
            self.inner.delete(collection, id).await
        }
    }

    fn service() -> (CatalogService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CatalogService::new(store.clone(), Arc::new(RecordingPublisher::default()), "npr"), store)
    }

    fn serum() -> NewProduct {
        NewProduct {
            name: "Vitamin C Serum".into(), brand: "Glow Lab".into(),
            attribute_schema: AttributeSchema::new(["Size"]), ..NewProduct::default()
        }
    }

    fn sized(size: &str, price: i64, stock: u32) -> NewVariant {
        NewVariant {
            sku: None, attributes: Attributes::new().with("Size", size), price: Decimal::from(price),
            original_price: None, stock, active: true,
        }
    }

    #[tokio::test]
    async fn variants_get_suggested_skus_and_ids() -> TestResult {
        let (catalog, _) = service();
        let product = catalog.create_product(serum()).await?;
        let first = catalog.add_variant(product.id(), sized("30ml", 1200, 5)).await?;
        let second = catalog.add_variant(product.id(), sized("60ml", 2000, 0)).await?;
        assert_eq!(first.sku().as_str(), "GLOWLAB-VAR-001");
        assert_eq!(second.sku().as_str(), "GLOWLAB-VAR-002");
        assert!(first.id().as_str().starts_with("VAR-"));
        assert_eq!(first.price().currency(), "NPR");
        Ok(())
    }

    #[tokio::test]
    async fn variant_attributes_must_fit_schema_and_be_unique() -> TestResult {
        let (catalog, _) = service();
        let product = catalog.create_product(serum()).await?;
        catalog.add_variant(product.id(), sized("30ml", 1200, 5)).await?;
        let dup = catalog.add_variant(product.id(), sized("30ml", 1300, 5)).await;
        assert!(matches!(dup, Err(StorefrontError::Product(ProductError::DuplicateVariant))));
        let wrong = NewVariant { attributes: Attributes::new().with("Colour", "Red"), ..sized("x", 1, 1) };
        assert!(matches!(catalog.add_variant(product.id(), wrong).await, Err(StorefrontError::Product(ProductError::AttributeMismatch { .. }))));
        Ok(())
    }

    #[tokio::test]
    async fn delete_cascades_to_variants() -> TestResult {
        let (catalog, store) = service();
        let product = catalog.create_product(serum()).await?;
        catalog.add_variant(product.id(), sized("30ml", 1200, 5)).await?;
        catalog.add_variant(product.id(), sized("60ml", 2000, 1)).await?;
        assert_eq!(catalog.delete_product(product.id()).await?, 2);
        assert_eq!(store.len(VARIANTS), 0);
        assert!(matches!(catalog.product(product.id()).await, Err(StorefrontError::ProductNotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn reviews_update_rating() -> TestResult {
        let (catalog, _) = service();
        let product = catalog.create_product(serum()).await?;
        catalog.add_review(product.id(), "u1", Some(5), "lovely").await?;
        let updated = catalog.add_review(product.id(), "u2", Some(3), "ok").await?;
        assert_eq!(updated.review_count(), 2);
        assert!((updated.rating() - 4.0).abs() < f64::EPSILON);
        let err = catalog.add_review(product.id(), "u3", None, "no stars").await;
        assert!(matches!(err, Err(StorefrontError::Product(ProductError::MissingRating))));
        assert_eq!(catalog.product(product.id()).await?.review_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn selection_goes_through_resolver() -> TestResult {
        let (catalog, _) = service();
        let product = catalog.create_product(serum()).await?;
        assert!(matches!(catalog.initial_variant(product.id()).await, Err(StorefrontError::Resolve(ResolveError::NoVariants))));
        let small = catalog.add_variant(product.id(), sized("30ml", 1200, 5)).await?;
        catalog.add_variant(product.id(), sized("60ml", 2000, 0)).await?;
        assert_eq!(catalog.initial_variant(product.id()).await?.id(), small.id());
        let err = catalog.select_variant(product.id(), Some(small.id()), "Size", "60ml").await;
        assert!(matches!(err, Err(StorefrontError::Resolve(ResolveError::OptionUnavailable { .. }))));
        Ok(())
    }

    #[tokio::test]
    async fn repricing_keeps_units_sold_meanwhile() -> TestResult {
        let (catalog, store) = service();
        let product = catalog.create_product(serum()).await?;
        let last = catalog.add_variant(product.id(), sized("30ml", 1200, 1)).await?;

        let racing = CatalogService::new(Arc::new(CheckoutAfterRead::new(store.clone())), Arc::new(RecordingPublisher::default()), "NPR");
        let repriced = racing.update_price(last.id(), Decimal::from(1100), None).await?;
        assert_eq!(repriced.stock(), 0);
        assert_eq!(repriced.price().amount(), Decimal::from(1100));
        assert_eq!(catalog.variant(last.id()).await?.stock(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn deactivating_keeps_units_sold_meanwhile() -> TestResult {
        let (catalog, store) = service();
        let product = catalog.create_product(serum()).await?;
        let last = catalog.add_variant(product.id(), sized("30ml", 1200, 1)).await?;

        let racing = CatalogService::new(Arc::new(CheckoutAfterRead::new(store.clone())), Arc::new(RecordingPublisher::default()), "NPR");
        racing.set_active(last.id(), false).await?;
        let stored = catalog.variant(last.id()).await?;
        assert_eq!(stored.stock(), 0);
        assert!(!stored.is_active());
        Ok(())
    }

    #[tokio::test]
    async fn prices_must_be_non_negative_and_bounded() -> TestResult {
        let (catalog, store) = service();
        let product = catalog.create_product(serum()).await?;
        let negative = catalog.add_variant(product.id(), sized("30ml", -500, 1)).await;
        assert!(matches!(negative, Err(StorefrontError::Validation(_))));
        let bad_original = NewVariant { original_price: Some(Decimal::from(-1)), ..sized("30ml", 500, 1) };
        assert!(matches!(catalog.add_variant(product.id(), bad_original).await, Err(StorefrontError::Validation(_))));
        assert_eq!(store.len(VARIANTS), 0);

        let v = catalog.add_variant(product.id(), sized("30ml", 0, 1)).await?;
        let huge = MAX_PRICE + Decimal::ONE;
        assert!(matches!(catalog.update_price(v.id(), huge, None).await, Err(StorefrontError::Validation(_))));
        assert!(matches!(catalog.update_price(v.id(), Decimal::from(10), Some(Decimal::from(-10))).await, Err(StorefrontError::Validation(_))));
        assert!(catalog.variant(v.id()).await?.price().is_zero());
        Ok(())
    }

    #[tokio::test]
    async fn price_updates_keep_currency() -> TestResult {
        let (catalog, _) = service();
        let product = catalog.create_product(serum()).await?;
        let v = catalog.add_variant(product.id(), sized("30ml", 1200, 5)).await?;
        let updated = catalog.update_price(v.id(), Decimal::from(999), Some(Decimal::from(1200))).await?;
        assert!(updated.is_discounted());
        let inactive = catalog.set_active(v.id(), false).await?;
        assert!(!inactive.is_purchasable());
        Ok(())
    }
}
