//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, Sku, VariantId};

/// One `name = value` pair of a variant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Ordered attribute pairs of a variant, at most one value per name.
///
/// Equality ignores order: `{Size: 50ml, Type: Gel}` equals
/// `{Type: Gel, Size: 50ml}`.
#[derive(Clone, Debug, Default, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Attribute>", into = "Vec<Attribute>")]
pub struct Attributes(Vec<Attribute>);

impl Attributes {
    pub fn new() -> Self { Self::default() }

    /// Sets `name` to `value`, replacing an earlier value for the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        match self.0.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.0.push(Attribute { name, value }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|a| a.name == name).map(|a| a.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> { self.0.iter() }
    pub fn names(&self) -> impl Iterator<Item = &str> { self.0.iter().map(|a| a.name.as_str()) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// True when every pair of `self` other than `skip` is present in `other`.
    pub fn agrees_with(&self, other: &Attributes, skip: &str) -> bool {
        self.0
            .iter()
            .filter(|a| a.name != skip)
            .all(|a| other.get(&a.name) == Some(a.value.as_str()))
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.agrees_with(other, "")
    }
}

/// Stored pairs go through `insert`, so a repeated name keeps its last value.
impl From<Vec<Attribute>> for Attributes {
    fn from(pairs: Vec<Attribute>) -> Self {
        pairs.into_iter().map(|a| (a.name, a.value)).collect()
    }
}

impl From<Attributes> for Vec<Attribute> {
    fn from(attributes: Attributes) -> Self { attributes.0 }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |acc, (k, v)| acc.with(k, v))
    }
}

/// Attribute names a product declares for its variants, in display order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSchema(Vec<String>);

impl AttributeSchema {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = Self::default();
        for key in keys {
            let key = key.into();
            if !schema.0.contains(&key) { schema.0.push(key); }
        }
        schema
    }

    pub fn keys(&self) -> &[String] { &self.0 }
    pub fn declares(&self, key: &str) -> bool { self.0.iter().any(|k| k == key) }

    /// A variant conforms when it carries exactly the declared names.
    pub fn conforms(&self, attributes: &Attributes) -> bool {
        attributes.len() == self.0.len() && attributes.names().all(|n| self.declares(n))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus { #[default] Draft, Published }

/// Input for creating a product from the admin console.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub skin_types: Vec<String>,
    #[serde(default)]
    pub attribute_schema: AttributeSchema,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: String,
    name: String,
    brand: String,
    category: String,
    description: String,
    images: Vec<String>,
    skin_types: Vec<String>,
    rating: f64,
    review_count: u32,
    status: ProductStatus,
    attribute_schema: AttributeSchema,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Product {
    pub fn create(input: NewProduct) -> Result<Self, ProductError> {
        input.validate().map_err(|e| ProductError::Invalid(e.to_string()))?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();
        let mut product = Self {
            id: id.clone(), name: input.name.trim().to_string(), brand: input.brand.trim().to_string(),
            category: input.category, description: input.description, images: input.images,
            skin_types: input.skin_types, rating: 0.0, review_count: 0, status: ProductStatus::Draft,
            attribute_schema: input.attribute_schema, created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, name: product.name.clone() }));
        Ok(product)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn brand(&self) -> &str { &self.brand }
    pub fn category(&self) -> &str { &self.category }
    pub fn images(&self) -> &[String] { &self.images }
    pub fn rating(&self) -> f64 { self.rating }
    pub fn review_count(&self) -> u32 { self.review_count }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn attribute_schema(&self) -> &AttributeSchema { &self.attribute_schema }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.is_empty() { return Err(ProductError::MissingName); }
        if self.status == ProductStatus::Published { return Ok(()); }
        self.status = ProductStatus::Published;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Published { product_id: self.id.clone() }));
        Ok(())
    }

    pub fn unpublish(&mut self) { self.status = ProductStatus::Draft; self.touch(); }

    /// Checks a variant's attribute names against the declared schema.
    pub fn check_attributes(&self, attributes: &Attributes) -> Result<(), ProductError> {
        if self.attribute_schema.conforms(attributes) { return Ok(()); }
        Err(ProductError::AttributeMismatch {
            expected: self.attribute_schema.keys().to_vec(),
            found: attributes.names().map(str::to_string).collect(),
        })
    }

    /// SKU for the next variant given how many the product already has.
    pub fn suggest_sku(&self, existing_variants: usize) -> Sku {
        let seq = u32::try_from(existing_variants).unwrap_or(u32::MAX - 1) + 1;
        Sku::suggest(&self.brand, seq)
    }

    /// Recomputes `rating` and `review_count` from the full review set.
    pub fn apply_reviews(&mut self, reviews: &[Review]) {
        let ours: Vec<&Review> = reviews.iter().filter(|r| r.product_id == self.id).collect();
        self.review_count = u32::try_from(ours.len()).unwrap_or(u32::MAX);
        self.rating = if ours.is_empty() {
            0.0
        } else {
            let sum: u32 = ours.iter().map(|r| u32::from(r.rating)).sum();
            (f64::from(sum) / ours.len() as f64 * 10.0).round() / 10.0
        };
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::RatingRecomputed {
            product_id: self.id.clone(), rating: self.rating, review_count: self.review_count,
        }));
    }

    pub fn snapshot(&self) -> ProductSnapshot { ProductSnapshot::from(self) }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// A purchasable SKU of a product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    id: VariantId,
    product_id: String,
    sku: Sku,
    attributes: Attributes,
    price: Money,
    original_price: Option<Money>,
    stock: u32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductVariant {
    /// New active variant with zero stock.
    pub fn new(product_id: impl Into<String>, sku: Sku, attributes: Attributes, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id: VariantId::generate(), product_id: product_id.into(), sku, attributes, price,
            original_price: None, stock: 0, active: true, created_at: now, updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<VariantId>) -> Self { self.id = id.into(); self }
    pub fn with_stock(mut self, stock: u32) -> Self { self.stock = stock; self }
    pub fn with_original_price(mut self, original: Money) -> Self { self.original_price = Some(original); self }
    pub fn inactive(mut self) -> Self { self.active = false; self }

    pub fn id(&self) -> &VariantId { &self.id }
    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn attributes(&self) -> &Attributes { &self.attributes }
    pub fn price(&self) -> &Money { &self.price }
    pub fn original_price(&self) -> Option<&Money> { self.original_price.as_ref() }
    pub fn stock(&self) -> u32 { self.stock }
    pub fn is_active(&self) -> bool { self.active }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Active and in stock.
    pub fn is_purchasable(&self) -> bool { self.active && self.stock > 0 }

    pub fn is_discounted(&self) -> bool {
        self.original_price.as_ref().is_some_and(|o| o.exceeds(&self.price).unwrap_or(false))
    }

    pub fn set_stock(&mut self, stock: u32) { self.stock = stock; self.touch(); }
    pub fn set_active(&mut self, active: bool) { self.active = active; self.touch(); }

    /// Replaces price and original price. An original price below the price
    /// is accepted but logged.
    pub fn set_price(&mut self, price: Money, original_price: Option<Money>) {
        if let Some(original) = &original_price {
            if price.exceeds(original).unwrap_or(false) {
                tracing::warn!(variant = %self.id, %price, %original, "original price below selling price");
            }
        }
        self.price = price;
        self.original_price = original_price;
        self.touch();
    }

    pub fn snapshot(&self) -> VariantSnapshot { VariantSnapshot::from(self) }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Frozen copy of a product embedded in cart lines and orders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    id: String,
    name: String,
    brand: String,
    category: String,
    description: String,
    images: Vec<String>,
    skin_types: Vec<String>,
}

impl ProductSnapshot {
    pub fn id(&self) -> &str { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn brand(&self) -> &str { &self.brand }
    pub fn images(&self) -> &[String] { &self.images }
}

impl From<&Product> for ProductSnapshot {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.clone(), name: p.name.clone(), brand: p.brand.clone(), category: p.category.clone(),
            description: p.description.clone(), images: p.images.clone(), skin_types: p.skin_types.clone(),
        }
    }
}

/// Frozen copy of a variant, including the price it was added at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSnapshot {
    id: VariantId,
    product_id: String,
    sku: Sku,
    attributes: Attributes,
    price: Money,
    original_price: Option<Money>,
    stock: u32,
}

impl VariantSnapshot {
    pub fn id(&self) -> &VariantId { &self.id }
    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn attributes(&self) -> &Attributes { &self.attributes }
    pub fn price(&self) -> &Money { &self.price }
    pub fn original_price(&self) -> Option<&Money> { self.original_price.as_ref() }
    /// Stock seen when the snapshot was taken; used only to clamp UI input.
    pub fn stock(&self) -> u32 { self.stock }
}

impl From<&ProductVariant> for VariantSnapshot {
    fn from(v: &ProductVariant) -> Self {
        Self {
            id: v.id.clone(), product_id: v.product_id.clone(), sku: v.sku.clone(),
            attributes: v.attributes.clone(), price: v.price.clone(),
            original_price: v.original_price.clone(), stock: v.stock,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub product_id: String,
    pub user_id: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// `rating` is `None` when the reviewer picked no stars.
    pub fn new(product_id: impl Into<String>, user_id: impl Into<String>, rating: Option<u8>, comment: impl Into<String>) -> Result<Self, ProductError> {
        let rating = rating.ok_or(ProductError::MissingRating)?;
        if !(1..=5).contains(&rating) { return Err(ProductError::InvalidRating(rating)); }
        Ok(Self {
            id: Uuid::now_v7().to_string(), product_id: product_id.into(), user_id: user_id.into(),
            rating, comment: comment.into(), created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Invalid product: {0}")]
    Invalid(String),
    #[error("Variant attributes {found:?} do not match declared attributes {expected:?}")]
    AttributeMismatch { expected: Vec<String>, found: Vec<String> },
    #[error("Select a rating before submitting a review")]
    MissingRating,
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("A variant with these options already exists")]
    DuplicateVariant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    fn serum() -> Result<Product, ProductError> {
        Product::create(NewProduct {
            name: "Niacinamide Serum".into(),
            brand: "Glow Lab".into(),
            attribute_schema: AttributeSchema::new(["Size", "Type"]),
            ..NewProduct::default()
        })
    }

    #[test]
    fn test_product_create() -> TestResult {
        let mut p = serum()?;
        assert_eq!(p.name(), "Niacinamide Serum");
        assert_eq!(p.status(), ProductStatus::Draft);
        p.publish()?;
        assert_eq!(p.status(), ProductStatus::Published);
        assert_eq!(p.take_events().len(), 2);
        Ok(())
    }

    #[test]
    fn create_rejects_blank_name() {
        let result = Product::create(NewProduct { brand: "X".into(), ..NewProduct::default() });
        assert!(matches!(result, Err(ProductError::Invalid(_))));
    }

    #[test]
    fn attributes_compare_without_order() {
        let a = Attributes::new().with("Size", "50ml").with("Type", "Gel");
        let b = Attributes::new().with("Type", "Gel").with("Size", "50ml");
        assert_eq!(a, b);
        assert_ne!(a, Attributes::new().with("Size", "50ml"));
        assert_eq!(a.clone().with("Size", "100ml").get("Size"), Some("100ml"));
    }

    #[test]
    fn stored_attributes_keep_one_value_per_name() -> TestResult {
        let stored: Attributes = serde_json::from_value(serde_json::json!([
            { "name": "Size", "value": "50ml" },
            { "name": "Size", "value": "100ml" },
        ]))?;
        let single = Attributes::new().with("Size", "100ml");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored, single);
        assert_eq!(single, stored);
        assert_eq!(serde_json::to_value(&stored)?, serde_json::json!([{ "name": "Size", "value": "100ml" }]));
        Ok(())
    }

    #[test]
    fn schema_checks_variant_attributes() -> TestResult {
        let p = serum()?;
        p.check_attributes(&Attributes::new().with("Type", "Gel").with("Size", "50ml"))?;
        let err = p.check_attributes(&Attributes::new().with("Size", "50ml"));
        assert!(matches!(err, Err(ProductError::AttributeMismatch { .. })));
        Ok(())
    }

    #[test]
    fn purchasable_requires_active_and_stock() -> TestResult {
        let base = ProductVariant::new("P", Sku::new("A-VAR-001")?, Attributes::new(), Money::npr(Decimal::from(500)));
        assert!(!base.is_purchasable());
        assert!(base.clone().with_stock(3).is_purchasable());
        assert!(!base.with_stock(3).inactive().is_purchasable());
        Ok(())
    }

    #[test]
    fn snapshot_is_unaffected_by_later_edits() -> TestResult {
        let mut v = ProductVariant::new("P", Sku::new("A-VAR-001")?, Attributes::new(), Money::npr(Decimal::from(500))).with_stock(3);
        let frozen = v.snapshot();
        v.set_price(Money::npr(Decimal::from(650)), None);
        v.set_stock(0);
        assert_eq!(frozen.price().amount(), Decimal::from(500));
        assert_eq!(frozen.stock(), 3);
        Ok(())
    }

    #[test]
    fn reviews_recompute_rating() -> TestResult {
        let mut p = serum()?;
        let reviews = vec![
            Review::new(p.id(), "u1", Some(5), "great")?,
            Review::new(p.id(), "u2", Some(4), "good")?,
            Review::new("other", "u3", Some(1), "not this one")?,
        ];
        p.apply_reviews(&reviews);
        assert_eq!(p.review_count(), 2);
        assert!((p.rating() - 4.5).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn review_without_rating_is_rejected() {
        assert_eq!(Review::new("p", "u", None, "").map(|_| ()), Err(ProductError::MissingRating));
        assert_eq!(Review::new("p", "u", Some(6), "").map(|_| ()), Err(ProductError::InvalidRating(6)));
    }

    #[test]
    fn sku_suggestion_follows_variant_count() -> TestResult {
        let p = serum()?;
        assert_eq!(p.suggest_sku(0).as_str(), "GLOWLAB-VAR-001");
        assert_eq!(p.suggest_sku(4).as_str(), "GLOWLAB-VAR-005");
        Ok(())
    }
}
