//! Variant selection
//!
//! Maps an in-progress attribute selection to one purchasable variant.
//! Inactive and out-of-stock variants are never returned, even when they
//! are the only carrier of a value; the UI greys those values out.

use serde::Serialize;
use thiserror::Error;

use crate::domain::aggregates::{AttributeSchema, Attributes, ProductVariant};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeOption {
    pub value: String,
    /// At least one purchasable variant carries this value.
    pub available: bool,
}

/// Distinct values of one attribute key, in first-seen order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeGroup {
    pub key: String,
    pub options: Vec<AttributeOption>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Resolution<'a> {
    /// Every other attribute of the previous selection was kept.
    Exact(&'a ProductVariant),
    /// No variant kept the other attributes; the first candidate for the
    /// requested value was picked, changing other selections.
    Fallback(&'a ProductVariant),
}

impl<'a> Resolution<'a> {
    pub fn variant(&self) -> &'a ProductVariant {
        match self { Self::Exact(v) | Self::Fallback(v) => v }
    }

    pub fn is_fallback(&self) -> bool { matches!(self, Self::Fallback(_)) }
}

#[derive(Debug)]
pub struct VariantResolver<'a> {
    keys: Vec<String>,
    variants: &'a [ProductVariant],
}

impl<'a> VariantResolver<'a> {
    /// Keys come from the schema first, then any undeclared key found on a
    /// variant in first-seen order.
    pub fn new(schema: &AttributeSchema, variants: &'a [ProductVariant]) -> Self {
        let mut keys: Vec<String> = schema.keys().to_vec();
        for name in variants.iter().flat_map(|v| v.attributes().names()) {
            if !keys.iter().any(|k| k == name) { keys.push(name.to_string()); }
        }
        Self { keys, variants }
    }

    pub fn groups(&self) -> Vec<AttributeGroup> {
        self.keys
            .iter()
            .map(|key| {
                let mut options: Vec<AttributeOption> = Vec::new();
                for value in self.variants.iter().filter_map(|v| v.attributes().get(key)) {
                    if options.iter().any(|o| o.value == value) { continue; }
                    options.push(AttributeOption { value: value.to_string(), available: self.is_available(key, value) });
                }
                AttributeGroup { key: key.clone(), options }
            })
            .collect()
    }

    pub fn is_available(&self, key: &str, value: &str) -> bool { self.candidates(key, value).next().is_some() }

    /// Default selection: the first purchasable variant.
    pub fn initial(&self) -> Result<&'a ProductVariant, ResolveError> {
        self.ensure_variants()?;
        self.variants.iter().find(|v| v.is_purchasable()).ok_or(ResolveError::NothingPurchasable)
    }

    /// Applies `key = value` on top of `current`.
    pub fn select(&self, current: Option<&ProductVariant>, key: &str, value: &str) -> Result<Resolution<'a>, ResolveError> {
        self.ensure_variants()?;
        let mut candidates = self.candidates(key, value).peekable();
        let first = *candidates.peek().ok_or_else(|| ResolveError::OptionUnavailable { key: key.to_string(), value: value.to_string() })?;

        let Some(current) = current else { return Ok(Resolution::Exact(first)) };
        let held = current.attributes();
        let exact = candidates.find(|c| {
            let attrs = c.attributes();
            attrs.len() == held.len() && held.agrees_with(attrs, key)
        });
        match exact {
            Some(v) => Ok(Resolution::Exact(v)),
            None => {
                tracing::debug!(key, value, variant = %first.id(), "selection fell back to first candidate");
                Ok(Resolution::Fallback(first))
            }
        }
    }

    /// A complete selection resolves to its single purchasable match.
    pub fn resolve_exact(&self, selection: &Attributes) -> Result<&'a ProductVariant, ResolveError> {
        self.ensure_variants()?;
        let mut matches = self.variants.iter().filter(|v| v.is_purchasable() && v.attributes() == selection);
        let found = matches.next().ok_or(ResolveError::SelectionUnavailable)?;
        let extra = matches.count();
        if extra > 0 { return Err(ResolveError::Ambiguous { count: extra + 1 }); }
        Ok(found)
    }

    fn candidates<'s>(&'s self, key: &'s str, value: &'s str) -> impl Iterator<Item = &'a ProductVariant> + 's {
        self.variants.iter().filter(move |v| v.is_purchasable() && v.attributes().get(key) == Some(value))
    }

    fn ensure_variants(&self) -> Result<(), ResolveError> {
        if self.variants.is_empty() { Err(ResolveError::NoVariants) } else { Ok(()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Not purchasable, contact us for availability")]
    NoVariants,
    #[error("No option of this product is available right now")]
    NothingPurchasable,
    #[error("{key} {value} is unavailable")]
    OptionUnavailable { key: String, value: String },
    #[error("The selected combination is unavailable")]
    SelectionUnavailable,
    #[error("{count} variants share the selected combination")]
    Ambiguous { count: usize },
}
