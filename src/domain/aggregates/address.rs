//! Delivery addresses

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub id: String,
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(length(min = 7, max = 15))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    pub fn new(full_name: &str, phone: &str, street: &str, city: &str, district: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(), full_name: full_name.into(), phone: phone.into(),
            street: street.into(), city: city.into(), district: district.into(),
            landmark: None, is_default: false,
        }
    }
}

/// A user's saved addresses; at most one is the default.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressBook(Vec<Address>);

impl AddressBook {
    pub fn new() -> Self { Self::default() }
    pub fn addresses(&self) -> &[Address] { &self.0 }
    pub fn get(&self, id: &str) -> Option<&Address> { self.0.iter().find(|a| a.id == id) }
    pub fn default_address(&self) -> Option<&Address> { self.0.iter().find(|a| a.is_default) }

    /// Adds an address; the first one saved becomes the default.
    pub fn add(&mut self, mut address: Address) -> Result<(), validator::ValidationErrors> {
        address.validate()?;
        if address.id.is_empty() { address.id = Uuid::now_v7().to_string(); }
        let make_default = address.is_default || self.0.is_empty();
        address.is_default = false;
        let id = address.id.clone();
        self.0.push(address);
        if make_default { self.set_default(&id); }
        Ok(())
    }

    /// Flags `id` as default and clears every other flag. Unknown ids change nothing.
    pub fn set_default(&mut self, id: &str) -> bool {
        if self.get(id).is_none() { return false; }
        for address in &mut self.0 {
            address.is_default = address.id == id;
        }
        true
    }

    pub fn remove(&mut self, id: &str) {
        let was_default = self.get(id).is_some_and(|a| a.is_default);
        self.0.retain(|a| a.id != id);
        if was_default {
            if let Some(first) = self.0.first_mut() { first.is_default = true; }
        }
    }
}
