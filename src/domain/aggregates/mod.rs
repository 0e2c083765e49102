//! Aggregates module
pub mod address;
pub mod product;
pub mod order;
pub mod cart;

pub use address::{Address, AddressBook};
pub use product::{
    Attribute, AttributeSchema, Attributes, NewProduct, Product, ProductError, ProductSnapshot, ProductStatus,
    ProductVariant, Review, VariantSnapshot,
};
pub use order::{Order, OrderError, OrderStatus, PaymentMethod, PaymentStatus};
pub use cart::{CartError, CartItem, CartLedger, ShippingPolicy, DEFAULT_CART_SLOT};
