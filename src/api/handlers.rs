use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::domain::aggregates::{Attributes, CartItem, NewProduct, Order, OrderStatus, PaymentStatus, Product, ProductVariant};
use crate::domain::services::{AttributeGroup, StockLevel, VariantResolver};
use crate::domain::value_objects::{Money, VariantId};
use crate::services::{CheckoutRequest, NewVariant, StockAlert};

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Catalog
// =============================================================================

pub async fn create_product(State(s): State<AppState>, Json(r): Json<NewProduct>) -> ApiResult<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(s.catalog.create_product(r).await?)))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(s.catalog.product(&id).await?))
}

pub async fn publish_product(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(s.catalog.publish(&id).await?))
}

pub async fn delete_product(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    s.catalog.delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest { pub user_id: String, pub rating: Option<u8>, #[serde(default)] pub comment: String }

pub async fn add_review(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<ReviewRequest>) -> ApiResult<Json<Product>> {
    Ok(Json(s.catalog.add_review(&id, &r.user_id, r.rating, &r.comment).await?))
}

pub async fn add_variant(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<NewVariant>) -> ApiResult<(StatusCode, Json<ProductVariant>)> {
    Ok((StatusCode::CREATED, Json(s.catalog.add_variant(&id, r).await?)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantOptions {
    pub groups: Vec<AttributeGroup>,
    /// `None` when nothing is purchasable; the page shows a contact message.
    pub initial: Option<ProductVariant>,
    pub variants: Vec<ProductVariant>,
}

pub async fn variant_options(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<VariantOptions>> {
    let (product, variants) = s.catalog.selection_context(&id).await?;
    let resolver = VariantResolver::new(product.attribute_schema(), &variants);
    let groups = resolver.groups();
    let initial = resolver.initial().ok().cloned();
    Ok(Json(VariantOptions { groups, initial, variants }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest { pub current_variant_id: Option<VariantId>, pub key: String, pub value: String }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection { pub variant: ProductVariant, pub fallback: bool }

pub async fn select_variant(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<SelectRequest>) -> ApiResult<Json<Selection>> {
    let (variant, fallback) = s.catalog.select_variant(&id, r.current_variant_id.as_ref(), &r.key, &r.value).await?;
    Ok(Json(Selection { variant, fallback }))
}

pub async fn resolve_variant(State(s): State<AppState>, Path(id): Path<String>, Json(selection): Json<Attributes>) -> ApiResult<Json<ProductVariant>> {
    let (product, variants) = s.catalog.selection_context(&id).await?;
    let resolver = VariantResolver::new(product.attribute_schema(), &variants);
    Ok(Json(resolver.resolve_exact(&selection)?.clone()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest { pub price: Decimal, pub original_price: Option<Decimal> }

pub async fn update_price(State(s): State<AppState>, Path(id): Path<VariantId>, Json(r): Json<PriceRequest>) -> ApiResult<Json<ProductVariant>> {
    Ok(Json(s.catalog.update_price(&id, r.price, r.original_price).await?))
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub item_count: u32,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub total: Money,
}

async fn cart_view(s: &AppState, session: &str) -> ApiResult<CartView> {
    let cart = s.cart(session).await;
    let shipping = s.checkout.shipping();
    Ok(CartView {
        items: cart.items().to_vec(),
        item_count: cart.item_count(),
        subtotal: cart.total(),
        shipping_fee: cart.shipping_fee(shipping)?,
        total: cart.grand_total(shipping)?,
    })
}

pub async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<Json<CartView>> {
    Ok(Json(cart_view(&s, &session).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest { pub variant_id: VariantId, pub quantity: u32 }

pub async fn add_to_cart(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddToCartRequest>) -> ApiResult<Json<CartView>> {
    let variant = s.catalog.variant(&r.variant_id).await?;
    let product = s.catalog.product(variant.product_id()).await?;
    s.cart(&session).await.add_item(&product, &variant, r.quantity).await?;
    Ok(Json(cart_view(&s, &session).await?))
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest { pub quantity: u32 }

pub async fn update_cart_item(State(s): State<AppState>, Path((session, variant)): Path<(String, VariantId)>, Json(r): Json<QuantityRequest>) -> ApiResult<Json<CartView>> {
    s.cart(&session).await.update_quantity(&variant, r.quantity).await?;
    Ok(Json(cart_view(&s, &session).await?))
}

pub async fn remove_cart_item(State(s): State<AppState>, Path((session, variant)): Path<(String, VariantId)>) -> ApiResult<Json<CartView>> {
    s.cart(&session).await.remove_item(&variant).await?;
    Ok(Json(cart_view(&s, &session).await?))
}

pub async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<StatusCode> {
    s.cart(&session).await.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn checkout(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<CheckoutRequest>) -> ApiResult<(StatusCode, Json<Order>)> {
    let mut cart = s.cart(&session).await;
    Ok((StatusCode::CREATED, Json(s.checkout.place_order(&mut cart, r).await?)))
}

// =============================================================================
// Orders
// =============================================================================

pub async fn list_orders(State(s): State<AppState>, Path(user): Path<String>) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.orders.list_for_user(&user).await?))
}

pub async fn get_order(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.get(&id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest { pub user_id: String }

pub async fn cancel_order(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<CancelRequest>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.cancel(&id, &r.user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest { pub status: OrderStatus }

pub async fn set_order_status(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<StatusRequest>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.set_status(&id, r.status).await?))
}

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest { pub status: OrderStatus, pub reason: String }

pub async fn correct_order_status(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<CorrectionRequest>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.correct_status(&id, r.status, &r.reason).await?))
}

pub async fn confirm_order(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.confirm(&id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipRequest { pub tracking_number: String }

pub async fn ship_order(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<ShipRequest>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.ship(&id, &r.tracking_number).await?))
}

pub async fn deliver_order(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.deliver(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest { pub status: PaymentStatus }

pub async fn set_payment_status(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<PaymentRequest>) -> ApiResult<Json<Order>> {
    Ok(Json(s.orders.set_payment_status(&id, r.status).await?))
}

// =============================================================================
// Stock
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StockRequest { pub stock: u32 }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockView { pub variant_id: VariantId, pub stock: u32, pub level: StockLevel }

pub async fn set_stock(State(s): State<AppState>, Path(id): Path<VariantId>, Json(r): Json<StockRequest>) -> ApiResult<Json<StockView>> {
    let variant = s.stock.set_stock(&id, r.stock).await?;
    Ok(Json(StockView { variant_id: id, stock: variant.stock(), level: StockLevel::classify(variant.stock()) }))
}

pub async fn stock_alerts(State(s): State<AppState>) -> ApiResult<Json<Vec<StockAlert>>> {
    Ok(Json(s.stock.alerts().await?))
}
