//! HTTP adapter over the storefront services

mod handlers;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;

use crate::domain::aggregates::{CartError, CartLedger, ProductError, DEFAULT_CART_SLOT};
use crate::services::{CatalogService, CheckoutError, CheckoutService, OrderService, StockLedger};
use crate::store::{CartStorage, DocumentStore};
use crate::{Config, StorefrontError};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub stock: Arc<StockLedger>,
    pub carts: Arc<dyn CartStorage>,
    pub currency: String,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn DocumentStore>, carts: Arc<dyn CartStorage>, publisher: Arc<dyn crate::services::EventPublisher>) -> Self {
        let stock = Arc::new(StockLedger::new(store.clone(), publisher.clone()));
        Self {
            catalog: Arc::new(CatalogService::new(store.clone(), publisher.clone(), &config.currency)),
            checkout: Arc::new(CheckoutService::new(store.clone(), stock.clone(), publisher.clone(), config.shipping_policy())),
            orders: Arc::new(OrderService::new(store, publisher)),
            stock,
            carts,
            currency: config.currency.clone(),
        }
    }

    /// Each browser session owns one cart slot.
    pub(crate) async fn cart(&self, session: &str) -> CartLedger {
        CartLedger::load(self.carts.clone(), format!("{DEFAULT_CART_SLOT}:{session}"), &self.currency).await
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "glowcart"})) }))
        .route("/api/v1/products", post(handlers::create_product))
        .route("/api/v1/products/:id", get(handlers::get_product).delete(handlers::delete_product))
        .route("/api/v1/products/:id/publish", post(handlers::publish_product))
        .route("/api/v1/products/:id/reviews", post(handlers::add_review))
        .route("/api/v1/products/:id/variants", get(handlers::variant_options).post(handlers::add_variant))
        .route("/api/v1/products/:id/variants/select", post(handlers::select_variant))
        .route("/api/v1/products/:id/variants/resolve", post(handlers::resolve_variant))
        .route("/api/v1/cart/:session", get(handlers::get_cart).post(handlers::add_to_cart).delete(handlers::clear_cart))
        .route("/api/v1/cart/:session/items/:variant", put(handlers::update_cart_item).delete(handlers::remove_cart_item))
        .route("/api/v1/checkout/:session", post(handlers::checkout))
        .route("/api/v1/users/:user/orders", get(handlers::list_orders))
        .route("/api/v1/orders/:id", get(handlers::get_order))
        .route("/api/v1/orders/:id/cancel", post(handlers::cancel_order))
        .route("/api/v1/admin/orders/:id/status", put(handlers::set_order_status))
        .route("/api/v1/admin/orders/:id/correct", post(handlers::correct_order_status))
        .route("/api/v1/admin/orders/:id/confirm", post(handlers::confirm_order))
        .route("/api/v1/admin/orders/:id/ship", post(handlers::ship_order))
        .route("/api/v1/admin/orders/:id/deliver", post(handlers::deliver_order))
        .route("/api/v1/admin/orders/:id/payment", put(handlers::set_payment_status))
        .route("/api/v1/admin/variants/:id/stock", put(handlers::set_stock))
        .route("/api/v1/admin/variants/:id/price", put(handlers::update_price))
        .route("/api/v1/admin/stock/alerts", get(handlers::stock_alerts))
        .with_state(state)
}

/// Error body returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub StorefrontError);

impl<E: Into<StorefrontError>> From<E> for ApiError {
    fn from(e: E) -> Self { Self(e.into()) }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        use StorefrontError as E;
        match &self.0 {
            E::ProductNotFound(_) | E::OrderNotFound(_) | E::VariantNotFound(_) => StatusCode::NOT_FOUND,
            E::Validation(_) | E::Cart(CartError::InvalidQuantity | CartError::CurrencyMismatch { .. }) => StatusCode::BAD_REQUEST,
            E::Product(ProductError::DuplicateVariant) => StatusCode::CONFLICT,
            E::Product(_) => StatusCode::UNPROCESSABLE_ENTITY,
            E::Checkout(CheckoutError::Stock(_)) | E::Stock(_) | E::Resolve(_) | E::Order(_) => StatusCode::CONFLICT,
            E::Checkout(CheckoutError::Store(_)) | E::Store(_) | E::Cart(CartError::Storage(_)) if self.0.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            E::Checkout(CheckoutError::Store(_) | CheckoutError::Cart(_) | CheckoutError::Money(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            E::Checkout(_) => StatusCode::UNPROCESSABLE_ENTITY,
            E::Store(_) | E::Cart(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests;
