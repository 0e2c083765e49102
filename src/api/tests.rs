use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use testresult::TestResult;
use tower::ServiceExt;

use super::{router, AppState};
use crate::services::publisher::testing::RecordingPublisher;
use crate::store::{MemoryCartStorage, MemoryStore};
use crate::Config;

fn app() -> Router {
    let state = AppState::new(
        &Config::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryCartStorage::default()),
        Arc::new(RecordingPublisher::default()),
    );
    router(state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value), Box<dyn std::error::Error>> {
    let request = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, value))
}

/// Product with a 30ml variant (stock 2) and a sold-out 60ml variant.
async fn seeded(app: &Router) -> Result<(String, String, String), Box<dyn std::error::Error>> {
    let (_, product) = call(app, Method::POST, "/api/v1/products", Some(json!({
        "name": "Ceramide Cream", "brand": "Derma Co", "attributeSchema": ["Size"]
    }))).await?;
    let id = product["id"].as_str().unwrap_or_default().to_string();
    let uri = format!("/api/v1/products/{id}/variants");
    let (_, small) = call(app, Method::POST, &uri, Some(json!({
        "attributes": [{"name": "Size", "value": "30ml"}], "price": "900", "stock": 2
    }))).await?;
    let (_, large) = call(app, Method::POST, &uri, Some(json!({
        "attributes": [{"name": "Size", "value": "60ml"}], "price": "1500", "stock": 0
    }))).await?;
    Ok((id, small["id"].as_str().unwrap_or_default().to_string(), large["id"].as_str().unwrap_or_default().to_string()))
}

fn address() -> Value {
    json!({ "fullName": "Maya Gurung", "phone": "9812345678", "street": "Jhamsikhel", "city": "Lalitpur", "district": "Bagmati" })
}

#[tokio::test]
async fn health() -> TestResult {
    let (status, body) = call(&app(), Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn variant_page_greys_out_sold_out_options() -> TestResult {
    let app = app();
    let (id, small, _) = seeded(&app).await?;
    let (status, body) = call(&app, Method::GET, &format!("/api/v1/products/{id}/variants"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["initial"]["id"], small.as_str());
    assert_eq!(body["groups"][0]["key"], "Size");
    assert_eq!(body["groups"][0]["options"][1], json!({ "value": "60ml", "available": false }));

    let (status, _) = call(&app, Method::POST, &format!("/api/v1/products/{id}/variants/select"), Some(json!({
        "currentVariantId": small, "key": "Size", "value": "60ml"
    }))).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn cart_to_order_flow() -> TestResult {
    let app = app();
    let (_, small, _) = seeded(&app).await?;
    let (status, cart) = call(&app, Method::POST, "/api/v1/cart/s1", Some(json!({ "variantId": small, "quantity": 2 }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["itemCount"], 2);
    assert_eq!(cart["shippingFee"]["amount"], "100");

    let (status, order) = call(&app, Method::POST, "/api/v1/checkout/s1", Some(json!({
        "userId": "u1", "shippingAddress": address(), "paymentMethod": "cod"
    }))).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total"]["amount"], "1900");

    let (_, cart) = call(&app, Method::GET, "/api/v1/cart/s1", None).await?;
    assert_eq!(cart["itemCount"], 0);

    let (_, alerts) = call(&app, Method::GET, "/api/v1/admin/stock/alerts", None).await?;
    assert_eq!(alerts.as_array().map(Vec::len), Some(2));

    let order_id = order["id"].as_str().unwrap_or_default();
    let (status, cancelled) = call(&app, Method::POST, &format!("/api/v1/orders/{order_id}/cancel"), Some(json!({ "userId": "u1" }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    Ok(())
}

#[tokio::test]
async fn checkout_failures_map_to_client_errors() -> TestResult {
    let app = app();
    let (_, small, _) = seeded(&app).await?;
    let (status, body) = call(&app, Method::POST, "/api/v1/checkout/empty", Some(json!({
        "userId": "u1", "shippingAddress": address(), "paymentMethod": "esewa"
    }))).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Your cart is empty");

    call(&app, Method::POST, "/api/v1/cart/s2", Some(json!({ "variantId": small, "quantity": 3 }))).await?;
    let (status, _) = call(&app, Method::POST, "/api/v1/checkout/s2", Some(json!({
        "userId": "u1", "shippingAddress": address(), "paymentMethod": "khalti"
    }))).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, Method::POST, "/api/v1/cart/s2", Some(json!({ "variantId": small, "quantity": 0 }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn admin_order_moves() -> TestResult {
    let app = app();
    let (_, small, _) = seeded(&app).await?;
    call(&app, Method::POST, "/api/v1/cart/s3", Some(json!({ "variantId": small, "quantity": 1 }))).await?;
    let (_, order) = call(&app, Method::POST, "/api/v1/checkout/s3", Some(json!({
        "userId": "u9", "shippingAddress": address(), "paymentMethod": "fonepay"
    }))).await?;
    let id = order["id"].as_str().unwrap_or_default();

    let (status, _) = call(&app, Method::POST, &format!("/api/v1/admin/orders/{id}/ship"), Some(json!({ "trackingNumber": " " }))).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, shipped) = call(&app, Method::PUT, &format!("/api/v1/admin/orders/{id}/status"), Some(json!({ "status": "shipped" }))).await?;
    assert_eq!(shipped["status"], "shipped");
    let (status, _) = call(&app, Method::PUT, &format!("/api/v1/admin/orders/{id}/status"), Some(json!({ "status": "pending" }))).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, corrected) = call(&app, Method::POST, &format!("/api/v1/admin/orders/{id}/correct"), Some(json!({ "status": "pending", "reason": "mis-scan" }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(corrected["status"], "pending");

    let (status, _) = call(&app, Method::GET, "/api/v1/orders/ORD-none", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, list) = call(&app, Method::GET, "/api/v1/users/u9/orders", None).await?;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    Ok(())
}
