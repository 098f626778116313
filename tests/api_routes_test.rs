mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::TestApp;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use storefront_api::entities::ProductType;
use tower::ServiceExt;
use uuid::Uuid;

async fn send(router: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(req).await.expect("request failed");
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

/// Decimals serialize as JSON strings; compare numerically.
fn decimal_field(body: &Value, field: &str) -> rust_decimal::Decimal {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("{} missing", field))
        .parse()
        .unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_up() {
    let app = TestApp::new().await;
    let (status, body) = send(
        app.router(),
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn cart_endpoints_round_trip() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let product = app
        .seed_product("Headphones", ProductType::Single, dec!(90))
        .await;
    let color = app.seed_color(product.id, None, dec!(90), 10, 2).await;

    let (status, body) = send(
        app.router(),
        json_request(
            Method::POST,
            &format!("/api/v1/cart/{}/items", customer.id),
            json!({
                "product_id": product.id,
                "color_id": color.id,
                "quantity": 2,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal_field(&body, "total_price"), dec!(180));
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        app.router(),
        Request::builder()
            .uri(format!("/api/v1/cart/{}", customer.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn missing_cart_maps_to_404() {
    let app = TestApp::new().await;
    let (status, _) = send(
        app.router(),
        Request::builder()
            .uri(format!("/api/v1/cart/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_over_http_places_order() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let address = app.seed_address(customer.id).await;
    let product = app
        .seed_product("Soundbar", ProductType::Single, dec!(100))
        .await;
    let color = app.seed_color(product.id, None, dec!(100), 5, 1).await;

    let (status, _) = send(
        app.router(),
        json_request(
            Method::POST,
            &format!("/api/v1/cart/{}/items", customer.id),
            json!({
                "product_id": product.id,
                "color_id": color.id,
                "quantity": 2,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app.router(),
        json_request(
            Method::POST,
            "/api/v1/orders/checkout",
            json!({
                "customer_id": customer.id,
                "address_id": address.id,
                "payment_status": "paid",
                "delivery_method": "courier",
                "discount_percent": "10",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal_field(&body, "total_amount"), dec!(200));
    assert!(body["order_number"].as_str().unwrap().contains('#'));
}

#[tokio::test]
async fn insufficient_stock_maps_to_422() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let address = app.seed_address(customer.id).await;
    let product = app
        .seed_product("Projector", ProductType::Single, dec!(400))
        .await;
    let color = app.seed_color(product.id, None, dec!(400), 1, 1).await;

    let (status, _) = send(
        app.router(),
        json_request(
            Method::POST,
            "/api/v1/orders/direct",
            json!({
                "customer_id": customer.id,
                "product_id": product.id,
                "color_id": color.id,
                "quantity": 5,
                "address_id": address.id,
                "payment_status": "paid",
                "delivery_method": "courier",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn serviceability_endpoint_uses_carrier() {
    let app = TestApp::new().await;
    let (status, body) = send(
        app.router(),
        Request::builder()
            .uri("/api/v1/serviceability/400001")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["serviceable"], true);
    assert_eq!(body["city"], "Mumbai");
}

#[tokio::test]
async fn device_search_over_http() {
    let app = TestApp::new().await;

    let (status, _) = send(
        app.router(),
        json_request(
            Method::POST,
            "/api/v1/devices",
            json!({
                "device_srno": "SN-HTTP-1",
                "device_name": "Refurb Phone",
                "sku": "RPH-9",
                "price": "275",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app.router(),
        json_request(
            Method::POST,
            "/api/v1/devices/search",
            json!({ "search_term": "SN-HTTP-1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "IN_STOCK");
}

#[tokio::test]
async fn transition_endpoints_enforce_preconditions() {
    let app = TestApp::new().await;
    let customer = app.seed_customer().await;
    let address = app.seed_address(customer.id).await;
    let product = app
        .seed_product("Webcam", ProductType::Single, dec!(45))
        .await;
    let color = app.seed_color(product.id, None, dec!(45), 10, 2).await;

    let (_, body) = send(
        app.router(),
        json_request(
            Method::POST,
            "/api/v1/orders/direct",
            json!({
                "customer_id": customer.id,
                "product_id": product.id,
                "color_id": color.id,
                "quantity": 1,
                "address_id": address.id,
                "payment_status": "paid",
                "delivery_method": "courier",
            }),
        ),
    )
    .await;
    let order_id = body["id"].as_str().unwrap().to_string();

    // Shipping before fulfillment is a 409.
    let (status, _) = send(
        app.router(),
        json_request(
            Method::POST,
            &format!("/api/v1/orders/{}/ship", order_id),
            json!({ "actor": "admin" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // An empty body falls back to the default actor.
    let (status, _) = send(
        app.router(),
        Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/orders/{}/fulfill", order_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app.router(),
        json_request(
            Method::POST,
            &format!("/api/v1/orders/{}/ship", order_id),
            json!({ "actor": "admin" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivery_status"], "shipped");
}
