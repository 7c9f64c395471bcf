//! HTTP surface.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | /health | `health` |
//! | GET | /products | `products::list_products` |
//! | GET | /products/{id} | `products::get_product` |
//! | GET | /products/{id}/customization-options | `products::customization_options` |
//! | POST | /products/{id}/validate-customization | `products::validate_customization` |
//! | GET, DELETE | /cart | `cart::get_cart`, `cart::clear_cart` |
//! | POST | /cart/items | `cart::add_item` |
//! | PUT, DELETE | /cart/items/{id} | `cart::update_item`, `cart::remove_item` |
//! | POST | /cart/merge | `cart::merge_cart` |
//! | POST | /checkout | `checkout::start_checkout` |
//! | GET | /checkout/{id} | `checkout::get_checkout` |
//! | PUT | /checkout/{id}/shipping | `checkout::submit_shipping` |
//! | POST | /checkout/{id}/payment-intent | `checkout::create_payment_intent` |
//! | POST | /checkout/{id}/payment | `checkout::submit_payment` |
//! | POST | /checkout/{id}/back | `checkout::go_back` |
//! | GET, POST | /orders | `orders::list_orders`, `orders::place_order` |
//! | GET | /orders/{id} | `orders::get_order` |
//! | POST | /orders/track | `orders::track_order` |
//! | PUT | /orders/{id}/status | `orders::update_status` (admin) |
//! | POST | /webhooks/payments | `webhooks::payment_webhook` |

mod cart;
mod checkout;
mod error;
pub mod identity;
mod orders;
mod products;
mod webhooks;

pub use error::ApiError;

use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the storefront router over `ctx`.
pub fn router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/products", get(products::list_products))
        .route("/products/{id}", get(products::get_product))
        .route(
            "/products/{id}/customization-options",
            get(products::customization_options),
        )
        .route(
            "/products/{id}/validate-customization",
            post(products::validate_customization),
        )
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/{id}",
            put(cart::update_item).delete(cart::remove_item),
        )
        .route("/cart/merge", post(cart::merge_cart))
        .route("/checkout", post(checkout::start_checkout))
        .route("/checkout/{id}", get(checkout::get_checkout))
        .route("/checkout/{id}/shipping", put(checkout::submit_shipping))
        .route(
            "/checkout/{id}/payment-intent",
            post(checkout::create_payment_intent),
        )
        .route("/checkout/{id}/payment", post(checkout::submit_payment))
        .route("/checkout/{id}/back", post(checkout::go_back))
        .route("/orders", get(orders::list_orders).post(orders::place_order))
        .route("/orders/track", post(orders::track_order))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/webhooks/payments", post(webhooks::payment_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::webhook::SIGNATURE_HEADER;
    use crate::testing;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
    }

    #[tokio::test]
    async fn test_health() {
        let ctx = testing::context().await;
        let (status, body) = call(
            router(ctx.app.clone()),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_validate_customization_endpoint() {
        let ctx = testing::context().await;
        let body = json!({ "scentId": "sea-salt", "colorId": "charcoal" });
        let request = json_request("POST", "/products/cozy-jar/validate-customization")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = call(router(ctx.app.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isValid"], false);
        assert_eq!(body["message"], "incompatible combination");
    }

    #[tokio::test]
    async fn test_cart_requires_identity() {
        let ctx = testing::context().await;
        let (status, body) = call(
            router(ctx.app.clone()),
            Request::get("/cart").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn test_add_item_over_limit_is_unprocessable() {
        let ctx = testing::context().await;
        let body = json!({ "productId": "cozy-jar", "quantity": 100 });
        let request = json_request("POST", "/cart/items")
            .header("x-guest-id", "g1")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = call(router(ctx.app.clone()), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "validation");
        assert_eq!(body["error"]["fields"][0]["field"], "quantity");
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let ctx = testing::context().await;
        let (status, body) = call(
            router(ctx.app.clone()),
            Request::get("/products/ghost").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_admin_status_requires_token() {
        let ctx = testing::context().await;
        let body = json!({ "status": "processing" });
        let request = json_request("PUT", "/orders/whatever/status")
            .header("x-admin-token", "wrong")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _) = call(router(ctx.app.clone()), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unsigned_webhook_rejected() {
        let ctx = testing::context().await;
        let body = r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"intentId":"pi_1"}}"#;
        let request = Request::post("/webhooks/payments")
            .body(Body::from(body))
            .unwrap();
        let (status, response) = call(router(ctx.app.clone()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], "invalid_webhook");
    }

    #[tokio::test]
    async fn test_signed_webhook_for_unknown_intent_is_parked() {
        let ctx = testing::context().await;
        let body = r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"intentId":"pi_later"}}"#;
        let signature = ctx.app.webhooks.sign(Utc::now().timestamp(), body.as_bytes());
        let request = Request::post("/webhooks/payments")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap();
        let (status, response) = call(router(ctx.app.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["outcome"], "parked");
    }
}
