use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use wick_commerce::checkout::ShippingDetails;
use wick_commerce::ids::CheckoutId;

use super::identity::Shopper;
use super::ApiError;
use crate::context::AppContext;
use crate::services::{CheckoutView, IntentRequest, IntentView, SubmitPayment};

pub async fn start_checkout(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
) -> Result<(StatusCode, Json<CheckoutView>), ApiError> {
    Ok((StatusCode::CREATED, Json(ctx.checkout.start(&owner).await?)))
}

pub async fn get_checkout(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
    Path(id): Path<CheckoutId>,
) -> Result<Json<CheckoutView>, ApiError> {
    Ok(Json(ctx.checkout.view(&owner, &id).await?))
}

pub async fn submit_shipping(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
    Path(id): Path<CheckoutId>,
    body: Result<Json<ShippingDetails>, JsonRejection>,
) -> Result<Json<CheckoutView>, ApiError> {
    let Json(details) = body?;
    Ok(Json(ctx.checkout.submit_shipping(&owner, &id, details).await?))
}

/// The body is optional; an empty request asks for the quoted amount.
pub async fn create_payment_intent(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
    Path(id): Path<CheckoutId>,
    body: Bytes,
) -> Result<Json<IntentView>, ApiError> {
    let request = if body.is_empty() {
        IntentRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    Ok(Json(ctx.checkout.create_payment_intent(&owner, &id, request).await?))
}

pub async fn submit_payment(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
    Path(id): Path<CheckoutId>,
    body: Result<Json<SubmitPayment>, JsonRejection>,
) -> Result<Json<CheckoutView>, ApiError> {
    let Json(payment) = body?;
    Ok(Json(ctx.checkout.submit_payment(&owner, &id, payment).await?))
}

pub async fn go_back(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
    Path(id): Path<CheckoutId>,
) -> Result<Json<CheckoutView>, ApiError> {
    Ok(Json(ctx.checkout.go_back(&owner, &id).await?))
}
