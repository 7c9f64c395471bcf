use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use wick_commerce::checkout::Order;
use wick_commerce::ids::{CheckoutId, OrderId};

use super::identity::{Admin, Shopper, SignedIn};
use super::ApiError;
use crate::context::AppContext;
use crate::services::{Confirmation, StatusUpdate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    pub checkout_id: CheckoutId,
}

/// Confirm a checkout in review and place its order.
pub async fn place_order(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
    body: Result<Json<PlaceOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Confirmation>), ApiError> {
    let Json(request) = body?;
    let confirmation = ctx.checkout.confirm(&owner, &request.checkout_id).await?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

pub async fn list_orders(
    State(ctx): State<AppContext>,
    SignedIn(user_id): SignedIn,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(ctx.orders.list_for_user(&user_id).await?))
}

pub async fn get_order(
    State(ctx): State<AppContext>,
    SignedIn(user_id): SignedIn,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(ctx.orders.get_for_user(&user_id, &id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub order_number: String,
    pub email: String,
}

pub async fn track_order(
    State(ctx): State<AppContext>,
    body: Result<Json<TrackRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(request) = body?;
    Ok(Json(ctx.orders.track(&request.order_number, &request.email).await?))
}

pub async fn update_status(
    State(ctx): State<AppContext>,
    _admin: Admin,
    Path(id): Path<OrderId>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(update) = body?;
    Ok(Json(ctx.orders.update_status(&id, update).await?))
}
