use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use wick_commerce::cart::CartItemUpdate;
use wick_commerce::ids::{CartItemId, GuestId};

use super::identity::{Shopper, SignedIn};
use super::ApiError;
use crate::context::AppContext;
use crate::services::{AddItem, CartView, MergeView};

pub async fn get_cart(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(ctx.carts.view(&owner).await?))
}

pub async fn add_item(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
    body: Result<Json<AddItem>, JsonRejection>,
) -> Result<Json<CartView>, ApiError> {
    let Json(request) = body?;
    Ok(Json(ctx.carts.add_item(&owner, request).await?))
}

pub async fn update_item(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
    Path(item_id): Path<CartItemId>,
    body: Result<Json<CartItemUpdate>, JsonRejection>,
) -> Result<Json<CartView>, ApiError> {
    let Json(update) = body?;
    Ok(Json(ctx.carts.update_item(&owner, &item_id, update).await?))
}

pub async fn remove_item(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(ctx.carts.remove_item(&owner, &item_id).await?))
}

pub async fn clear_cart(
    State(ctx): State<AppContext>,
    Shopper(owner): Shopper,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(ctx.carts.clear(&owner).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub guest_id: GuestId,
}

pub async fn merge_cart(
    State(ctx): State<AppContext>,
    SignedIn(user_id): SignedIn,
    body: Result<Json<MergeRequest>, JsonRejection>,
) -> Result<Json<MergeView>, ApiError> {
    let Json(request) = body?;
    Ok(Json(ctx.carts.merge(&user_id, &request.guest_id).await?))
}
