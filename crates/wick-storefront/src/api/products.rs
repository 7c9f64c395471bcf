use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use wick_commerce::catalog::{CustomizationCatalog, Product, ProductPage, ProductQuery};
use wick_commerce::customization::CustomizationCombination;
use wick_commerce::ids::ProductId;

use super::ApiError;
use crate::context::AppContext;
use crate::services::CustomizationCheck;

pub async fn list_products(
    State(ctx): State<AppContext>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> Result<Json<ProductPage>, ApiError> {
    let Query(query) = query?;
    Ok(Json(ctx.catalog.list(&query).await?))
}

pub async fn get_product(
    State(ctx): State<AppContext>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(ctx.catalog.get(&id).await?))
}

pub async fn customization_options(
    State(ctx): State<AppContext>,
    Path(id): Path<ProductId>,
) -> Result<Json<CustomizationCatalog>, ApiError> {
    Ok(Json(ctx.catalog.customization_options(&id).await?))
}

pub async fn validate_customization(
    State(ctx): State<AppContext>,
    Path(id): Path<ProductId>,
    body: Result<Json<CustomizationCombination>, JsonRejection>,
) -> Result<Json<CustomizationCheck>, ApiError> {
    let Json(combination) = body?;
    Ok(Json(ctx.catalog.validate_customization(&id, &combination).await?))
}
