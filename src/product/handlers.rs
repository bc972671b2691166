use axum::extract::{Json, Path, State};

use super::models::{NewProduct, Product, UpdateStockPayload};
use crate::jobs::Job;
use crate::store::ProductRepo;
use crate::utils::ShopError;
use crate::AppState;

pub async fn get_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, ShopError> {
    let products = state.products.all().await?;
    Ok(Json(products))
}

pub async fn get_product_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Product>, ShopError> {
    let product = state
        .products
        .find(id)
        .await?
        .ok_or(ShopError::NotFound("Product"))?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<NewProduct>,
) -> Result<Json<Product>, ShopError> {
    let product = state.products.create(payload).await?;
    Ok(Json(product))
}

/// Admin stock adjustment. Any stock change queues a low-stock check, which
/// decides (idempotently, per product and day) whether to alert.
pub async fn update_stock(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateStockPayload>,
) -> Result<Json<Product>, ShopError> {
    let product = state
        .products
        .set_stock(id, payload.stock_quantity)
        .await?
        .ok_or(ShopError::NotFound("Product"))?;
    state
        .dispatcher
        .dispatch(Job::LowStockCheck { product_id: product.id });
    Ok(Json(product))
}
