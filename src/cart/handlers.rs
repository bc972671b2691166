use axum::extract::{Json, Path, State};
use serde::Serialize;

use super::engine::CartMutation;
use super::models::{AddItemPayload, CartView, UpdateQuantityPayload};
use crate::utils::extract::UserId;
use crate::utils::ShopError;
use crate::AppState;

#[derive(Serialize)]
pub struct MutationResponse {
    pub message: String,
    pub cart_item_id: Option<i32>,
    pub item_count: i64,
}

impl MutationResponse {
    fn from_mutation(mutation: CartMutation, added: bool) -> Self {
        let message = match (&mutation.item, added) {
            (Some(_), true) => "Product added to cart successfully.",
            (Some(_), false) => "Cart item quantity updated.",
            (None, _) => "Product removed from cart.",
        };
        MutationResponse {
            message: message.to_owned(),
            cart_item_id: mutation.item.map(|item| item.id),
            item_count: mutation.item_count,
        }
    }
}

pub async fn get_cart(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<CartView>, ShopError> {
    let view = state.engine.user_cart(user_id).await?;
    Ok(Json(view))
}

pub async fn get_item_count(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<i64>, ShopError> {
    let count = state.engine.item_count(user_id).await?;
    Ok(Json(count))
}

pub async fn add_item(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(payload): Json<AddItemPayload>,
) -> Result<Json<MutationResponse>, ShopError> {
    let mutation = state
        .engine
        .add_item(user_id, payload.product_id, payload.quantity)
        .await?;
    Ok(Json(MutationResponse::from_mutation(mutation, true)))
}

pub async fn update_quantity(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(item_id): Path<i32>,
    Json(payload): Json<UpdateQuantityPayload>,
) -> Result<Json<MutationResponse>, ShopError> {
    let mutation = state
        .engine
        .update_quantity(user_id, item_id, payload.quantity)
        .await?;
    Ok(Json(MutationResponse::from_mutation(mutation, false)))
}

pub async fn remove_item(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(item_id): Path<i32>,
) -> Result<Json<MutationResponse>, ShopError> {
    let mutation = state.engine.remove_item(user_id, item_id).await?;
    Ok(Json(MutationResponse::from_mutation(mutation, false)))
}
