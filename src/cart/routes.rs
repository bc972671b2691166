use axum::{
    routing::{get, patch, post},
    Router,
};

use super::handlers;
use crate::AppState;

pub fn get_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(handlers::get_cart))
        .route("/cart/count", get(handlers::get_item_count))
        .route("/cart/items", post(handlers::add_item))
        .route(
            "/cart/items/{id}",
            patch(handlers::update_quantity).delete(handlers::remove_item),
        )
}
