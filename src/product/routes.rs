use axum::{
    routing::{get, patch},
    Router,
};

use super::handlers;
use crate::AppState;

pub fn get_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(handlers::get_products).post(handlers::create_product),
        )
        .route("/products/{id}", get(handlers::get_product_by_id))
        .route("/products/{id}/stock", patch(handlers::update_stock))
}
