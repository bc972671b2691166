use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Largest quantity a single cart line may hold.
pub const MAX_ITEM_QUANTITY: i32 = 9999;

/// Errors surfaced synchronously by cart operations and, internally, by the
/// background components. Background jobs never hand these to end users;
/// they log and let the dispatcher retry.
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("You must be logged in to use the cart.")]
    Unauthenticated,
    #[error("{0} not found.")]
    NotFound(&'static str),
    #[error("Cart item does not belong to your cart.")]
    Forbidden,
    #[error("Quantity must be at least 1.")]
    InvalidQuantity(i32),
    #[error("Quantity cannot exceed {MAX_ITEM_QUANTITY}.")]
    UpperBoundExceeded(i32),
    #[error("Insufficient stock available. Only {available} items in stock.")]
    InsufficientStock { available: i32 },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to send mail: {0}")]
    Mail(#[from] MailError),
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = match &self {
            ShopError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ShopError::NotFound(_) => StatusCode::NOT_FOUND,
            ShopError::Forbidden => StatusCode::FORBIDDEN,
            ShopError::InvalidQuantity(_) | ShopError::UpperBoundExceeded(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ShopError::InsufficientStock { .. } => StatusCode::CONFLICT,
            ShopError::Store(_) | ShopError::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct MailError(pub String);

pub async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
