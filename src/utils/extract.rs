use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::ShopError;

/// The acting user, taken from the `X-User-Id` header the session layer in
/// front of this service injects. No ambient current-user state exists;
/// every cart operation receives the user id explicitly.
pub struct UserId(pub Uuid);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .ok_or(ShopError::Unauthenticated)?;
        Uuid::parse_str(raw)
            .map(UserId)
            .map_err(|_| ShopError::Unauthenticated)
    }
}
