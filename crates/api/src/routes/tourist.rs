//! Buyer identity taken from the `x-tourist-id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::TouristId;

use crate::error::ApiError;

/// Header carrying the authenticated buyer's id, set by the gateway.
pub const TOURIST_HEADER: &str = "x-tourist-id";

/// The buyer making the request.
#[derive(Debug, Clone, Copy)]
pub struct Tourist(pub TouristId);

impl<S: Send + Sync> FromRequestParts<S> for Tourist {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TOURIST_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {TOURIST_HEADER} header")))?;

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|id| Tourist(TouristId::new(id)))
            .ok_or_else(|| ApiError::BadRequest(format!("invalid {TOURIST_HEADER} header")))
    }
}
