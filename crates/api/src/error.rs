//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use capacity::CapacityError;
use purchase::PurchaseError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// The caller did not identify themselves.
    Unauthorized(String),
    /// Capacity store error.
    Capacity(CapacityError),
    /// Cart, token or checkout error.
    Purchase(PurchaseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Capacity(err) => capacity_error_to_response(err),
            ApiError::Purchase(err) => purchase_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn capacity_error_to_response(err: CapacityError) -> (StatusCode, String) {
    match &err {
        CapacityError::CapacityNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CapacityError::NotEnoughSeats { .. } => (StatusCode::CONFLICT, err.to_string()),
        CapacityError::InvalidCapacity(_) | CapacityError::InvalidQuantity(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CapacityError::Database(_) | CapacityError::Migration(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn purchase_error_to_response(err: PurchaseError) -> (StatusCode, String) {
    match &err {
        PurchaseError::EmptyCart(_) => (StatusCode::BAD_REQUEST, "Shopping cart is empty".to_string()),
        PurchaseError::InvalidItem(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        PurchaseError::TourAlreadyInCart(_) => (StatusCode::CONFLICT, err.to_string()),
        PurchaseError::ItemNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        PurchaseError::Saga(_) => {
            tracing::error!(error = %err, "failed to start purchase saga");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not initiate checkout process. Please try again later.".to_string(),
            )
        }
        PurchaseError::Storage(_) | PurchaseError::Database(_) | PurchaseError::Migration(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<CapacityError> for ApiError {
    fn from(err: CapacityError) -> Self {
        ApiError::Capacity(err)
    }
}

impl From<PurchaseError> for ApiError {
    fn from(err: PurchaseError) -> Self {
        ApiError::Purchase(err)
    }
}
