use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::directory::DirectoryError;
use crate::geo::resolver::GeocodeError;
use crate::models::shipment::{ShipmentId, ShipmentStatus};
use crate::repository::RepositoryError;

/// Seconds a client should wait before retrying after a geocoding timeout.
const GEOCODING_RETRY_AFTER_SECS: u64 = 2;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("address not found: {0}")]
    AddressNotFound(String),

    #[error("geocoding timed out, retry later")]
    GeocodingTimeout,

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },

    #[error("shipment {0} is not assigned to this courier")]
    NotAssignedToCourier(ShipmentId),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            AppError::AddressNotFound(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "ADDRESS_NOT_FOUND")
            }
            AppError::GeocodingTimeout => (StatusCode::UNPROCESSABLE_ENTITY, "GEOCODING_TIMEOUT"),
            AppError::InvalidTransition { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_TRANSITION")
            }
            // Reported as missing so couriers cannot learn which ids belong to others.
            AppError::NotAssignedToCourier(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::GeocodingTimeout | AppError::Unavailable(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Internal(_) | AppError::Unavailable(_) => {
                tracing::error!(error = %self, "request failed");
                status
                    .canonical_reason()
                    .unwrap_or("internal error")
                    .to_string()
            }
            AppError::NotAssignedToCourier(id) => format!("shipment {id} not found"),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "retryable": self.is_retryable(),
            }
        }));

        if matches!(self, AppError::GeocodingTimeout) {
            return (
                status,
                [(header::RETRY_AFTER, GEOCODING_RETRY_AFTER_SECS.to_string())],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}

impl From<GeocodeError> for AppError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::AddressNotFound(query) => AppError::AddressNotFound(query),
            GeocodeError::Timeout => AppError::GeocodingTimeout,
            GeocodeError::InvalidRequest(msg) => AppError::Validation(msg),
            GeocodeError::Upstream(msg) | GeocodeError::Decode(msg) => {
                AppError::Unavailable(format!("geocoder: {msg}"))
            }
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Connection(msg) => AppError::Unavailable(format!("storage: {msg}")),
            RepositoryError::Query(msg) | RepositoryError::Decode(msg) => {
                AppError::Internal(format!("storage: {msg}"))
            }
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        AppError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                AppError::AddressNotFound("Nowhere".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::InvalidTransition {
                    from: ShipmentStatus::Delivered,
                    to: ShipmentStatus::OutForDelivery,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppError::NotAssignedToCourier(7), StatusCode::NOT_FOUND),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (
                AppError::Unavailable("db".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn geocoding_timeout_is_retryable_with_retry_after() {
        let err = AppError::from(GeocodeError::Timeout);
        assert!(err.is_retryable());

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[test]
    fn connection_failures_become_unavailable() {
        let err = AppError::from(RepositoryError::Connection("refused".into()));
        assert!(matches!(err, AppError::Unavailable(_)));
    }
}
