//! Shared HTTP building blocks: response envelope, error mapping and the
//! validating JSON extractor.

mod validated_json;

pub use validated_json::{ValidatedJson, ValidatedJsonRejection};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::DomainError;

/// Standard API response envelope
///
/// Success: `{"success": true, "data": {...}}`,
/// failure: `{"success": false, "error": "...", "code": "slot_unavailable"}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// `true` when the request succeeded
    pub success: bool,
    /// Payload; `null` on error
    pub data: Option<T>,
    /// Error description; omitted on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error code; omitted on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: None,
        }
    }

    pub fn error_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::error(message)
        }
    }
}

/// Empty response for operations without return data
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmptyData {}

/// A failed request, rendered as an [`ApiResponse`] error body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "validation",
            message: message.into(),
        }
    }
}

pub fn status_for(error: &DomainError) -> StatusCode {
    match error {
        DomainError::NotFound { .. } | DomainError::UnknownPayment(_) => StatusCode::NOT_FOUND,
        DomainError::Validation(_) | DomainError::InvalidSlot(_) | DomainError::OutOfWindow(_) => {
            StatusCode::BAD_REQUEST
        }
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::SlotUnavailable(_)
        | DomainError::Conflict(_)
        | DomainError::InvalidState(_)
        | DomainError::AlreadyPriced(_) => StatusCode::CONFLICT,
        DomainError::AmountMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
        DomainError::Gateway(_) => StatusCode::BAD_GATEWAY,
        DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self {
            status: status_for(&error),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, error = %self.message, "Request failed");
        } else {
            tracing::debug!(code = self.code, error = %self.message, "Request rejected");
        }
        let body = ApiResponse::<()>::error_with_code(self.message, self.code);
        (self.status, Json(body)).into_response()
    }
}

/// Handler result carrying the standard envelope
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_http_statuses() {
        let cases = [
            (DomainError::SlotUnavailable("x".into()), StatusCode::CONFLICT),
            (DomainError::AlreadyPriced("BK".into()), StatusCode::CONFLICT),
            (DomainError::OutOfWindow("x".into()), StatusCode::BAD_REQUEST),
            (DomainError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (DomainError::GatewayTimeout, StatusCode::GATEWAY_TIMEOUT),
            (DomainError::UnknownPayment("x".into()), StatusCode::NOT_FOUND),
            (
                DomainError::AmountMismatch {
                    booking_id: "BK".into(),
                    expected_paisa: 1,
                    claimed_paisa: 2,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status, status);
        }
    }

    #[test]
    fn error_body_carries_code() {
        let body = ApiResponse::<()>::error_with_code("nope", "conflict");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "conflict");
        assert!(json["data"].is_null());
    }
}
