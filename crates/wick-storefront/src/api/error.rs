use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use wick_commerce::{CommerceError, FieldError};

use crate::gateway::webhook::WebhookError;

/// Every error a handler can return, rendered as
/// `{"error": {"code", "message", "fields"?}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, &[FieldError]) {
        match self {
            ApiError::Commerce(e) => {
                let (status, code) = match e {
                    CommerceError::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
                    CommerceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                    CommerceError::OutOfStock(_) => (StatusCode::CONFLICT, "out_of_stock"),
                    CommerceError::PaymentDeclined(_) => (StatusCode::PAYMENT_REQUIRED, "payment_declined"),
                    CommerceError::GatewayTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout"),
                    CommerceError::PriceMismatch { .. } => (StatusCode::CONFLICT, "price_mismatch"),
                    CommerceError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
                    CommerceError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                    CommerceError::CurrencyMismatch { .. }
                    | CommerceError::Overflow
                    | CommerceError::Storage(_)
                    | CommerceError::Gateway(_)
                    | CommerceError::Serialization(_) => {
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "internal_error",
                            "An internal error occurred".to_string(),
                            &[],
                        );
                    }
                };
                let fields = match e {
                    CommerceError::Validation { fields, .. } => fields.as_slice(),
                    _ => &[],
                };
                (status, code, e.to_string(), fields)
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", (*message).to_string(), &[])
            }
            ApiError::Webhook(e) => (StatusCode::BAD_REQUEST, "invalid_webhook", e.to_string(), &[]),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message.clone(), &[]),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, fields) = self.parts();
        if status.is_server_error() && status != StatusCode::GATEWAY_TIMEOUT {
            tracing::error!(error = %self, "request failed");
        } else if matches!(self, ApiError::Webhook(_)) {
            tracing::warn!(error = %self, "webhook rejected");
        }

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if !fields.is_empty() {
            error["fields"] = json!(fields);
        }
        (status, Json(json!({ "error": error }))).into_response()
    }
}
