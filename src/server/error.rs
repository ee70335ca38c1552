//! HTTP rendering of [`SoloError`]

use axum::{
    extract::rejection::JsonRejection,
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::types::{ErrorDetail, ErrorResponse};
use crate::error::SoloError;

impl SoloError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SoloError::Validation { .. } => StatusCode::BAD_REQUEST,
            SoloError::ModelUnavailable(_) | SoloError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            SoloError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // Nobody is listening anymore; the code only shows up in logs
            SoloError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            SoloError::Validation { .. } => "invalid_request_error",
            SoloError::ModelUnavailable(_) | SoloError::Busy(_) => "service_unavailable",
            SoloError::Internal(_) | SoloError::Cancelled => "server_error",
        }
    }

    /// OpenAI-style error body
    pub fn to_body(&self) -> ErrorResponse {
        let param = match self {
            SoloError::Validation { field, .. } => Some(field.clone()),
            _ => None,
        };
        ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: self.error_type().to_string(),
                param,
            },
        }
    }
}

impl IntoResponse for SoloError {
    fn into_response(self) -> Response {
        let mut response = (self.status_code(), Json(self.to_body())).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

/// Map a body the JSON extractor refused.
///
/// Undecodable JSON is a validation failure on `body`. Transport-level
/// rejections keep axum's status: 415 for a missing content type, 413 for
/// an oversized body.
pub(crate) fn reject_body(rejection: JsonRejection) -> Result<Response, SoloError> {
    match rejection {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
            Err(SoloError::validation("body", rejection.body_text()))
        }
        other => {
            let status = other.status();
            let message = other.body_text();
            tracing::warn!("Chat completion rejected ({}): {}", status, message);
            let body = ErrorResponse {
                error: ErrorDetail {
                    message,
                    r#type: "invalid_request_error".to_string(),
                    param: None,
                },
            };
            Ok((status, Json(body)).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SoloError::validation("top_p", "bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SoloError::ModelUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SoloError::Busy(Duration::from_secs(5)).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SoloError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_body_carries_param_for_validation() {
        let body = serde_json::to_value(SoloError::validation("top_p", "bad").to_body()).unwrap();
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert_eq!(body["error"]["param"], "top_p");

        let body = serde_json::to_value(SoloError::Internal("oom".into()).to_body()).unwrap();
        assert_eq!(body["error"]["message"], "oom");
        assert!(body["error"].get("param").is_none());
    }

    #[test]
    fn test_retry_after_only_on_retryable() {
        let response = SoloError::Busy(Duration::from_secs(5)).into_response();
        assert_eq!(response.headers()[RETRY_AFTER], "1");

        let response = SoloError::ModelUnavailable("x".into()).into_response();
        assert_eq!(response.headers()[RETRY_AFTER], "1");

        let response = SoloError::Internal("x".into()).into_response();
        assert!(response.headers().get(RETRY_AFTER).is_none());
    }
}
