//! API error types and domain error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Error categories exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    ModelUnavailableError,
    ServiceUnavailableError,
    ServerError,
}

impl std::fmt::Display for ApiErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequestError => write!(f, "invalid_request_error"),
            Self::ModelUnavailableError => write!(f, "model_unavailable_error"),
            Self::ServiceUnavailableError => write!(f, "service_unavailable_error"),
            Self::ServerError => write!(f, "server_error"),
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: ApiErrorType, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    error_type,
                    param: None,
                    code: None,
                },
            },
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.response.error.param = Some(param.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.response.error.code = Some(code.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiErrorType::InvalidRequestError, message)
    }

    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorType::ModelUnavailableError,
            message,
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorType::ServiceUnavailableError,
            message,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiErrorType::ServerError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        let mapped = match &err {
            DomainError::InvalidInput { .. }
            | DomainError::Decode { .. }
            | DomainError::SizeMismatch { .. }
            | DomainError::InvalidLabel { .. } => Self::bad_request(message),
            DomainError::ModelUnavailable { .. } | DomainError::NoVersions { .. } => {
                Self::model_unavailable(message)
            }
            DomainError::TransientIo { .. } | DomainError::MissingResource { .. } => {
                Self::unavailable(message)
            }
            DomainError::Configuration { .. }
            | DomainError::DuplicateVersion { .. }
            | DomainError::Conflict { .. }
            | DomainError::Model { .. }
            | DomainError::Internal { .. } => {
                tracing::error!(error = %err, kind = err.kind(), "Request failed");
                Self::internal(message)
            }
        };

        mapped.with_code(err.kind())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.response.error.error_type, self.response.error.message
        )
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_input_maps_to_400() {
        for err in [
            DomainError::invalid_input("not an image"),
            DomainError::decode("bad base64"),
            DomainError::size_mismatch(800, 12),
            DomainError::invalid_label(7),
        ] {
            let api: ApiError = err.into();
            assert_eq!(api.status, StatusCode::BAD_REQUEST);
            assert_eq!(api.response.error.error_type, ApiErrorType::InvalidRequestError);
        }
    }

    #[test]
    fn test_no_model_maps_to_503() {
        let api: ApiError = DomainError::model_unavailable("nothing published").into();
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api.response.error.error_type, ApiErrorType::ModelUnavailableError);
        assert_eq!(api.response.error.code.as_deref(), Some("model_unavailable"));

        let api: ApiError = DomainError::no_versions("models").into();
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_storage_failure_maps_to_503() {
        let api: ApiError = DomainError::transient_io("connection reset").into();
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api.response.error.error_type, ApiErrorType::ServiceUnavailableError);
    }

    #[test]
    fn test_internal_failures_map_to_500() {
        let api: ApiError = DomainError::model("corrupt artifact").into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.response.error.code.as_deref(), Some("model"));
    }

    #[test]
    fn test_error_body_shape() {
        let api = ApiError::bad_request("Unsupported content type").with_param("image_file");
        let json = serde_json::to_value(&api.response).unwrap();

        assert_eq!(json["error"]["message"], "Unsupported content type");
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert_eq!(json["error"]["param"], "image_file");
        assert!(json["error"].get("code").is_none());
    }
}
