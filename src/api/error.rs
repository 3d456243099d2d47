//! Error responses for the HTTP API.
//!
//! Every error body has the shape `{"message": string, "detail"?: string}`.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};
use serde::Serialize;

use crate::auth::{AuthError, StoreError};

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Errors returned by handlers and the auth middleware.
#[derive(Debug)]
pub enum ApiError {
    /// 401 with a client-safe reason
    Unauthorized {
        message: String,
        detail: Option<String>,
    },
    /// 422, request body failed validation
    Unprocessable(String),
    /// 500; the message is logged, not returned
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let detail = e.to_string();
        match e {
            AuthError::Token(_) => Self::Unauthorized {
                message: "jwt auth fail".to_string(),
                detail: Some(detail),
            },
            AuthError::UnknownSubject(_) => Self::Unauthorized {
                message: "invalid token!".to_string(),
                detail: Some(detail),
            },
            AuthError::StoreUnavailable(msg) => Self::Internal(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let message = e.to_string();
        match e {
            StoreError::Conflict(_) => Self::Unprocessable(message),
            StoreError::Unavailable(msg) | StoreError::Credentials(msg) => Self::Internal(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized { message, detail } => {
                (StatusCode::UNAUTHORIZED, ErrorBody { message, detail })
            }
            ApiError::Unprocessable(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    message,
                    detail: None,
                },
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        message: "internal server error".to_string(),
                        detail: None,
                    },
                )
            }
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}
