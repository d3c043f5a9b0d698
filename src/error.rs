// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::setup::SetupError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error_code: &'static str,
    /// Set when the keystore must be provisioned before retrying.
    pub needs_setup: bool,
}

/// Error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub needs_setup: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_code,
            needs_setup: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    /// Map a lifecycle error raised while signing. An unprovisioned
    /// keystore is a temporary unavailability here, not a conflict.
    pub fn from_signing(err: SetupError) -> Self {
        match err {
            SetupError::NotProvisioned => Self {
                needs_setup: true,
                ..Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "not_provisioned",
                    "Keystore is not set up; complete setup first",
                )
            },
            other => other.into(),
        }
    }
}

impl From<SetupError> for ApiError {
    fn from(err: SetupError) -> Self {
        let status = match &err {
            SetupError::AuthenticationFailed { .. } | SetupError::SessionRequired => {
                StatusCode::UNAUTHORIZED
            }
            SetupError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
            SetupError::AlreadyProvisioned | SetupError::NotProvisioned => StatusCode::CONFLICT,
            SetupError::Disabled(_) => StatusCode::FORBIDDEN,
            SetupError::MalformedSignature(_) | SetupError::Io(_) | SetupError::Crypto(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &err {
            SetupError::AuthenticationFailed { .. } => "Invalid keystore password".to_string(),
            SetupError::MalformedSignature(_) | SetupError::Io(_) | SetupError::Crypto(_) => {
                tracing::error!(error = %err, "Internal failure");
                "Internal error while processing the keystore".to_string()
            }
            other => other.to_string(),
        };

        Self::new(status, err.public_code(), message)
    }
}

impl SetupError {
    /// Caller-facing error code. Authentication failures share one code
    /// whatever the underlying reason.
    fn public_code(&self) -> &'static str {
        match self {
            SetupError::AuthenticationFailed { .. } => "authentication_failed",
            SetupError::MalformedSignature(_) | SetupError::Crypto(_) => "internal_error",
            SetupError::Io(_) => "io_failure",
            other => other.diagnostic(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            success: false,
            error: self.message,
            error_code: self.error_code.to_string(),
            needs_setup: self.needs_setup,
        });
        (self.status, body).into_response()
    }
}
