// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! The JSON API answers logical failures with HTTP 200 and a `{"message"}`
//! body; success is told apart by payload shape. Only the auth gate rejects
//! with a non-200 status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::token::TokenError;

/// Generic message for anything that must not leak internals.
pub const GENERIC_ERROR: &str = "There was an error occur";
/// Generic message for gate rejections.
pub const AUTH_FAILED: &str = "Failed to authenticate user";

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Input failed schema validation; carries the first message.
    #[error("{0}")]
    Validation(String),

    /// No matching account or record.
    #[error("{0}")]
    NotFound(String),

    /// Credentials or codes were rejected.
    #[error("{0}")]
    Authentication(String),

    /// Missing, invalid or expired bearer token at the gate.
    #[error("Authentication required")]
    Unauthorized,

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// The message a caller is allowed to see.
    pub fn public_message(&self) -> &str {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Authentication(msg) => {
                msg
            }
            AppError::Unauthorized => AUTH_FAILED,
            AppError::Token(_) | AppError::Database(_) | AppError::Internal(_) => GENERIC_ERROR,
        }
    }
}

/// JSON body for every failure.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Token(err) => {
                tracing::error!(error = %err, "Token error");
                StatusCode::OK
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                StatusCode::OK
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                StatusCode::OK
            }
            AppError::Validation(_) | AppError::NotFound(_) | AppError::Authentication(_) => {
                StatusCode::OK
            }
        };

        let body = MessageResponse {
            message: self.public_message().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
