/*
 * Responsibility
 * - edge pipeline 共通のエラー分類 (AuthError / RateLimitError / AppError)
 * - AppError → {statusCode, errorCode, message} の対応表 (ErrorNormalizer)
 * - IntoResponse では ErrorReport を extensions に載せ、middleware::errors が
 *   path 付きの正規化ボディに書き換えてログを一度だけ出す
 */
use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::{Role, VerifyError};

/// Authentication / authorization failures.
///
/// Display strings are internal diagnostics only. Callers see the generic
/// message from [`AppError::public_message`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed bearer credential")]
    Missing,
    #[error("credential rejected: {0}")]
    InvalidOrExpired(#[from] VerifyError),
    #[error("role {role} is not one of [{required}]")]
    Forbidden { role: Role, required: String },
    #[error("trusted identity header is absent")]
    MissingIdentity,
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("quota exhausted for client {client}, retry in {retry_after:?}")]
    TooManyRequests {
        client: String,
        retry_after: Duration,
    },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("no route matched")]
    NotFound,
    #[error("method not allowed for route")]
    MethodNotAllowed,
    #[error("request body exceeds the size limit")]
    PayloadTooLarge,
    #[error("upstream unavailable: {0}")]
    BadGateway(String),
    #[error("request timed out")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        Self::Internal(cause.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(AuthError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(AuthError::Forbidden { .. }) => "FORBIDDEN",
            AppError::Auth(_) => "UNAUTHORIZED",
            AppError::RateLimit(_) => "TOO_MANY_REQUESTS",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT_ERROR",
            AppError::NotFound => "NOT_FOUND",
            AppError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            AppError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            AppError::BadGateway(_) => "BAD_GATEWAY",
            AppError::Timeout => "GATEWAY_TIMEOUT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Caller-facing message. Never derived from the internal cause.
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::Auth(AuthError::Missing | AuthError::MissingIdentity) => {
                "Authentication required"
            }
            AppError::Auth(AuthError::InvalidOrExpired(_)) => "Invalid or expired token",
            AppError::Auth(AuthError::Forbidden { .. }) => "Insufficient permissions",
            AppError::RateLimit(_) => "Too many requests, please try again later",
            AppError::Validation(_) => "Request validation failed",
            AppError::Conflict(_) => "Resource conflict",
            AppError::NotFound => "Resource not found",
            AppError::MethodNotAllowed => "Method not allowed",
            AppError::PayloadTooLarge => "Request payload too large",
            AppError::BadGateway(_) => "Upstream service unavailable",
            AppError::Timeout => "Upstream service timed out",
            AppError::Internal(_) => "Internal server error",
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            status: self.status(),
            error_code: self.error_code(),
            message: self.public_message(),
            cause: self.to_string(),
        }
    }

    fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            AppError::RateLimit(RateLimitError::TooManyRequests { retry_after, .. }) => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
            _ => None,
        }
    }
}

/// Classified failure riding on the response extensions until the boundary
/// middleware renders and logs it.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: &'static str,
    pub cause: String,
}

impl ErrorReport {
    pub fn body(&self, path: &str, at: DateTime<Utc>) -> ErrorBody {
        ErrorBody {
            success: false,
            status_code: self.status.as_u16(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            path: path.to_string(),
            message: self.message,
            error_code: self.error_code,
        }
    }

    pub fn log(&self, request_id: &str, path: &str) {
        let status = self.status.as_u16();
        if self.status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                path = %path,
                status,
                error_code = self.error_code,
                cause = %self.cause,
                "request failed"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                path = %path,
                status,
                error_code = self.error_code,
                cause = %self.cause,
                "request rejected"
            );
        }
    }
}

/// Canonical failure body returned by every service in the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub status_code: u16,
    pub timestamp: String,
    pub path: String,
    pub message: &'static str,
    pub error_code: &'static str,
}

/// Maps any pipeline failure into the canonical body.
pub fn normalize(error: &AppError, path: &str, at: DateTime<Utc>) -> ErrorBody {
    error.report().body(path, at)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let report = self.report();

        // path is unknown here; middleware::errors re-renders with the request path
        let mut res = (report.status, Json(report.body("", Utc::now()))).into_response();

        if let Some(secs) = self.retry_after_seconds() {
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        res.extensions_mut().insert(report);
        res
    }
}
