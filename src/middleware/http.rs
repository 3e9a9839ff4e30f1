//! HTTP-level middleware shared by the edge and downstream services.
//!
//! Responsibility:
//! - Correlation id (`x-request-id`): reuse the caller's value verbatim, otherwise
//!   generate one; always echo it on the response
//! - Access logging / request tracing (TraceLayer), spans carry the correlation id
//! - Error boundary (see `middleware::errors`)
//! - Body size limit and whole-request timeout

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    error_handling::HandleErrorLayer,
    extract::FromRequestParts,
    http::{HeaderName, Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::errors;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Upper bound for buffered request bodies.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Correlation id of the current request, for handlers that need to pass it on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn from_parts(parts: &Parts) -> Option<Self> {
        parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| Self(s.to_string()))
    }
}

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // SetRequestIdLayer runs first, so the header is normally present.
        Ok(Self::from_parts(parts).unwrap_or_else(|| Self(Uuid::new_v4().to_string())))
    }
}

fn make_span(req: &Request<Body>) -> Span {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "http",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = %request_id,
    )
}

/// Turn a declared oversized body into an `AppError` before RequestBodyLimitLayer
/// answers with its own plain-text 413. Streamed bodies without a length are
/// caught where they are read.
async fn reject_oversized(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    if declared.is_some_and(|len| len > MAX_BODY_BYTES as u64) {
        return Err(AppError::PayloadTooLarge);
    }
    Ok(next.run(req).await)
}

async fn handle_layer_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout
    } else {
        AppError::internal(err)
    }
}

/// Apply HTTP-level middleware to the given Router.
///
/// Order (outermost first): request id → propagate → trace → error boundary →
/// declared-size check → layer-error mapping → body limit → timeout.
///
/// TraceLayer does not log failures: the error boundary already logs each one.
pub fn apply(router: Router, request_timeout: Duration) -> Router {
    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_span)
                .on_failure(()),
        )
        .layer(axum::middleware::from_fn(errors::normalize))
        .layer(axum::middleware::from_fn(reject_oversized))
        .layer(HandleErrorLayer::new(handle_layer_error))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(request_timeout));

    router.layer(layers)
}
