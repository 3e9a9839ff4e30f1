//! Per-client admission control in front of every route.
//!
//! The client key is the peer IP from `ConnectInfo`. When the server was not
//! started with connect info (tests, unusual embeddings) every request shares
//! one bucket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::{AppError, RateLimitError};
use crate::services::rate_limit::{Admission, RateLimiter};

pub const FALLBACK_CLIENT_KEY: &str = "global";

pub fn client_key<B>(req: &axum::http::Request<B>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| FALLBACK_CLIENT_KEY.to_string())
}

pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(&req);

    match limiter.admit(&key) {
        Admission::Allowed { .. } => Ok(next.run(req).await),
        Admission::Denied { retry_after } => Err(RateLimitError::TooManyRequests {
            client: key,
            retry_after,
        }
        .into()),
    }
}
