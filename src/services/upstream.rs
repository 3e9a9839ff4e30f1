//! Forwarding of admitted requests to downstream services.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, HeaderValue, Request, Uri, header},
    response::Response,
};
use http_body_util::LengthLimitError;
use url::Url;

use crate::error::AppError;

/// Hop-by-hop headers plus everything the edge must not pass downstream.
///
/// Downstream services see the identity headers only, never the credential.
const STRIPPED_REQUEST_HEADERS: [HeaderName; 10] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
    header::AUTHORIZATION,
];

const STRIPPED_RESPONSE_HEADERS: [HeaderName; 6] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Sends a request to a downstream service and hands back its response.
///
/// Implementations must be cheap to share (`Arc<dyn Forwarder>` in `AppState`).
#[async_trait]
pub trait Forwarder: Send + Sync + 'static {
    async fn forward(&self, upstream: &Url, req: Request<Body>) -> Result<Response, AppError>;
}

/// Rebase the request path and query onto the upstream origin.
pub fn upstream_url(upstream: &Url, uri: &Uri) -> Url {
    let mut url = upstream.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url
}

pub fn outbound_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> HeaderMap {
    let mut out = headers.clone();
    for name in STRIPPED_REQUEST_HEADERS {
        out.remove(name);
    }
    out.remove(header::CONTENT_LENGTH);

    if let Some(peer) = peer {
        if let Ok(v) = HeaderValue::from_str(&peer.ip().to_string()) {
            out.append(X_FORWARDED_FOR, v);
        }
    }
    out
}

// The limit may trip here or in RequestBodyLimitLayer; either way the
// LengthLimitError sits somewhere in the source chain.
fn exceeds_length_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn inbound_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in STRIPPED_RESPONSE_HEADERS {
        out.remove(name);
    }
    out
}

/// reqwest-backed forwarder used in production.
#[derive(Clone, Debug)]
pub struct HttpForwarder {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpForwarder {
    pub fn new(timeout: Duration, max_body_bytes: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            max_body_bytes,
        })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, upstream: &Url, req: Request<Body>) -> Result<Response, AppError> {
        let (parts, body) = req.into_parts();
        let url = upstream_url(upstream, &parts.uri);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| {
                if exceeds_length_limit(&e) {
                    AppError::PayloadTooLarge
                } else {
                    AppError::Validation(format!("unreadable request body: {e}"))
                }
            })?;

        let res = self
            .client
            .request(parts.method, url.clone())
            .headers(outbound_headers(&parts.headers, peer))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout
                } else {
                    AppError::BadGateway(format!("{url}: {e}"))
                }
            })?;

        let status = res.status();
        let headers = inbound_headers(res.headers());
        let bytes = res
            .bytes()
            .await
            .map_err(|e| AppError::BadGateway(format!("{url}: reading body: {e}")))?;

        let mut out = Response::new(Body::from(bytes));
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}
