//! CORS for browser clients of the edge.
//!
//! Wrapped around everything else in `app::run`, so a preflight is answered
//! before it can consume rate-limit quota or fail authentication.
//! Credentials are never allowed; bearer tokens travel in `Authorization`.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::Config;
use crate::middleware::http::REQUEST_ID_HEADER;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(60 * 10);

/// Production: exact match against `CORS_ALLOWED_ORIGINS` (empty list admits nobody).
/// Development: any origin.
fn allowed_origins(config: &Config) -> AllowOrigin {
    if !config.app_env.is_production() {
        return AllowOrigin::any();
    }

    let allowed: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();

    AllowOrigin::predicate(move |origin: &HeaderValue, _req| allowed.contains(origin))
}

pub fn layer(config: &Config) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins(config))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, REQUEST_ID_HEADER])
        // clients read the correlation id and the 429 back-off
        .expose_headers([REQUEST_ID_HEADER, header::RETRY_AFTER])
        .max_age(PREFLIGHT_MAX_AGE)
}

pub fn apply(router: Router, config: &Config) -> Router {
    router.layer(layer(config))
}
