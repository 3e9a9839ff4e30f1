//! Error boundary: the single place where failures are rendered and logged.
//!
//! Anything below this layer returns `AppError`, whose response carries an
//! `ErrorReport` extension. The boundary swaps the provisional body for the
//! canonical one (with the original request path) and logs the internal cause
//! once. Responses without a report (successes, proxied downstream responses)
//! pass through untouched.

use axum::{
    Json,
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::error::ErrorReport;
use crate::middleware::http::REQUEST_ID_HEADER;

pub async fn normalize(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let res = next.run(req).await;

    let (mut parts, body) = res.into_parts();
    let Some(report) = parts.extensions.remove::<ErrorReport>() else {
        return Response::from_parts(parts, body);
    };

    report.log(&request_id, &path);
    parts.headers.remove(header::CONTENT_LENGTH);
    (parts, Json(report.body(&path, Utc::now()))).into_response()
}
