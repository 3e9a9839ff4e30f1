/*
 * Responsibility
 * - GET /health (疎通用)
 * - edge 自身が返す。upstream には転送しない (rate limit は掛かる)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
