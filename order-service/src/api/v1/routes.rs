/*
 * Responsibility
 * - order-service の URL 構造
 * - 認証は edge 側で済んでいる前提 (handler は TrustedIdentity を受け取るだけ)
 */
use axum::{Router, routing::get};

use order_edge::api::proxy::not_found;

use crate::api::v1::handlers::{health::health, orders::whoami};

pub fn routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/orders/whoami", get(whoami))
        .fallback(not_found)
}
