/*
 * Responsibility
 * - GET /api/v1/orders/whoami
 * - edge が付与した identity をそのまま返す (x-user-id が無ければ 401)
 */
use axum::Json;

use order_edge::middleware::http::CorrelationId;
use order_edge::services::identity::TrustedIdentity;

pub async fn whoami(
    CorrelationId(request_id): CorrelationId,
    identity: TrustedIdentity,
) -> Json<TrustedIdentity> {
    tracing::debug!(request_id = %request_id, user_id = %identity.user_id, "whoami");
    Json(identity)
}
