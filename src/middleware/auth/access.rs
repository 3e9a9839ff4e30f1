//! Per-route access control: bearer 検証 → role 判定 → identity ヘッダ付与
//!
//! - 受信した x-user-* は public route でも必ず消す (なりすまし防止)
//! - public route はここで終わり
//! - protected route は ClaimsVerifier → RouteAuth → identity::stamp の順
//! - 失敗は AppError で返すだけ。ログは middleware::errors に任せる

use std::sync::Arc;

use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::route_table::{PolicyAccess, RoutePolicy};
use crate::error::AppError;
use crate::services::auth::ClaimsVerifier;
use crate::services::identity;

pub async fn authorize(
    State(verifier): State<Arc<ClaimsVerifier>>,
    Extension(policy): Extension<Arc<RoutePolicy>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    identity::strip(req.headers_mut());

    let PolicyAccess::Authenticated(auth) = &policy.access else {
        return Ok(next.run(req).await);
    };

    let claims = verifier.authenticate(req.headers())?;
    auth.authorize(&claims)?;

    tracing::debug!(
        route = %policy.id(),
        subject = %claims.subject_id,
        role = %claims.role,
        "access granted"
    );

    identity::stamp(&claims, req.headers_mut())?;
    // handler から ClaimSet を参照したい場合のために extensions にも載せる
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
