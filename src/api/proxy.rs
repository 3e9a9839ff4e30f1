/*
 * Responsibility
 * - RouteTable → axum Router の組み立て
 * - route ごとに RoutePolicy を Extension として載せ、access::authorize を掛ける
 * - マッチした request を Forwarder で upstream へ転送
 * - 未知の path は 404、宣言されていない method は 405 (どちらも AppError)
 */
use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{Request, State},
    handler::Handler,
    response::Response,
    routing::{MethodFilter, MethodRouter},
};
use tower::ServiceBuilder;

use crate::api::route_table::{RoutePolicy, RouteTable, RouteTableError};
use crate::error::AppError;
use crate::middleware::auth::access;
use crate::state::AppState;

async fn forward(
    State(state): State<AppState>,
    Extension(policy): Extension<Arc<RoutePolicy>>,
    req: Request,
) -> Result<Response, AppError> {
    state.forwarder.forward(&policy.upstream, req).await
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub fn router(table: &RouteTable, state: &AppState) -> Result<Router<AppState>, RouteTableError> {
    let mut by_path: BTreeMap<String, MethodRouter<AppState>> = BTreeMap::new();

    for policy in table.policies()? {
        let filter = MethodFilter::try_from(policy.method.clone())
            .map_err(|_| RouteTableError::UnsupportedMethod(policy.id()))?;

        let handler = forward.layer(
            ServiceBuilder::new()
                .layer(Extension(policy.clone()))
                .layer(axum::middleware::from_fn_with_state(
                    state.verifier.clone(),
                    access::authorize,
                )),
        );

        let path = policy.path.clone();
        let method_router = by_path
            .remove(&path)
            .unwrap_or_else(MethodRouter::new)
            .on(filter, handler);
        by_path.insert(path, method_router);
    }

    let router = by_path
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| {
            router.route(&path, method_router.fallback(method_not_allowed))
        })
        .fallback(not_found);

    Ok(router)
}
