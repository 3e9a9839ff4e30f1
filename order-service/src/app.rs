/*
 * Responsibility
 * - Config読み込み → Router 組み立て → axum::serve()
 * - tracing / panic hook / http layer は order-edge と共通のものを使う
 */
use anyhow::Result;
use axum::Router;

use order_edge::app::{init_panic_hook, init_tracing};
use order_edge::middleware;

use crate::api;
use crate::config::Config;

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    if !config.is_internal_only() {
        // x-user-* を検証せずに信用するため、edge 以外から届く場所で listen しない
        tracing::warn!(
            addr = %config.addr,
            "order-service is bound to a non-private address; identity headers can be forged by anyone who reaches it"
        );
    }

    tracing::info!(
        "starting order-service in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let app = build_router(&config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(config: &Config) -> Router {
    middleware::http::apply(api::v1::routes(), config.request_timeout)
}
