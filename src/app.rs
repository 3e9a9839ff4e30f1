/*
 * Responsibility
 * - Config読み込み → 依存生成 (verifier / limiter / forwarder) → Router 組み立て
 * - Middleware の適用 (rate limit / http / CORS)
 * - axum::serve() で起動 (ConnectInfo 付き)
 */
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::{panic, process};

use anyhow::Result;
use axum::{Router, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{self, route_table::RouteTable, route_table::RouteTableError};
use crate::config::Config;
use crate::middleware;
use crate::services::auth::ClaimsVerifier;
use crate::services::rate_limit::{RateLimiter, spawn_sweeper};
use crate::services::upstream::HttpForwarder;
use crate::state::AppState;

pub fn init_tracing() {
    // RUST_LOG があればそれを優先
    // ex: RUST_LOG=info,order_edge=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development では即落として気付けるようにする
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting edge in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;
    if let Some(every) = config.rate_limit.sweep_interval {
        spawn_sweeper(state.limiter.clone(), every);
    }

    let table = api::v1::route_table(&config.upstreams);
    let app = build_router(state, &table, config.request_timeout)?;
    let app = middleware::cors::apply(app, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

pub fn build_state(config: &Config) -> Result<AppState> {
    let mut verifier = ClaimsVerifier::new(
        config.jwt.secret.as_bytes(),
        config.jwt.algorithm,
        config.jwt.leeway_seconds,
    )?;
    if let Some(issuer) = &config.jwt.issuer {
        verifier = verifier.with_issuer(issuer);
    }
    if let Some(audience) = &config.jwt.audience {
        verifier = verifier.with_audience(audience);
    }

    let limiter = RateLimiter::new(config.rate_limit.policy);
    let forwarder = HttpForwarder::new(config.request_timeout, middleware::http::MAX_BODY_BYTES)?;

    Ok(AppState::new(
        Arc::new(verifier),
        Arc::new(limiter),
        Arc::new(forwarder),
    ))
}

/// Edge router without CORS. Every route, including `/health` and the
/// 404/405 fallbacks, goes through rate limiting and the HTTP layers.
pub fn build_router(
    state: AppState,
    table: &RouteTable,
    request_timeout: Duration,
) -> Result<Router, RouteTableError> {
    let router = api::proxy::router(table, &state)?
        .route("/health", get(api::v1::handlers::health::health))
        .layer(axum::middleware::from_fn_with_state(
            state.limiter.clone(),
            middleware::rate_limit::enforce,
        ))
        .with_state(state);

    Ok(middleware::http::apply(router, request_timeout))
}
