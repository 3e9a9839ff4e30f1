/*
 * Responsibility
 * - order-edge: 注文アプリの edge gateway
 *   - bearer 検証 (ClaimsVerifier) → role 判定 (RouteAuth) → identity 伝播
 *   - client 単位の sliding window rate limit
 *   - correlation id と、失敗時の共通エラー形式
 * - downstream service からも services::identity / middleware::http を使う
 */
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
