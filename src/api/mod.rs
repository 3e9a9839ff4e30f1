/*
 * Responsibility
 * - edge の URL 構造 (route_table) と転送 (proxy)
 * - v1 の宣言テーブルは api::v1::routes
 */
pub mod proxy;
pub mod route_table;
pub mod v1;
