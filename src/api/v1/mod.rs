/*
 * Responsibility
 * - v1 の後悔ポイント (route_table() の re-export など)
 */
pub mod handlers;
mod routes;

pub use routes::route_table;
