pub mod auth;
pub mod cors;
pub mod errors;
pub mod http;
pub mod rate_limit;
