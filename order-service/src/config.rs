/*
 * Responsibility
 * - order-service の設定 (ORDER_SERVICE_ADDR, APP_ENV, REQUEST_TIMEOUT_SECONDS)
 * - identity ヘッダを信用する前提なので、外部から届く bind address は警告する
 */
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use order_edge::config::{AppEnv, ConfigError};

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr: SocketAddr = match lookup("ORDER_SERVICE_ADDR") {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("ORDER_SERVICE_ADDR"))?,
            _ => SocketAddr::from(([127, 0, 0, 1], 4004)),
        };

        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let timeout_seconds: u64 = match lookup("REQUEST_TIMEOUT_SECONDS") {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"))?,
            _ => 30,
        };

        Ok(Self {
            addr,
            app_env,
            request_timeout: Duration::from_secs(timeout_seconds),
        })
    }

    /// Whether the listener is only reachable from a private network.
    pub fn is_internal_only(&self) -> bool {
        match self.addr.ip() {
            IpAddr::V4(ip) => ip.is_loopback() || ip.is_private(),
            IpAddr::V6(ip) => ip.is_loopback() || ip.is_unique_local(),
        }
    }
}
