/*
 * Responsibility
 * - 環境変数の読み込み (PORT, JWT_*, RATE_LIMIT_*, *_SERVICE_URL, CORS など)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 * - テストからは from_lookup で任意の key/value を渡せる
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use thiserror::Error;
use url::Url;

use crate::services::rate_limit::RateLimitPolicy;

/// Minimum HMAC secret length accepted in production.
pub const MIN_PRODUCTION_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("APP_ENV").ok().as_deref())
    }

    pub fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub leeway_seconds: u64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("leeway_seconds", &self.leeway_seconds)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub policy: RateLimitPolicy,
    /// Background sweep period. `None` leaves cleanup to the probabilistic sweep.
    pub sweep_interval: Option<Duration>,
}

/// Origins of the downstream services the edge forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstreams {
    pub users: Url,
    pub menu: Url,
    pub cart: Url,
    pub orders: Url,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub request_timeout: Duration,
    pub upstreams: Upstreams,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid(key))
        }
        _ => Ok(default),
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn upstream(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<Url, ConfigError> {
    let raw = optional(lookup, key).unwrap_or_else(|| default.to_string());
    let url = Url::parse(&raw).map_err(|_| ConfigError::Invalid(key))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ConfigError::Invalid(key)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = parse_or(&lookup, "PORT", 3000)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let secret = optional(&lookup, "JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if app_env.is_production() && secret.len() < MIN_PRODUCTION_SECRET_BYTES {
            return Err(ConfigError::Invalid("JWT_SECRET"));
        }

        let algorithm: Algorithm = parse_or(&lookup, "JWT_ALGORITHM", Algorithm::HS256)?;
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(ConfigError::Invalid("JWT_ALGORITHM"));
        }

        let jwt = JwtConfig {
            secret,
            algorithm,
            leeway_seconds: parse_or(&lookup, "JWT_LEEWAY_SECONDS", 0)?,
            issuer: optional(&lookup, "JWT_ISSUER"),
            audience: optional(&lookup, "JWT_AUDIENCE"),
        };

        let defaults = RateLimitPolicy::default();
        let window_seconds: u64 = parse_or(
            &lookup,
            "RATE_LIMIT_WINDOW_SECONDS",
            defaults.window.as_secs(),
        )?;
        if window_seconds == 0 {
            return Err(ConfigError::Invalid("RATE_LIMIT_WINDOW_SECONDS"));
        }
        let max_requests: usize =
            parse_or(&lookup, "RATE_LIMIT_MAX_REQUESTS", defaults.max_requests)?;
        if max_requests == 0 {
            return Err(ConfigError::Invalid("RATE_LIMIT_MAX_REQUESTS"));
        }
        let sweep_probability: f64 = parse_or(
            &lookup,
            "RATE_LIMIT_SWEEP_PROBABILITY",
            defaults.sweep_probability,
        )?;
        if !(0.0..=1.0).contains(&sweep_probability) {
            return Err(ConfigError::Invalid("RATE_LIMIT_SWEEP_PROBABILITY"));
        }
        let sweep_interval = match optional(&lookup, "RATE_LIMIT_SWEEP_INTERVAL_SECONDS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => return Err(ConfigError::Invalid("RATE_LIMIT_SWEEP_INTERVAL_SECONDS")),
            },
            None => None,
        };

        let rate_limit = RateLimitConfig {
            policy: RateLimitPolicy {
                window: Duration::from_secs(window_seconds),
                max_requests,
                sweep_probability,
            },
            sweep_interval,
        };

        let timeout_seconds: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?;
        if timeout_seconds == 0 {
            return Err(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"));
        }

        let upstreams = Upstreams {
            users: upstream(&lookup, "USER_SERVICE_URL", "http://127.0.0.1:4001")?,
            menu: upstream(&lookup, "MENU_SERVICE_URL", "http://127.0.0.1:4002")?,
            cart: upstream(&lookup, "CART_SERVICE_URL", "http://127.0.0.1:4003")?,
            orders: upstream(&lookup, "ORDER_SERVICE_URL", "http://127.0.0.1:4004")?,
        };

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            jwt,
            rate_limit,
            request_timeout: Duration::from_secs(timeout_seconds),
            upstreams,
        })
    }
}
