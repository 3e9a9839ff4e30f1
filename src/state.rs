/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - verifier: ClaimsVerifier, limiter: RateLimiter, forwarder: dyn Forwarder
 * - Clone 前提で持つ (内部は Arc)
 */
use std::fmt;
use std::sync::Arc;

use crate::services::auth::ClaimsVerifier;
use crate::services::rate_limit::RateLimiter;
use crate::services::upstream::Forwarder;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<ClaimsVerifier>,
    pub limiter: Arc<RateLimiter>,
    pub forwarder: Arc<dyn Forwarder>,
}

impl AppState {
    pub fn new(
        verifier: Arc<ClaimsVerifier>,
        limiter: Arc<RateLimiter>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            verifier,
            limiter,
            forwarder,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("verifier", &self.verifier)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}
