pub mod claims;
pub mod rbac;
pub mod verifier;

pub use claims::{ClaimSet, Role};
pub use rbac::{Decision, RouteAuth, RouteAuthSpec};
pub use verifier::{ClaimsVerifier, VerifyError, bearer_token};
