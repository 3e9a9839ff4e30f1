use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::Deserialize;

use crate::error::AuthError;
use crate::services::auth::claims::{ClaimSet, Role};

/// Specific reason a credential was rejected.
///
/// Only ever reported to the log sink; callers get one undifferentiated 401.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("token expired")]
    Expired,
    #[error("signature mismatch")]
    InvalidSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported signing algorithm {0:?} (expected HS256, HS384 or HS512)")]
pub struct UnsupportedAlgorithm(pub Algorithm);

// Token payload as issued by the user service. `id` is accepted as a legacy
// spelling of `sub`, either as a string or a number.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: Option<Subject>,
    #[serde(default)]
    id: Option<Subject>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Subject {
    Text(String),
    Number(i64),
}

impl Subject {
    fn into_string(self) -> String {
        match self {
            Subject::Text(s) => s.trim().to_string(),
            Subject::Number(n) => n.to_string(),
        }
    }
}

/// Extracts the bearer credential from `Authorization`.
///
/// Anything other than `Bearer <non-empty token>` is `AuthError::Missing`, so no
/// cryptographic work is spent on structurally invalid input.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Missing)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::Missing)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Missing);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Missing);
    }
    Ok(token)
}

/// HMAC bearer-token verifier (signature + expiry, optional iss/aud).
///
/// Stateless and deterministic: verifying the same token twice yields the same
/// result. Key material is not printable via Debug.
#[derive(Clone)]
pub struct ClaimsVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for ClaimsVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("ClaimsVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl ClaimsVerifier {
    pub fn new(
        secret: &[u8],
        algorithm: Algorithm,
        leeway_seconds: u64,
    ) -> Result<Self, UnsupportedAlgorithm> {
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(UnsupportedAlgorithm(algorithm));
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = leeway_seconds;
        validation.validate_exp = true;
        validation.validate_aud = false;

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    /// Verify signature and expiry, then build the canonical claim set.
    pub fn verify(&self, token: &str) -> Result<ClaimSet, VerifyError> {
        let data =
            jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;

        let subject_id = claims
            .sub
            .or(claims.id)
            .map(Subject::into_string)
            .unwrap_or_default();
        if subject_id.is_empty() {
            return Err(VerifyError::Malformed("empty subject".into()));
        }

        let role = claims
            .role
            .ok_or_else(|| VerifyError::Malformed("missing role".into()))?
            .parse::<Role>()
            .map_err(|e| VerifyError::Malformed(e.to_string()))?;

        Ok(ClaimSet {
            subject_id,
            email: claims.email.unwrap_or_default(),
            role,
        })
    }

    /// Header extraction + verification in one step, collapsing every failure
    /// into the caller-visible `AuthError` taxonomy.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<ClaimSet, AuthError> {
        let token = bearer_token(headers)?;
        Ok(self.verify(token)?)
    }
}
