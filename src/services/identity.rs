//! Trusted identity propagation between the edge and downstream services.
//!
//! Edge side: `strip` every inbound identity header, then `stamp` the verified
//! claims onto the request that is forwarded downstream.
//!
//! Downstream side: `extract` (or the `TrustedIdentity` extractor) reads the
//! assertion back. Downstream has no way to check authenticity; the assertion
//! is trusted only because the downstream listener is reachable from the edge
//! alone.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, request::Parts};
use serde::Serialize;

use crate::error::{AppError, AuthError};
use crate::services::auth::{ClaimSet, Role};

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
pub const USER_EMAIL_HEADER: HeaderName = HeaderName::from_static("x-user-email");
pub const USER_ROLE_HEADER: HeaderName = HeaderName::from_static("x-user-role");

const IDENTITY_HEADERS: [HeaderName; 3] = [USER_ID_HEADER, USER_EMAIL_HEADER, USER_ROLE_HEADER];

/// Remove any client-supplied identity headers (all occurrences).
pub fn strip(headers: &mut HeaderMap) {
    for name in IDENTITY_HEADERS {
        headers.remove(name);
    }
}

/// Annotate an outgoing request with the verified claim set.
///
/// Replaces whatever was there before. An email that cannot be carried as a
/// header value is an internal error, not a reason to forward a partial identity.
pub fn stamp(claims: &ClaimSet, headers: &mut HeaderMap) -> Result<(), AppError> {
    strip(headers);

    let user_id = HeaderValue::from_str(&claims.subject_id)
        .map_err(|e| AppError::internal(format!("subject not header-safe: {e}")))?;
    headers.insert(USER_ID_HEADER, user_id);

    if !claims.email.is_empty() {
        let email = HeaderValue::from_str(&claims.email)
            .map_err(|e| AppError::internal(format!("email not header-safe: {e}")))?;
        headers.insert(USER_EMAIL_HEADER, email);
    }

    headers.insert(
        USER_ROLE_HEADER,
        HeaderValue::from_static(claims.role.as_str()),
    );
    Ok(())
}

/// Identity asserted by the edge, as seen by a downstream service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedIdentity {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Read the assertion from an incoming downstream request.
pub fn extract(headers: &HeaderMap) -> Result<TrustedIdentity, AuthError> {
    let user_id = header_str(headers, &USER_ID_HEADER).ok_or(AuthError::MissingIdentity)?;

    Ok(TrustedIdentity {
        user_id: user_id.to_string(),
        email: header_str(headers, &USER_EMAIL_HEADER).map(str::to_string),
        role: header_str(headers, &USER_ROLE_HEADER).and_then(|r| r.parse().ok()),
    })
}

impl<S> FromRequestParts<S> for TrustedIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(extract(&parts.headers)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> ClaimSet {
        ClaimSet {
            subject_id: "user-7".into(),
            email: "seven@example.com".into(),
            role: Role::Admin,
        }
    }

    #[test]
    fn stamp_overwrites_forged_headers() {
        let mut headers = HeaderMap::new();
        headers.append(USER_ID_HEADER, HeaderValue::from_static("attacker"));
        headers.append(USER_ID_HEADER, HeaderValue::from_static("attacker-2"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("ADMIN"));

        stamp(&claims(), &mut headers).unwrap();

        let ids: Vec<_> = headers.get_all(USER_ID_HEADER).iter().collect();
        assert_eq!(ids, vec![&HeaderValue::from_static("user-7")]);
        assert_eq!(headers[USER_EMAIL_HEADER], "seven@example.com");
        assert_eq!(headers[USER_ROLE_HEADER], "ADMIN");
    }

    #[test]
    fn strip_removes_every_identity_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("forged"));
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("x@y"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("ADMIN"));
        strip(&mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn extract_round_trips_a_stamped_identity() {
        let mut headers = HeaderMap::new();
        stamp(&claims(), &mut headers).unwrap();
        let identity = extract(&headers).unwrap();
        assert_eq!(identity.user_id, "user-7");
        assert_eq!(identity.email.as_deref(), Some("seven@example.com"));
        assert_eq!(identity.role, Some(Role::Admin));
    }

    #[test]
    fn extract_without_user_id_is_missing_identity() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("USER"));
        assert!(matches!(extract(&headers), Err(AuthError::MissingIdentity)));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));
        assert!(matches!(extract(&headers), Err(AuthError::MissingIdentity)));
    }

    #[test]
    fn stamp_rejects_non_header_safe_subject() {
        let mut bad = claims();
        bad.subject_id = "line\nbreak".into();
        assert!(stamp(&bad, &mut HeaderMap::new()).is_err());
    }
}
