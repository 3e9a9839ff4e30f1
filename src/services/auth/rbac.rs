//! Role requirement resolution and the allow/deny decision.
//!
//! Requirements are declared twice at most: once on the route group and once on
//! the individual route. The route-level declaration replaces the group-level
//! one outright (no union, no intersection).

use std::collections::BTreeSet;

use crate::error::AuthError;
use crate::services::auth::claims::{ClaimSet, Role};

/// Role restriction attached to a route or a route group at registration time.
///
/// An empty set means "any authenticated identity".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteAuthSpec {
    required_roles: BTreeSet<Role>,
}

impl RouteAuthSpec {
    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            required_roles: roles.into_iter().collect(),
        }
    }

    /// Authenticated-only: no role restriction.
    pub fn any_role() -> Self {
        Self::default()
    }

    pub fn required_roles(&self) -> &BTreeSet<Role> {
        &self.required_roles
    }

    fn describe(&self) -> String {
        self.required_roles
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Both declaration levels for one route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteAuth {
    pub handler: Option<RouteAuthSpec>,
    pub group: Option<RouteAuthSpec>,
}

impl RouteAuth {
    pub fn new(handler: Option<RouteAuthSpec>, group: Option<RouteAuthSpec>) -> Self {
        Self { handler, group }
    }

    /// Handler-level spec wins; otherwise the group-level one; otherwise none.
    pub fn effective(&self) -> Option<&RouteAuthSpec> {
        self.handler.as_ref().or(self.group.as_ref())
    }

    pub fn resolve(&self, claims: &ClaimSet) -> Decision {
        decide(self.effective(), claims.role)
    }

    /// `resolve` lifted into the error taxonomy.
    pub fn authorize(&self, claims: &ClaimSet) -> Result<(), AuthError> {
        match self.resolve(claims) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenyReason {
    pub role: Role,
    pub required: String,
}

impl From<DenyReason> for AuthError {
    fn from(r: DenyReason) -> Self {
        AuthError::Forbidden {
            role: r.role,
            required: r.required,
        }
    }
}

/// Pure access decision over the effective requirement and the caller's role.
pub fn decide(required: Option<&RouteAuthSpec>, role: Role) -> Decision {
    match required {
        None => Decision::Allow,
        Some(spec) if spec.required_roles.is_empty() => Decision::Allow,
        Some(spec) if spec.required_roles.contains(&role) => Decision::Allow,
        Some(spec) => Decision::Deny(DenyReason {
            role,
            required: spec.describe(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role) -> ClaimSet {
        ClaimSet {
            subject_id: "u-1".into(),
            email: "u@example.com".into(),
            role,
        }
    }

    #[test]
    fn admin_only_route_denies_user_and_allows_admin() {
        let auth = RouteAuth::new(Some(RouteAuthSpec::roles([Role::Admin])), None);
        assert!(matches!(auth.resolve(&claims(Role::User)), Decision::Deny(_)));
        assert_eq!(auth.resolve(&claims(Role::Admin)), Decision::Allow);
    }

    #[test]
    fn empty_handler_spec_overrides_admin_group_spec() {
        let auth = RouteAuth::new(
            Some(RouteAuthSpec::any_role()),
            Some(RouteAuthSpec::roles([Role::Admin])),
        );
        assert_eq!(auth.resolve(&claims(Role::User)), Decision::Allow);
    }

    #[test]
    fn handler_spec_replaces_group_spec_instead_of_merging() {
        let auth = RouteAuth::new(
            Some(RouteAuthSpec::roles([Role::Admin])),
            Some(RouteAuthSpec::roles([Role::User, Role::Admin])),
        );
        assert!(matches!(auth.resolve(&claims(Role::User)), Decision::Deny(_)));
    }

    #[test]
    fn group_spec_applies_when_handler_is_silent() {
        let auth = RouteAuth::new(None, Some(RouteAuthSpec::roles([Role::Admin])));
        assert_eq!(
            auth.effective(),
            Some(&RouteAuthSpec::roles([Role::Admin]))
        );
        assert!(auth.authorize(&claims(Role::User)).is_err());
    }

    #[test]
    fn no_spec_at_all_allows_any_authenticated_identity() {
        let auth = RouteAuth::default();
        assert_eq!(auth.effective(), None);
        assert_eq!(auth.resolve(&claims(Role::User)), Decision::Allow);
    }

    #[test]
    fn denial_maps_to_forbidden() {
        let err = decide(Some(&RouteAuthSpec::roles([Role::Admin])), Role::User);
        let Decision::Deny(reason) = err else {
            panic!("expected deny");
        };
        assert!(matches!(
            AuthError::from(reason),
            AuthError::Forbidden { role: Role::User, .. }
        ));
    }
}
