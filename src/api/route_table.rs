//! Route registration table.
//!
//! Every proxied route is declared here once, with its upstream and its role
//! requirement, and turned into a [`RoutePolicy`] at startup. There is no
//! runtime discovery: a route missing from the table does not exist.

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::services::auth::{RouteAuth, RouteAuthSpec};

/// Handler-level access declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    /// No credential needed. Identity headers are still stripped.
    Public,
    /// Credential required. `Some` overrides the group-level spec.
    Protected(Option<RouteAuthSpec>),
}

#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub access: RouteAccess,
}

#[derive(Debug, Clone)]
pub struct RouteGroup {
    pub prefix: String,
    pub upstream: Url,
    pub spec: Option<RouteAuthSpec>,
    pub routes: Vec<Route>,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>, upstream: Url) -> Self {
        Self {
            prefix: prefix.into(),
            upstream,
            spec: None,
            routes: Vec::new(),
        }
    }

    /// Group-level requirement for every protected route without its own spec.
    pub fn require(mut self, spec: RouteAuthSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn public(self, method: Method, path: &str) -> Self {
        self.push(method, path, RouteAccess::Public)
    }

    pub fn protected(self, method: Method, path: &str) -> Self {
        self.push(method, path, RouteAccess::Protected(None))
    }

    pub fn protected_with(self, method: Method, path: &str, spec: RouteAuthSpec) -> Self {
        self.push(method, path, RouteAccess::Protected(Some(spec)))
    }

    fn push(mut self, method: Method, path: &str, access: RouteAccess) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            access,
        });
        self
    }

    fn full_path(&self, route: &Route) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        if route.path.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}{}", route.path)
        }
    }
}

/// How the access middleware treats a matched route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAccess {
    Public,
    Authenticated(RouteAuth),
}

/// Resolved per-route entry, attached to the axum handler as an extension.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    pub method: Method,
    pub path: String,
    pub upstream: Url,
    pub access: PolicyAccess,
}

impl RoutePolicy {
    /// Route identifier used in logs, `"<METHOD> <path>"`.
    pub fn id(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn is_public(&self) -> bool {
        matches!(self.access, PolicyAccess::Public)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route declared twice: {0}")]
    Duplicate(String),
    #[error("route path must start with '/': {0}")]
    InvalidPath(String),
    #[error("method cannot be routed: {0}")]
    UnsupportedMethod(String),
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    groups: Vec<RouteGroup>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: RouteGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Flatten groups into per-route policies, rejecting ambiguous declarations.
    pub fn policies(&self) -> Result<Vec<Arc<RoutePolicy>>, RouteTableError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for group in &self.groups {
            for route in &group.routes {
                let path = group.full_path(route);
                if !path.starts_with('/') {
                    return Err(RouteTableError::InvalidPath(path));
                }

                let policy = RoutePolicy {
                    method: route.method.clone(),
                    path,
                    upstream: group.upstream.clone(),
                    access: match &route.access {
                        RouteAccess::Public => PolicyAccess::Public,
                        RouteAccess::Protected(handler) => PolicyAccess::Authenticated(
                            RouteAuth::new(handler.clone(), group.spec.clone()),
                        ),
                    },
                };

                if !seen.insert((policy.method.clone(), policy.path.clone())) {
                    return Err(RouteTableError::Duplicate(policy.id()));
                }
                out.push(Arc::new(policy));
            }
        }
        Ok(out)
    }
}
