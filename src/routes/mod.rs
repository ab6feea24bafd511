//! Route Table Module Index
//!
//! Client routes grouped by the access they demand, one module per policy.
//! `route_table()` merges them; anything not listed falls back to
//! `RequiresSession` so a forgotten route is never silently public.

use crate::guard::AccessPolicy;

/// Pages anyone may open.
pub mod public;

/// Pages that need a signed-in customer.
pub mod authenticated;

/// Back-office pages reserved for administrators.
pub mod admin;

/// RouteTable
///
/// Ordered `(pattern, policy)` pairs. Patterns are `/`-separated; a `{name}`
/// segment matches any single segment. First match wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<(String, AccessPolicy)>,
    fallback: AccessPolicy,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: AccessPolicy::RequiresSession,
        }
    }

    pub fn route(mut self, pattern: &str, policy: AccessPolicy) -> Self {
        self.routes.push((pattern.to_string(), policy));
        self
    }

    pub fn merge(mut self, other: RouteTable) -> Self {
        self.routes.extend(other.routes);
        self
    }

    pub fn policy_for(&self, path: &str) -> AccessPolicy {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        self.routes
            .iter()
            .find(|(pattern, _)| matches(pattern, path))
            .map(|(_, policy)| *policy)
            .unwrap_or(self.fallback)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, AccessPolicy)> {
        self.routes.iter().map(|(p, policy)| (p.as_str(), *policy))
    }
}

fn matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    pattern.len() == path.len()
        && pattern
            .iter()
            .zip(&path)
            .all(|(p, s)| (p.starts_with('{') && p.ends_with('}')) || p == s)
}

/// The full client route table.
pub fn route_table() -> RouteTable {
    RouteTable::new()
        .merge(admin::admin_routes())
        .merge(authenticated::authenticated_routes())
        .merge(public::public_routes())
}
