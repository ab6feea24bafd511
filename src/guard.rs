use std::{fmt, sync::Arc};

use crate::{
    api::RestaurantApi,
    cache::{CacheEntry, Status},
    routes::RouteTable,
    session::{SessionManager, SessionState},
};

/// Elevated privilege a route can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// AccessPolicy
///
/// Attached to every client route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    Public,
    RequiresSession,
    RequiresRole(Role),
}

/// RoleLookup
///
/// Outcome of the cached "is this identity an administrator" query. `Loading`
/// covers both never-fetched and in-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleLookup {
    Loading,
    Resolved(bool),
    Failed,
}

impl From<&CacheEntry<bool>> for RoleLookup {
    fn from(entry: &CacheEntry<bool>) -> Self {
        match (entry.status, entry.data.as_deref()) {
            (Status::Ready, Some(is_admin)) => RoleLookup::Resolved(*is_admin),
            (Status::Error, _) => RoleLookup::Failed,
            _ => RoleLookup::Loading,
        }
    }
}

/// Decision
///
/// `Pending` is not a denial: the shell shows a placeholder rather than
/// flashing either the protected page or the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Allowed,
    Denied { redirect_to: String },
}

/// evaluate
///
/// Pure policy evaluation against a session snapshot and a role lookup result.
pub fn evaluate(
    policy: &AccessPolicy,
    session: &SessionState,
    role: &RoleLookup,
    login_route: &str,
) -> Decision {
    let denied = || Decision::Denied {
        redirect_to: login_route.to_string(),
    };

    match policy {
        AccessPolicy::Public => Decision::Allowed,
        AccessPolicy::RequiresSession => match session {
            SessionState::Restoring => Decision::Pending,
            SessionState::Anonymous => denied(),
            SessionState::Active(_) => Decision::Allowed,
        },
        AccessPolicy::RequiresRole(Role::Admin) => match (session, role) {
            (SessionState::Restoring, _) => Decision::Pending,
            (SessionState::Anonymous, _) => denied(),
            (SessionState::Active(_), RoleLookup::Loading) => Decision::Pending,
            (SessionState::Active(_), RoleLookup::Resolved(true)) => Decision::Allowed,
            (SessionState::Active(_), RoleLookup::Resolved(false) | RoleLookup::Failed) => {
                denied()
            }
        },
    }
}

/// AccessGuard
///
/// Route-entry evaluator wired to the live session and the role lookup resource.
#[derive(Clone)]
pub struct AccessGuard {
    session: Arc<SessionManager>,
    api: RestaurantApi,
    routes: Arc<RouteTable>,
}

impl AccessGuard {
    pub fn new(session: Arc<SessionManager>, api: RestaurantApi, routes: RouteTable) -> Self {
        Self {
            session,
            api,
            routes: Arc::new(routes),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Non-blocking decision from what is already known. Never starts a fetch.
    pub fn decide_now(&self, path: &str) -> Decision {
        let policy = self.routes.policy_for(path);
        let state = self.session.state();
        let role = match state.session() {
            Some(session) => RoleLookup::from(&self.api.role_entry(&session.identity.email)),
            None => RoleLookup::Loading,
        };
        evaluate(&policy, &state, &role, self.session.login_route())
    }

    /// check
    ///
    /// Full evaluation on route entry: resolves the role lookup through the
    /// cache when the policy needs it, then decides.
    pub async fn check(&self, path: &str) -> Decision {
        let policy = self.routes.policy_for(path);

        let role = match (&policy, self.session.identity()) {
            (AccessPolicy::RequiresRole(_), Some(identity)) => {
                match self.api.is_admin(&identity.email).await {
                    Ok(is_admin) => RoleLookup::Resolved(is_admin),
                    Err(e) => {
                        tracing::debug!(path, error = %e, "role lookup failed");
                        RoleLookup::Failed
                    }
                }
            }
            _ => RoleLookup::Loading,
        };

        // Re-read: a rejected credential during the lookup ends the session.
        let state = self.session.state();
        let decision = evaluate(&policy, &state, &role, self.session.login_route());
        tracing::debug!(path, ?policy, ?decision, "route evaluated");
        decision
    }
}
