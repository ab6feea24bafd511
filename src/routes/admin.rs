use super::RouteTable;
use crate::guard::{AccessPolicy, Role};

/// Admin Routes
///
/// Back office. Requires a session and a resolved-true role lookup; the guard
/// stays `Pending` while the lookup is in flight.
pub fn admin_routes() -> RouteTable {
    let admin = AccessPolicy::RequiresRole(Role::Admin);
    RouteTable::new()
        .route("/dashboard", admin)
        .route("/dashboard/admin-home", admin)
        .route("/dashboard/users", admin)
        // Menu writes invalidate the cached public menu.
        .route("/dashboard/add-items", admin)
        .route("/dashboard/manage-items", admin)
        .route("/dashboard/update-item/{id}", admin)
        .route("/dashboard/manage-bookings", admin)
}
