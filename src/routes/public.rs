use super::RouteTable;
use crate::guard::AccessPolicy;

/// Public Routes
///
/// Browsing and the sign-in pages. The menu behind `/menu` and
/// `/order/{category}` is read through the plain transport.
pub fn public_routes() -> RouteTable {
    RouteTable::new()
        .route("/", AccessPolicy::Public)
        // Full menu and per-category ordering pages.
        .route("/menu", AccessPolicy::Public)
        .route("/order/{category}", AccessPolicy::Public)
        // Public entry points; the guard redirects here on denial.
        .route("/login", AccessPolicy::Public)
        .route("/signup", AccessPolicy::Public)
}
