use super::RouteTable;
use crate::guard::AccessPolicy;

/// Customer Dashboard Routes
///
/// Everything backed by user-scoped resources: cart, checkout, order history,
/// bookings and reviews. Each page refetches its resource on mount.
pub fn authenticated_routes() -> RouteTable {
    RouteTable::new()
        .route("/dashboard/user-home", AccessPolicy::RequiresSession)
        .route("/dashboard/cart", AccessPolicy::RequiresSession)
        // Checkout creates a payment intent, then records the payment.
        .route("/dashboard/payment", AccessPolicy::RequiresSession)
        .route("/dashboard/payment-history", AccessPolicy::RequiresSession)
        .route("/dashboard/reservations", AccessPolicy::RequiresSession)
        .route("/dashboard/review", AccessPolicy::RequiresSession)
        .route("/dashboard/bookings", AccessPolicy::RequiresSession)
}
