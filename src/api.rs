use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

use crate::{
    auth_client::{AuthenticatedClient, public_json},
    cache::{CacheEntry, CacheKey, ResourceCache, ResourceHandle, ResourceOptions},
    error::Result,
    models::{
        CartItem, MenuItem, Payment, PaymentIntent, Reservation, Review, UserRecord, WriteAck,
    },
    transport::{HttpRequest, TransportState},
};

// Cache resource names.
pub const MENU: &str = "menu";
pub const CART: &str = "carts";
pub const PAYMENTS: &str = "payments";
pub const ALL_ORDERS: &str = "orders";
pub const RESERVATIONS: &str = "reservations";
pub const REVIEWS: &str = "reviews";
pub const USERS: &str = "users";
pub const ROLE: &str = "user-role";

/// RestaurantApi
///
/// Typed bindings for the remote API. Reads go through the resource cache with
/// the staleness policy of their resource; writes run through the owning
/// resource's handle so the affected key is refetched afterwards.
///
/// The menu is the only public resource and the only one cached indefinitely.
#[derive(Clone)]
pub struct RestaurantApi {
    client: AuthenticatedClient,
    transport: TransportState,
    cache: ResourceCache,
    invalidate_menu_on_admin_write: bool,
}

impl RestaurantApi {
    pub fn new(
        client: AuthenticatedClient,
        transport: TransportState,
        cache: ResourceCache,
        invalidate_menu_on_admin_write: bool,
    ) -> Self {
        Self {
            client,
            transport,
            cache,
            invalidate_menu_on_admin_write,
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    fn protected<T>(
        &self,
        key: CacheKey,
        request: HttpRequest,
        options: ResourceOptions,
    ) -> ResourceHandle<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let client = self.client.clone();
        self.cache.use_resource(
            key,
            move || {
                let client = client.clone();
                let request = request.renewed();
                async move { client.get_json::<T>(request).await }
            },
            options.protected(),
        )
    }

    // --- Menu (public) ---

    pub fn menu_resource(&self) -> ResourceHandle<Vec<MenuItem>> {
        let transport = self.transport.clone();
        self.cache.use_resource(
            CacheKey::global(MENU),
            move || {
                let transport = transport.clone();
                async move { public_json(&transport, HttpRequest::get("/menu")).await }
            },
            ResourceOptions::indefinite(),
        )
    }

    pub async fn menu(&self) -> Result<Arc<Vec<MenuItem>>> {
        self.menu_resource().load().await
    }

    // --- Cart ---

    pub fn cart_resource(&self, email: &str) -> ResourceHandle<Vec<CartItem>> {
        self.protected(
            CacheKey::user(CART, email),
            HttpRequest::get("/carts").with_query("email", email),
            ResourceOptions::refetch_on_mount(),
        )
    }

    pub async fn cart(&self, email: &str) -> Result<Arc<Vec<CartItem>>> {
        self.cart_resource(email).load().await
    }

    pub async fn add_to_cart(&self, item: &CartItem) -> Result<WriteAck> {
        self.cart_resource(&item.email)
            .mutate(self.client.send_json(Method::POST, "/carts", item))
            .await
    }

    pub async fn remove_from_cart(&self, email: &str, cart_item_id: &str) -> Result<WriteAck> {
        let path = format!("/carts/{cart_item_id}");
        self.cart_resource(email)
            .mutate(async {
                self.client
                    .send(HttpRequest::new(Method::DELETE, path))
                    .await?
                    .json()
            })
            .await
    }

    // --- Orders & payment ---

    pub fn orders_resource(&self, email: &str) -> ResourceHandle<Vec<Payment>> {
        self.protected(
            CacheKey::user(PAYMENTS, email),
            HttpRequest::get(format!("/payments/{email}")),
            ResourceOptions::refetch_on_mount(),
        )
    }

    pub async fn orders_for(&self, email: &str) -> Result<Arc<Vec<Payment>>> {
        self.orders_resource(email).load().await
    }

    /// Admin-wide order listing.
    pub fn all_orders_resource(&self) -> ResourceHandle<Vec<Payment>> {
        self.protected(
            CacheKey::global(ALL_ORDERS),
            HttpRequest::get("/orders"),
            ResourceOptions::refetch_on_mount(),
        )
    }

    pub async fn all_orders(&self) -> Result<Arc<Vec<Payment>>> {
        self.all_orders_resource().load().await
    }

    /// Starts checkout. Not cached: every intent is single-use.
    pub async fn create_payment_intent(&self, price: f64) -> Result<PaymentIntent> {
        self.client
            .send_json(
                Method::POST,
                "/create-payment-intent",
                &json!({ "price": price }),
            )
            .await
    }

    /// Records a confirmed payment. The server empties the paid cart lines, so
    /// the cart is refetched along with the order history.
    pub async fn record_payment(&self, payment: &Payment) -> Result<WriteAck> {
        let ack = self
            .orders_resource(&payment.email)
            .mutate(self.client.send_json(Method::POST, "/payments", payment))
            .await?;
        self.cart_resource(&payment.email)
            .refresh_after_write()
            .await;
        self.cache.invalidate(&CacheKey::global(ALL_ORDERS));
        Ok(ack)
    }

    // --- Reservations ---

    pub fn reservations_resource(&self, email: &str) -> ResourceHandle<Vec<Reservation>> {
        self.protected(
            CacheKey::user(RESERVATIONS, email),
            HttpRequest::get("/reservations").with_query("email", email),
            ResourceOptions::refetch_on_mount(),
        )
    }

    pub async fn reservations_for(&self, email: &str) -> Result<Arc<Vec<Reservation>>> {
        self.reservations_resource(email).load().await
    }

    pub async fn create_reservation(&self, reservation: &Reservation) -> Result<WriteAck> {
        let ack = self
            .reservations_resource(&reservation.email)
            .mutate(
                self.client
                    .send_json(Method::POST, "/reservations", reservation),
            )
            .await?;
        self.cache.invalidate(&CacheKey::global(RESERVATIONS));
        Ok(ack)
    }

    pub async fn cancel_reservation(&self, email: &str, reservation_id: &str) -> Result<WriteAck> {
        let path = format!("/reservations/{reservation_id}");
        let ack = self
            .reservations_resource(email)
            .mutate(async {
                self.client
                    .send(HttpRequest::new(Method::DELETE, path))
                    .await?
                    .json()
            })
            .await?;
        self.cache.invalidate(&CacheKey::global(RESERVATIONS));
        Ok(ack)
    }

    /// Admin-wide booking listing.
    pub fn all_reservations_resource(&self) -> ResourceHandle<Vec<Reservation>> {
        self.protected(
            CacheKey::global(RESERVATIONS),
            HttpRequest::get("/reservations"),
            ResourceOptions::refetch_on_mount(),
        )
    }

    pub async fn all_reservations(&self) -> Result<Arc<Vec<Reservation>>> {
        self.all_reservations_resource().load().await
    }

    /// Admin status change. Every user-scoped booking list may now be stale.
    pub async fn set_reservation_status(
        &self,
        reservation_id: &str,
        status: &str,
    ) -> Result<WriteAck> {
        let ack: WriteAck = self
            .client
            .send_json(
                Method::PATCH,
                &format!("/reservations/{reservation_id}"),
                &json!({ "status": status }),
            )
            .await?;
        self.cache.invalidate_resource(RESERVATIONS);
        self.all_reservations_resource()
            .refresh_after_write()
            .await;
        Ok(ack)
    }

    // --- Reviews ---

    pub fn reviews_resource(&self) -> ResourceHandle<Vec<Review>> {
        self.protected(
            CacheKey::global(REVIEWS),
            HttpRequest::get("/reviews"),
            ResourceOptions::refetch_on_mount(),
        )
    }

    pub async fn reviews(&self) -> Result<Arc<Vec<Review>>> {
        self.reviews_resource().load().await
    }

    pub async fn post_review(&self, review: &Review) -> Result<WriteAck> {
        self.reviews_resource()
            .mutate(self.client.send_json(Method::POST, "/reviews", review))
            .await
    }

    // --- Users & roles ---

    pub fn users_resource(&self) -> ResourceHandle<Vec<UserRecord>> {
        self.protected(
            CacheKey::global(USERS),
            HttpRequest::get("/users"),
            ResourceOptions::refetch_on_mount(),
        )
    }

    pub async fn users(&self) -> Result<Arc<Vec<UserRecord>>> {
        self.users_resource().load().await
    }

    /// Promotes a user. Cached role lookups are dropped so the next guard
    /// evaluation sees the new role.
    pub async fn make_admin(&self, user_id: &str) -> Result<WriteAck> {
        let path = format!("/users/admin/{user_id}");
        let ack = self
            .users_resource()
            .mutate(async {
                self.client
                    .send(HttpRequest::new(Method::PATCH, path))
                    .await?
                    .json()
            })
            .await?;
        self.cache.invalidate_resource(ROLE);
        Ok(ack)
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<WriteAck> {
        let path = format!("/users/{user_id}");
        let ack = self
            .users_resource()
            .mutate(async {
                self.client
                    .send(HttpRequest::new(Method::DELETE, path))
                    .await?
                    .json()
            })
            .await?;
        self.cache.invalidate_resource(ROLE);
        Ok(ack)
    }

    /// Role lookup for the guard, cached per identity until logout.
    pub fn role_resource(&self, email: &str) -> ResourceHandle<bool> {
        let client = self.client.clone();
        let request = HttpRequest::get(format!("/users/{email}"));
        self.cache.use_resource(
            CacheKey::user(ROLE, email),
            move || {
                let client = client.clone();
                let request = request.renewed();
                async move {
                    client
                        .get_json::<UserRecord>(request)
                        .await
                        .map(|user| user.is_admin())
                }
            },
            ResourceOptions::indefinite().protected(),
        )
    }

    pub async fn is_admin(&self, email: &str) -> Result<bool> {
        self.role_resource(email).load().await.map(|b| *b)
    }

    pub fn role_entry(&self, email: &str) -> CacheEntry<bool> {
        self.cache.entry(&CacheKey::user(ROLE, email))
    }

    // --- Menu administration ---

    pub async fn add_menu_item(&self, item: &MenuItem) -> Result<WriteAck> {
        let ack = self.client.send_json(Method::POST, "/menu", item).await?;
        self.after_menu_write();
        Ok(ack)
    }

    pub async fn update_menu_item(&self, item_id: &str, item: &MenuItem) -> Result<WriteAck> {
        let ack = self
            .client
            .send_json(Method::PATCH, &format!("/menu/{item_id}"), item)
            .await?;
        self.after_menu_write();
        Ok(ack)
    }

    pub async fn delete_menu_item(&self, item_id: &str) -> Result<WriteAck> {
        let ack = self
            .client
            .send(HttpRequest::new(Method::DELETE, format!("/menu/{item_id}")))
            .await?
            .json()?;
        self.after_menu_write();
        Ok(ack)
    }

    fn after_menu_write(&self) {
        if self.invalidate_menu_on_admin_write {
            self.cache.invalidate(&CacheKey::global(MENU));
        }
    }
}
