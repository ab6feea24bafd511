use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// --- Identity ---

/// UserRecord
///
/// The remote API's record for a registered identity, returned by `GET /users/{email}`
/// and the admin user listing. The role flag drives the admin role lookup.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UserRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    // 'admin' for back-office users, absent for customers.
    #[serde(default)]
    pub role: Option<String>,
    // Some API revisions answer the role question with a bare boolean instead.
    #[serde(default)]
    pub admin: Option<bool>,
}

impl UserRecord {
    pub fn is_admin(&self) -> bool {
        self.admin.unwrap_or(false) || self.role.as_deref() == Some("admin")
    }
}

// --- Menu (global, public) ---

/// MenuItem
///
/// A dish as listed by `GET /menu`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MenuItem {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub recipe: String,
    #[serde(default)]
    pub image: String,
    pub category: String,
    pub price: f64,
}

// --- Cart (user-scoped) ---

/// CartItem
///
/// One line of a user's cart (`GET /carts?email=`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub menu_id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub price: f64,
}

// --- Orders & Payments ---

/// PaymentIntent
///
/// Response of `POST /create-payment-intent`; the secret is handed to the payment form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
}

/// Payment
///
/// A completed order. Recorded after the payment form confirms, listed per user
/// (`GET /payments/{email}`) or admin-wide (`GET /orders`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    pub price: f64,
    pub transaction_id: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub cart_ids: Vec<String>,
    #[serde(default)]
    pub menu_item_ids: Vec<String>,
    #[serde(default)]
    pub status: String,
}

// --- Reservations ---

/// Reservation
///
/// A table booking. Users see their own, admins manage all of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    pub name: String,
    pub date: NaiveDate,
    pub time: String,
    pub guests: u32,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// --- Reviews ---

/// Review
///
/// Customer testimonial shown on the home page and submitted from the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub details: String,
    pub rating: f32,
    #[serde(default)]
    pub email: Option<String>,
}

// --- Response envelopes ---

/// TokenResponse
///
/// Body of a successful `POST /jwt`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// WriteAck
///
/// The remote API answers writes with the storage driver's acknowledgement;
/// only the counters are of interest to callers.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WriteAck {
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub inserted_id: Option<String>,
    #[serde(default)]
    pub modified_count: Option<u64>,
    #[serde(default)]
    pub deleted_count: Option<u64>,
}
