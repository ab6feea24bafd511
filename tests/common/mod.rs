#![allow(dead_code)]

use bistro_client::{
    AppConfig, ClientError, ClientState, IdentityProof, MemoryTokenStore, MockTransport,
    TokenStoreState, TransportState,
    models::CartItem,
    session::Claims,
    transport::{HttpRequest, HttpResponse},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, SystemTime},
};

// --- Helper Functions ---

const TEST_JWT_SECRET: &[u8] = b"test-secret-value-1234567890";

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Signs a credential the way the issuance endpoint does.
pub fn mint_token(email: &str, name: Option<&str>, exp_offset: i64) -> String {
    let now = now();
    let claims = Claims {
        email: email.to_string(),
        name: name.map(str::to_string),
        exp: (now as i64 + exp_offset) as u64,
        iat: Some(now),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .unwrap()
}

pub fn proof(email: &str, name: &str) -> IdentityProof {
    IdentityProof::Password {
        email: email.to_string(),
        display_name: Some(name.to_string()),
    }
}

pub fn cart_item(email: &str, name: &str, price: f64) -> CartItem {
    CartItem {
        id: None,
        menu_id: format!("menu-{name}"),
        email: email.to_string(),
        name: name.to_string(),
        image: String::new(),
        price,
    }
}

/// In-process stand-in for the remote restaurant API.
#[derive(Default)]
pub struct FakeApi {
    pub carts: Mutex<Vec<CartItem>>,
    pub admins: Vec<String>,
    /// When set, every protected call is answered with 401.
    pub reject_credentials: AtomicBool,
    /// When set, the issuance endpoint refuses every proof.
    pub reject_exchange: AtomicBool,
}

impl FakeApi {
    pub fn with_admins(admins: &[&str]) -> Self {
        Self {
            admins: admins.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn expire_credentials(&self) {
        self.reject_credentials.store(true, Ordering::SeqCst);
    }

    pub fn respond(&self, req: &HttpRequest) -> Result<HttpResponse, ClientError> {
        let path = req.path.as_str();
        let method = req.method.as_str();

        if method == "POST" && path == "/jwt" {
            if self.reject_exchange.load(Ordering::SeqCst) {
                return Ok(HttpResponse::new(401, json!({ "message": "bad proof" })));
            }
            let body = req.body.clone().unwrap_or(Value::Null);
            let email = body["email"].as_str().unwrap_or_default();
            let name = body["name"].as_str();
            return Ok(HttpResponse::ok(
                json!({ "token": mint_token(email, name, 3600) }),
            ));
        }

        if method == "GET" && path == "/menu" {
            return Ok(HttpResponse::ok(json!([
                { "_id": "m1", "name": "Caesar Salad", "category": "salad", "price": 9.5 },
                { "_id": "m2", "name": "Tomato Soup", "category": "soup", "price": 6.0 }
            ])));
        }

        if req.bearer.is_none() || self.reject_credentials.load(Ordering::SeqCst) {
            return Ok(HttpResponse::new(401, json!({ "message": "unauthorized access" })));
        }

        match (method, path) {
            ("GET", "/carts") => {
                let email = req.query_param("email").unwrap_or_default();
                let carts = self.carts.lock().unwrap();
                let mine: Vec<&CartItem> = carts.iter().filter(|c| c.email == email).collect();
                Ok(HttpResponse::ok(serde_json::to_value(mine).unwrap()))
            }
            ("POST", "/carts") => {
                let mut item: CartItem =
                    serde_json::from_value(req.body.clone().unwrap_or(Value::Null)).unwrap();
                let mut carts = self.carts.lock().unwrap();
                let id = format!("c{}", carts.len() + 1);
                item.id = Some(id.clone());
                carts.push(item);
                Ok(HttpResponse::ok(
                    json!({ "acknowledged": true, "insertedId": id }),
                ))
            }
            ("DELETE", p) if p.starts_with("/carts/") => {
                let id = &p["/carts/".len()..];
                let mut carts = self.carts.lock().unwrap();
                let before = carts.len();
                carts.retain(|c| c.id.as_deref() != Some(id));
                Ok(HttpResponse::ok(
                    json!({ "acknowledged": true, "deletedCount": before - carts.len() }),
                ))
            }
            ("GET", p) if p.starts_with("/users/") => {
                let email = &p["/users/".len()..];
                let role = if self.admins.iter().any(|a| a == email) {
                    json!("admin")
                } else {
                    Value::Null
                };
                Ok(HttpResponse::ok(json!({ "email": email, "role": role })))
            }
            ("GET", "/orders") => Ok(HttpResponse::ok(json!([]))),
            ("GET", "/reviews") => Ok(HttpResponse::ok(json!([
                { "name": "Ann", "details": "Great soup", "rating": 5.0 }
            ]))),
            ("POST", "/create-payment-intent") => {
                Ok(HttpResponse::ok(json!({ "clientSecret": "pi_test_secret" })))
            }
            ("GET", "/broken") => Ok(HttpResponse::new(
                500,
                json!({ "message": "database unavailable" }),
            )),
            _ => Ok(HttpResponse::new(404, json!({ "message": "not found" }))),
        }
    }
}

pub fn mock_transport(api: Arc<FakeApi>) -> Arc<MockTransport> {
    Arc::new(MockTransport::new(move |req| api.respond(req)))
}

pub fn slow_transport(api: Arc<FakeApi>, delay: Duration) -> Arc<MockTransport> {
    Arc::new(MockTransport::new(move |req| api.respond(req)).with_delay(delay))
}

pub fn build_state(transport: &Arc<MockTransport>, store: &MemoryTokenStore) -> ClientState {
    ClientState::new(
        AppConfig::default(),
        transport.clone() as TransportState,
        Arc::new(store.clone()) as TokenStoreState,
    )
}

/// A restored (anonymous) client over a fresh fake API.
pub async fn anonymous_client(api: Arc<FakeApi>) -> (ClientState, Arc<MockTransport>, MemoryTokenStore) {
    let transport = mock_transport(api);
    let store = MemoryTokenStore::new();
    let state = build_state(&transport, &store);
    state.session.restore().await.unwrap();
    (state, transport, store)
}
