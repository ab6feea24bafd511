use std::sync::Arc;

// --- Module Structure ---

// Leaf services.
pub mod config;
pub mod error;
pub mod models;
pub mod token_store;
pub mod transport;

// Session and resource layer.
pub mod auth_client;
pub mod cache;
pub mod session;

// Typed endpoint bindings and route-level access control.
pub mod api;
pub mod guard;
pub mod routes;

// --- Public Re-exports ---

pub use api::RestaurantApi;
pub use auth_client::AuthenticatedClient;
pub use cache::{CacheEntry, CacheKey, ResourceCache, ResourceHandle, ResourceOptions, Status};
pub use config::{AppConfig, Env};
pub use error::{ClientError, Result};
pub use guard::{AccessGuard, AccessPolicy, Decision, Role, RoleLookup, evaluate};
pub use session::{IdentityProof, Session, SessionEvent, SessionManager, SessionState};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreState};
pub use transport::{HttpTransport, MockTransport, Transport, TransportState};

/// ClientState
///
/// The single container wiring every component of the session and resource
/// layer together. The session holder is passed explicitly to each consumer;
/// nothing looks it up from ambient global state, so tests swap in a
/// `MockTransport` and a `MemoryTokenStore` through `ClientState::new`.
#[derive(Clone)]
pub struct ClientState {
    pub config: AppConfig,
    pub transport: TransportState,
    pub cache: ResourceCache,
    pub session: Arc<SessionManager>,
    pub client: AuthenticatedClient,
    pub api: RestaurantApi,
    pub guard: AccessGuard,
}

impl ClientState {
    pub fn new(config: AppConfig, transport: TransportState, store: TokenStoreState) -> Self {
        let cache = ResourceCache::new();
        let session = Arc::new(SessionManager::new(
            store,
            transport.clone(),
            cache.clone(),
            config.login_route.clone(),
        ));
        let client = AuthenticatedClient::new(session.clone(), transport.clone());
        let api = RestaurantApi::new(
            client.clone(),
            transport.clone(),
            cache.clone(),
            config.invalidate_menu_on_admin_write,
        );
        let guard = AccessGuard::new(session.clone(), api.clone(), routes::route_table());

        Self {
            config,
            transport,
            cache,
            session,
            client,
            api,
            guard,
        }
    }

    /// Production wiring: `reqwest` transport and the on-disk token store.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let transport =
            Arc::new(HttpTransport::new(&config.api_base_url, config.request_timeout)?)
                as TransportState;
        let store = Arc::new(FileTokenStore::new(config.token_store_path.clone())) as TokenStoreState;
        Ok(Self::new(config, transport, store))
    }
}
