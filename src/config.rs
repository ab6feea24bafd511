use std::{env, path::PathBuf, time::Duration};

/// AppConfig
///
/// Holds the client's entire configuration state. Loaded once at startup and
/// never mutated afterwards; every component receives a clone.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls which settings are mandatory.
    pub env: Env,
    // Base URL of the remote restaurant API (no trailing slash).
    pub api_base_url: String,
    // Where the session credential is persisted between process loads.
    pub token_store_path: PathBuf,
    // Per-request timeout handed to the transport.
    pub request_timeout: Duration,
    // Public entry point the client is sent to when a session ends or a guard denies.
    pub login_route: String,
    // Whether a successful admin write against the menu evicts the cached menu.
    pub invalidate_menu_on_admin_write: bool,
}

/// Env
///
/// Defines the runtime context: local development against a loopback API, or a
/// production deployment where the API origin must be configured explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_LOGIN_ROUTE: &str = "/login";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking configuration for tests. Does not read the environment
    /// and keeps the token file in the system temp directory.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_store_path: env::temp_dir().join("bistro-client-test").join("session.json"),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            invalidate_menu_on_admin_write: true,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables.
    ///
    /// # Panics
    /// Panics in `Env::Production` when `API_BASE_URL` is missing, so a deployed
    /// client never silently talks to a loopback address.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let api_base_url = match env {
            Env::Production => env::var("API_BASE_URL")
                .expect("FATAL: API_BASE_URL must be set in production."),
            Env::Local => {
                env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
            }
        };

        let token_store_path = env::var("TOKEN_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_token_path());

        let request_timeout = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let invalidate_menu_on_admin_write = env::var("MENU_INVALIDATE_ON_WRITE")
            .map(|v| !matches!(v.as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Self {
            env,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token_store_path,
            request_timeout,
            login_route: env::var("LOGIN_ROUTE")
                .unwrap_or_else(|_| DEFAULT_LOGIN_ROUTE.to_string()),
            invalidate_menu_on_admin_write,
        }
    }
}

fn default_token_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("bistro-client")
        .join("session.json")
}
