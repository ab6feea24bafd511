use bistro_client::{
    ClientState, Decision, SessionState,
    config::{AppConfig, Env},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Startup probe for the session layer: rehydrates the stored session, warms
/// the menu cache and reports the guard decision for every known route.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bistro_client=debug,reqwest=info".into());

    // 3. Pretty output locally, JSON for log shipping in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!(api = %config.api_base_url, "client starting in {:?} mode", config.env);

    // 4. Wiring
    let state = match ClientState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "FATAL: could not build HTTP transport");
            std::process::exit(1);
        }
    };

    // 5. Session rehydration
    match state.session.restore().await {
        Ok(SessionState::Active(session)) => {
            tracing::info!(email = %session.identity.email, "resumed stored session")
        }
        Ok(_) => tracing::info!("no stored session, browsing anonymously"),
        Err(e) => tracing::warn!(error = %e, "token store unreadable, browsing anonymously"),
    }

    // 6. Warm the public menu
    match state.api.menu().await {
        Ok(menu) => tracing::info!(items = menu.len(), "menu loaded"),
        Err(e) => tracing::warn!(error = %e, "menu unavailable"),
    }

    // 7. Route access report
    let routes: Vec<String> = state
        .guard
        .routes()
        .iter()
        .map(|(pattern, _)| pattern.to_string())
        .collect();
    for route in routes {
        match state.guard.check(&route).await {
            Decision::Allowed => tracing::info!(route = %route, "allowed"),
            Decision::Pending => tracing::info!(route = %route, "pending"),
            Decision::Denied { redirect_to } => {
                tracing::info!(route = %route, redirect_to = %redirect_to, "denied")
            }
        }
    }
}
