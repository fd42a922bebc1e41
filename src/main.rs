//! Circulation Desk server
//!
//! REST API server for library circulation and fines.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circulation_desk::{
    api,
    config::{AppConfig, BackendKind, LoggingConfig},
    repository::{memory::MemoryStore, Repository},
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.logging);

    tracing::info!("Starting Circulation Desk v{}", env!("CARGO_PKG_VERSION"));

    // Create repository
    let repository = match config.backend.kind {
        BackendKind::Memory => {
            let store = MemoryStore::new();
            for name in &config.backend.seed_users {
                let user = store.add_user(name).await;
                tracing::info!("Seeded user {} ({})", user.name, user.id);
            }
            tracing::info!("Using in-memory backing store");
            Repository::memory(store)
        }
        BackendKind::Rest => {
            tracing::info!("Using REST backing store at {}", config.backend.base_url);
            Repository::from_config(&config.backend)?
        }
    };

    let services = Services::new(repository, &config)?;

    // Evict stale in-flight entries once per dedup window
    let coordinator = services.coordinator.clone();
    let window = config.coordinator.dedup_window().max(Duration::from_millis(100));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(window);
        loop {
            ticker.tick().await;
            let evicted = coordinator.cache().evict_expired();
            if evicted > 0 {
                tracing::debug!("Evicted {} stale in-flight request(s)", evicted);
            }
        }
    });

    // Save server address before moving config
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = api::router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("circulation_desk={},tower_http=debug", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
