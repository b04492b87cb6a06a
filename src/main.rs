mod auth;
mod config;
mod handlers;
mod loader;
mod models;
mod registry;
mod router;
mod schema;
mod validator;
mod watcher;
mod ws;

use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use loader::{DirectorySource, ReloadError, TemplateSource};
use registry::{LoadSummary, TemplateRegistry};
use watcher::TemplateWatcher;
use ws::Hub;

/// Application state shared across handlers
pub struct AppState {
    pub registry: TemplateRegistry,
    pub source: Arc<dyn TemplateSource>,
    pub config: Config,
    pub ws_hub: Option<Arc<Hub>>,
}

impl AppState {
    /// Reload every template from the configured source and announce the outcome
    pub async fn trigger_reload(&self) -> Result<LoadSummary, ReloadError> {
        let result = loader::reload(&self.registry, self.source.as_ref()).await;

        if let Some(hub) = &self.ws_hub {
            match &result {
                Ok(summary) => hub.broadcast_reloaded(summary).await,
                Err(ReloadError::Rejected(aborted)) => {
                    hub.broadcast_reload_failed(&aborted.to_string(), &aborted.failures)
                        .await
                }
                Err(e) => hub.broadcast_reload_failed(&e.to_string(), &[]).await,
            }
        }

        result
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "device_templates=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let cfg = Config::load();
    if cfg.admin_token.is_empty() {
        tracing::warn!("ADMIN_TOKEN not set - template reloads are unauthenticated");
    }
    tracing::info!("Starting device template registry");
    tracing::info!("Templates: {}", cfg.templates_dir);
    tracing::info!("Listen: {}", cfg.listen_addr);

    let source = DirectorySource::new(&cfg.templates_dir, cfg.load_timeout);
    let ws_hub = Arc::new(Hub::new());

    let state = Arc::new(AppState {
        registry: TemplateRegistry::new(),
        source: Arc::new(source),
        config: cfg.clone(),
        ws_hub: Some(ws_hub),
    });

    // Initial load; a bad template set leaves the registry empty but keeps serving
    if let Err(e) = state.trigger_reload().await {
        tracing::warn!("Initial template load failed: {}", e);
    }

    let mut template_watcher = TemplateWatcher::new(state.clone(), &cfg.templates_dir, cfg.reload_debounce);
    if cfg.watch_templates {
        if let Err(e) = template_watcher.start() {
            tracing::warn!("Template watcher disabled: {:#}", e);
        }
    }

    // Build router
    let app = router::build(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("Device template registry listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    template_watcher.stop();
    tracing::info!("Device template registry shutting down");
    Ok(())
}

/// WebSocket upgrade handler
pub async fn ws_upgrade_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    if let Some(hub) = &state.ws_hub {
        ws::ws_handler(ws, axum::extract::State(hub.clone())).await
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
