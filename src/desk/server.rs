use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::api::{self, AppState};
use super::db::{DbHandle, DeskDb};
use super::gitlab::{DisabledTracker, GitLabClient, IssueTracker};
use crate::config::{ServerSection, TrackerSection};

/// Configuration for the service desk server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub cors_permissive: bool,
    pub tracker: TrackerSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_sections(&ServerSection::default(), &TrackerSection::default())
    }
}

impl ServerConfig {
    pub fn from_sections(server: &ServerSection, tracker: &TrackerSection) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            db_path: server.db_path.clone(),
            cors_permissive: server.cors_permissive,
            tracker: tracker.clone(),
        }
    }
}

/// The GitLab client when a token is configured, otherwise a tracker that
/// declines every write.
pub fn build_tracker(config: &TrackerSection) -> Result<Arc<dyn IssueTracker>> {
    match config.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => {
            let client = GitLabClient::new(&config.api_url, &config.project_id, token)?;
            info!(project = %config.project_id, "GitLab mirror enabled");
            Ok(Arc::new(client))
        }
        None => {
            info!("no GitLab token configured, mirror disabled");
            Ok(Arc::new(DisabledTracker))
        }
    }
}

/// Build the full application router with request tracing and, when
/// requested, permissive CORS.
pub fn build_router(state: Arc<AppState>, cors_permissive: bool) -> Router {
    let mut app = api::api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Start the service desk server and run until Ctrl-C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let db = DeskDb::new(&config.db_path).context("Failed to initialize service desk database")?;
    info!(path = %config.db_path.display(), "database ready");

    let tracker = build_tracker(&config.tracker)?;
    if config.tracker.mirror_updates && !tracker.is_enabled() {
        warn!("mirror_updates is set but the GitLab mirror is disabled");
    }

    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        tracker,
        mirror_updates: config.tracker.mirror_updates,
    });
    let app = build_router(state, config.cors_permissive);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!("Service desk API running at http://{}/api", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
