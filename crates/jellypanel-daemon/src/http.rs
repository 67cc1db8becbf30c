use crate::core::PanelEvent;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use jellypanel_proto::protocol::Command;
use jellypanel_proto::state::{Connectivity, DisplayMode, SnapshotStore, ViewState};
use jellypanel_proto::view::{self, PanelDocument};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    snapshots: Arc<SnapshotStore>,
    event_tx: mpsc::Sender<PanelEvent>,
    /// Panel header; blank hides it.
    title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub connectivity: Connectivity,
    pub mode: DisplayMode,
    pub rev: u64,
}

/// Routes for the panel API.  Separate from `start_server` so tests can drive
/// it without binding a port.
pub fn router(
    snapshots: Arc<SnapshotStore>,
    event_tx: mpsc::Sender<PanelEvent>,
    title: String,
) -> Router {
    let app_state = HttpState {
        snapshots,
        event_tx,
        title,
    };

    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/panel", get(get_panel))
        .route("/api/health", get(get_health))
        .route("/api/refresh", post(refresh))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(app_state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    snapshots: Arc<SnapshotStore>,
    event_tx: mpsc::Sender<PanelEvent>,
    title: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(snapshots, event_tx, title);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_state(State(state): State<HttpState>) -> Json<ViewState> {
    Json(state.snapshots.get_state().await)
}

async fn get_panel(State(state): State<HttpState>) -> Json<PanelDocument> {
    let snapshot = state.snapshots.get_state().await;
    Json(view::render_document(&snapshot, &state.title))
}

async fn get_health(State(state): State<HttpState>) -> Json<Health> {
    let snapshot = state.snapshots.get_state().await;
    Json(Health {
        connectivity: snapshot.connectivity,
        mode: snapshot.mode,
        rev: snapshot.rev,
    })
}

async fn refresh(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: refresh");
    if state
        .event_tx
        .send(PanelEvent::ClientCommand(Command::Refresh))
        .await
        .is_err()
    {
        error!("Failed to send refresh command");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::ACCEPTED
}
