//! Local control API.
//!
//! HTTP surface a front end drives the service through:
//! - Session control (record, summarize, email, chat, live captions)
//! - The view projection
//! - Saved-recording management (list/load/delete/rename)

pub mod error;
pub mod routes;

use crate::config::Config;
use crate::session::SessionHandle;
use crate::sidebar::SidebarHandle;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::session::{ApiCommand, SessionState};

pub struct ApiServer {
    port: u16,
    state: SessionState,
}

impl ApiServer {
    pub fn new(
        tx: tokio::sync::mpsc::Sender<ApiCommand>,
        session: SessionHandle,
        sidebar: SidebarHandle,
        config: &Config,
    ) -> Self {
        Self {
            port: config.api.port,
            state: SessionState {
                tx,
                session,
                sidebar,
            },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .merge(routes::session::router(self.state.clone()))
            .merge(routes::recordings::router(self.state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("Control API listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET    /                     - Service info");
        info!("  GET    /version              - Version info");
        info!("  GET    /session/view         - Full view projection");
        info!("  GET    /session/status       - Phase and timer");
        info!("  POST   /session/record       - Toggle recording");
        info!("  POST   /session/live         - Push live caption fragment");
        info!("  POST   /session/summarize    - Summarize transcript");
        info!("  POST   /session/email        - Draft email");
        info!("  POST   /session/email/regenerate - Regenerate with a style");
        info!("  POST   /session/email/quick-edit - Apply an instruction");
        info!("  POST   /session/email/type   - Select email type");
        info!("  POST   /session/email/copy   - Copy draft to clipboard");
        info!("  POST   /session/chat         - Ask about the meeting");
        info!("  POST   /session/new          - Start a fresh session");
        info!("  GET    /recordings           - Grouped recording list");
        info!("  POST   /recordings/:id/load  - Load a recording");
        info!("  DELETE /recordings/:id       - Delete a recording");
        info!("  POST   /recordings/:id/rename - Rename a recording");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "meetnote",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "meetnote"
    }))
}
