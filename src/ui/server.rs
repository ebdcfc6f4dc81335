//! Web server for the control surface

use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use super::{handlers, websocket};
use crate::config::UiConfig;
use crate::control::ChannelSnapshot;
use crate::engine::{LoopInvoker, SharedSnapshots};
use crate::error::{Error, Result};

/// Shared state handed to every handler
pub struct AppState {
    /// Marshals commands onto the event loop
    pub invoker: LoopInvoker,
    /// Latest channel state
    pub snapshots: SharedSnapshots,
    /// Fan-out of state changes to WebSocket clients
    pub updates: broadcast::Sender<Vec<ChannelSnapshot>>,
}

impl AppState {
    pub fn new(invoker: LoopInvoker, snapshots: SharedSnapshots) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            invoker,
            snapshots,
            updates,
        }
    }
}

pub struct WebServer {
    config: UiConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: UiConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Routes of the control API
    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/api/sources", get(handlers::get_sources))
            .route("/api/sources/:slot", get(handlers::get_source))
            .route("/api/sources/:slot/position", put(handlers::set_position))
            .route("/api/sources/:slot/elevation", put(handlers::set_elevation))
            .route("/api/sources/:slot/width", put(handlers::set_width))
            .route("/api/sources/:slot/bypass", put(handlers::set_bypass))
            .route("/api/unlink-all", post(handlers::unlink_all))
            .route("/ws", get(websocket::ws_handler))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Serve until the listener fails
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.http_port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address: {}", e)))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Control surface listening on {}", addr);

        axum::serve(listener, Self::router(self.state)).await?;
        Ok(())
    }

    /// Run the server on the tokio runtime
    pub fn start_background(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!("Web server error: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedGraph;
    use crate::config::AppConfig;
    use crate::constants::SPATIALIZER_INPUT_NAME;
    use crate::engine::{loop_channel, Engine, EventLoop, LoopHandle};
    use crate::registry::props::keys;
    use crate::registry::Properties;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn start() -> (Arc<AppState>, LoopHandle<SimulatedGraph>) {
        let (tx, rx) = loop_channel();
        let graph = SimulatedGraph::new(tx.clone());
        graph
            .add_node_with_ports(
                Properties::new().with(keys::NODE_NAME, SPATIALIZER_INPUT_NAME),
                8,
                0,
            )
            .unwrap();

        let engine = Engine::new(&AppConfig::default(), graph);
        let handle = EventLoop::new(engine, rx).spawn(tx).unwrap();
        handle.invoker().barrier().unwrap();

        let state = Arc::new(AppState::new(handle.invoker(), handle.snapshots()));
        (state, handle)
    }

    fn put_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_sources() {
        let (state, handle) = start();
        let response = WebServer::router(state)
            .oneshot(Request::get("/api/sources").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"].as_array().unwrap().len(), 4);
        assert_eq!(json["data"][0]["active"], true);

        tokio::task::spawn_blocking(move || handle.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_width_updates_snapshot() {
        let (state, handle) = start();
        let response = WebServer::router(state.clone())
            .oneshot(put_json("/api/sources/1/width", r#"{"width":45.0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.snapshots.read()[1].width, 45.0);

        tokio::task::spawn_blocking(move || handle.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_slot_is_not_found() {
        let (state, handle) = start();
        let response = WebServer::router(state)
            .oneshot(put_json("/api/sources/9/bypass", r#"{"enabled":true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        tokio::task::spawn_blocking(move || handle.shutdown()).await.unwrap();
    }
}
