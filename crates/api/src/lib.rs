pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{CandleStore, PositionStore, SignalStore};
use engine::{Backfill, Evaluator, Ingestor};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub backfill: Arc<Backfill>,
    pub evaluator: Evaluator,
    pub candles: Arc<dyn CandleStore>,
    pub signals: Arc<dyn SignalStore>,
    pub positions: Arc<dyn PositionStore>,
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let app = Router::new()
        .merge(routes::positions_router())
        .merge(routes::signals_router())
        .merge(routes::candles_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors);

    info!(%addr, "API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
