use axum::{
    routing::{get, post},
    Router,
};
use engine::TradingService;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer, ExposeHeaders},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TradingService>,
}

/// The main function to configure and run the web server.
///
/// Tracing is initialized by the binary; this layer only attaches the
/// request-level `TraceLayer`.
pub async fn run_server(addr: SocketAddr, service: Arc<TradingService>) -> anyhow::Result<()> {
    let app_state = Arc::new(AppState { service });
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any())
        .expose_headers(ExposeHeaders::any());

    // --- DEFINE THE APPLICATION ROUTES ---
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/balance", get(handlers::get_balance))
        .route("/api/price/:symbol", get(handlers::get_price))
        .route("/api/positions", get(handlers::get_positions))
        .route("/api/orders", get(handlers::get_orders))
        .route(
            "/api/order",
            post(handlers::place_order).delete(handlers::cancel_order),
        )
        .route("/api/close-position", post(handlers::close_position))
        .route("/api/leverage", post(handlers::set_leverage))
        .route("/ws", get(handlers::websocket_handler))
        .with_state(app_state)
        .layer(cors)
        // This middleware automatically logs information about every incoming request.
        .layer(TraceLayer::new_for_http());

    tracing::info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
