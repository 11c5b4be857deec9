//! Arena - game server with static client hosting on one port.

use axum::{
    Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt, future};
use server::Frame;
use std::net::SocketAddr;
use std::path::PathBuf;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    game_state: server::SharedGame,
    static_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,server=debug")),
        )
        .init();

    info!("Blob Arena Server v{}", env!("CARGO_PKG_VERSION"));

    // Load server configuration
    let config = server::Config::load()?;
    info!("Loaded configuration");
    info!("  Port: {}", config.server.port);
    info!("  World: {}x{}", config.world.width, config.world.height);
    info!("  Render distance: {}", config.world.render_distance);
    info!("  Static files: {}", config.server.static_dir);

    let static_dir = PathBuf::from(&config.server.static_dir);
    let state = AppState {
        game_state: server::start_game(&config),
        static_dir: static_dir.clone(),
    };

    // The browser client opens its WebSocket on `/`, the same path it loads
    // the page from.
    let app = Router::new()
        .route("/", get(root_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Game WebSocket endpoint: ws://{}/", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Upgrade WebSocket requests, serve `index.html` otherwise.
async fn root_handler(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => {
            info!("WebSocket connection from {}", addr);
            ws.on_upgrade(move |socket| handle_websocket(socket, addr, state.game_state))
        }
        Err(_) => serve_index(&state.static_dir).await,
    }
}

async fn serve_index(static_dir: &std::path::Path) -> Response {
    match tokio::fs::read_to_string(static_dir.join("index.html")).await {
        Ok(html) => Html(html).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Client build not found").into_response(),
    }
}

/// Adapt an axum WebSocket to the server's connection pump.
async fn handle_websocket(socket: WebSocket, addr: SocketAddr, game_state: server::SharedGame) {
    let (write, read) = socket.split();
    let incoming = read.map(|msg| {
        msg.map(|msg| match msg {
            Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            Message::Close(_) => Frame::Close,
            _ => Frame::Other,
        })
    });
    let outgoing =
        write.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text.into()))));

    if let Err(e) = server::serve_connection(game_state, addr, incoming, outgoing).await {
        error!("Connection error from {}: {}", addr, e);
    }
}
