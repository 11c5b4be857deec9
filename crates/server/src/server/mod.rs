//! Game server implementation.

use crate::config::Config;
use futures_util::{SinkExt, StreamExt, future};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{error, info};

pub mod client;
pub mod connection;
pub mod game;

pub use client::{Client, ClientId, Sessions};
pub use connection::{Frame, serve_connection};
pub use game::{GameState, SharedGame, run_game_loop};

/// Create the shared game state and start its tick loop.
pub fn start_game(config: &Config) -> SharedGame {
    let game_state = Arc::new(RwLock::new(GameState::new(config)));

    let game_loop_state = Arc::clone(&game_state);
    let tick_interval = config.server.tick_interval_ms;
    tokio::spawn(async move {
        run_game_loop(game_loop_state, tick_interval).await;
    });

    game_state
}

/// Run the WebSocket-only game server.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on ws://{}", addr);

    let game_state = start_game(&config);

    loop {
        let (stream, addr) = listener.accept().await?;
        let game_state = Arc::clone(&game_state);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, game_state).await {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, game_state: SharedGame) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New connection from {}", addr);

    let (write, read) = ws_stream.split();
    let incoming = read.map(|msg| msg.map(frame_from_message));
    let outgoing =
        write.with(|text: String| future::ready(Ok::<_, WsError>(Message::Text(text.into()))));

    serve_connection(game_state, addr, incoming, outgoing).await
}

fn frame_from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Close(_) => Frame::Close,
        _ => Frame::Other,
    }
}
