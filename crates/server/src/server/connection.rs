//! Per-connection message pump.
//!
//! Transport-agnostic: each listener adapts its WebSocket halves into a
//! stream of [`Frame`]s and a sink of JSON text.

use super::game::SharedGame;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// An inbound WebSocket frame, reduced to what the game cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
    /// Binary, ping and pong frames.
    Other,
}

/// Drive one client connection until either side closes.
///
/// Inbound text is handled under the game's write lock, one message at a
/// time. Outbound messages arrive through a bounded queue owned by the
/// client's session and are encoded to JSON here.
pub async fn serve_connection<R, W, E>(
    game: SharedGame,
    addr: SocketAddr,
    mut incoming: R,
    mut outgoing: W,
) -> anyhow::Result<()>
where
    R: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
    W: Sink<String> + Unpin,
    W::Error: Display,
{
    let buffer = game.read().await.config.server.outbound_buffer.max(1);
    let (tx, mut rx) = mpsc::channel(buffer);

    let Some(client_id) = game.write().await.add_client(addr, tx) else {
        let _ = outgoing.close().await;
        return Ok(());
    };

    let result = loop {
        tokio::select! {
            frame = incoming.next() => {
                match frame {
                    Some(Ok(Frame::Text(text))) => {
                        game.write().await.handle_message(client_id, &text);
                    }
                    Some(Ok(Frame::Other)) => {}
                    Some(Ok(Frame::Close)) | None => {
                        info!("Client {} closed the connection", addr);
                        break Ok(());
                    }
                    Some(Err(e)) => {
                        break Err(anyhow::anyhow!("WebSocket error from {}: {}", addr, e));
                    }
                }
            }
            message = rx.recv() => {
                let Some(message) = message else {
                    break Ok(());
                };
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode message for {}: {}", addr, e);
                        continue;
                    }
                };
                if let Err(e) = outgoing.send(text).await {
                    break Err(anyhow::anyhow!("Failed to send to {}: {}", addr, e));
                }
            }
        }
    };

    game.write().await.remove_client(client_id);
    result
}
