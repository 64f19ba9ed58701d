//! Realtime channel client.
//!
//! Opens one WebSocket to the realtime endpoint, appends `transcript` frames
//! to the view-model and closes the socket when the view session is
//! cancelled. There is no reconnect: a dropped connection stays dropped
//! until the next activation.

use crate::transcript::parse_frame;
use crate::view_model::{ChannelState, SharedViewModel};
use futures_util::StreamExt;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage};
use tokio_util::sync::CancellationToken;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Owns the socket and makes sure at most one close frame goes out
struct ChannelHandle {
    stream: WsStream,
    closed: bool,
}

impl ChannelHandle {
    fn new(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            log::debug!("[CHANNEL] Close handshake failed: {}", e);
        }
    }

    /// The peer closed or the transport failed; nothing left to send
    fn mark_closed(&mut self) {
        self.closed = true;
    }
}

pub async fn run_channel(url: String, view: SharedViewModel, cancel: CancellationToken) {
    log::info!("[CHANNEL] Connecting to {}", url);

    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            view.write().await.channel = ChannelState::Closed;
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let stream = match connected {
        Ok((stream, _response)) => stream,
        Err(e) => {
            log::error!("[CHANNEL] Failed to connect to {}: {}", url, e);
            view.write().await.channel = ChannelState::Dropped(e.to_string());
            return;
        }
    };

    view.write().await.channel = ChannelState::Open;
    log::info!("[CHANNEL] Connected to {}", url);

    let mut handle = ChannelHandle::new(stream);

    let end_state = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                handle.close().await;
                break ChannelState::Closed;
            }
            msg = handle.stream.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    append_frame(&view, text.as_str()).await;
                }
                Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => append_frame(&view, text).await,
                    Err(_) => log::debug!("[CHANNEL] Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(WsMessage::Close(_))) => {
                    handle.mark_closed();
                    break ChannelState::Dropped("closed by peer".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::error!("[CHANNEL] WebSocket error: {}", e);
                    handle.mark_closed();
                    break ChannelState::Dropped(e.to_string());
                }
                None => {
                    handle.mark_closed();
                    break ChannelState::Dropped("connection ended".to_string());
                }
            }
        }
    };

    log::info!("[CHANNEL] Channel {}", end_state.label());
    view.write().await.channel = end_state;
}

async fn append_frame(view: &SharedViewModel, raw: &str) {
    if let Some(line) = parse_frame(raw) {
        let count = view.write().await.transcript.append(line);
        log::debug!("[CHANNEL] Transcript line #{}", count);
    }
}
