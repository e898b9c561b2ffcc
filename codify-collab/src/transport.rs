//! WebSocket [`Channel`] to the relay hub.
//!
//! One text frame per JSON message. `connect` spawns two tasks:
//! - writer: drains an unbounded queue into the socket, so `emit` never
//!   blocks the single-threaded core
//! - reader: decodes hub frames and forwards them on a bounded channel
//!
//! `close` flips the connected flag immediately, so a caller polling
//! [`Channel::is_connected`] right after closing sees `false`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ClientMessage, ProtocolError, ServerMessage};
use crate::sync::Channel;

/// Live WebSocket connection to the hub.
pub struct WsChannel {
    url: String,
    outgoing: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
}

impl WsChannel {
    /// Open a connection. Returns the channel and the stream of hub messages.
    ///
    /// The stream ends when the hub closes the connection or the transport
    /// fails; there is no reconnection.
    pub async fn connect(
        url: &str,
        inbound_capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<ServerMessage>), ProtocolError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ProtocolError::Connect(e.to_string()))?;
        log::info!("Connected to hub at {url}");

        let (mut ws_writer, mut ws_reader) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::channel::<ServerMessage>(inbound_capacity.max(1));
        let connected = Arc::new(AtomicBool::new(true));

        // Writer task: forward outgoing queue to WebSocket
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let closing = matches!(frame, Message::Close(_));
                if let Err(e) = ws_writer.send(frame).await {
                    log::warn!("Failed to write to hub: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = ws_writer.close().await;
        });

        // Reader task: decode hub frames
        let reader_flag = connected.clone();
        tokio::spawn(async move {
            while let Some(frame) = ws_reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => match ServerMessage::decode(text.as_str()) {
                        Ok(msg) => {
                            if in_tx.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => log::warn!("Dropping undecodable hub frame: {e}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::error!("Hub connection error: {e}");
                        break;
                    }
                }
            }
            reader_flag.store(false, Ordering::SeqCst);
            log::info!("Hub connection closed");
        });

        let channel = Self {
            url: url.to_string(),
            outgoing: out_tx,
            connected,
        };
        Ok((channel, in_rx))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Channel for WsChannel {
    fn emit(&mut self, msg: &ClientMessage) -> Result<(), ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::ConnectionClosed);
        }
        let text = msg.encode()?;
        self.outgoing
            .send(Message::Text(text.into()))
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn close(&mut self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.outgoing.send(Message::Close(None));
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.close();
    }
}
