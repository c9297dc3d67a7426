//! Socket bridge to the launcher: incoming editor notifications and outgoing pane control.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::app::AppEvent;

/// Message exchanged with the editor wrapper and the looking-glass launcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeMessage {
    /// The palette pane was shown.
    Open,
    /// The palette is done; hide its pane.
    Close,
    /// The editor entered a buffer.
    Enter,
    /// The editor is shutting down.
    Exit,
}

/// Splits a byte stream of back-to-back JSON objects into messages.
///
/// Senders write objects without separators, so a read may hold several
/// messages or only part of one.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    buffer: Vec<u8>,
}

impl MessageDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<BridgeMessage> {
        self.buffer.extend_from_slice(bytes);
        let mut messages = Vec::new();
        let mut stream =
            serde_json::Deserializer::from_slice(&self.buffer).into_iter::<serde_json::Value>();
        let consumed = loop {
            match stream.next() {
                Some(Ok(value)) => match serde_json::from_value::<BridgeMessage>(value) {
                    Ok(message) => messages.push(message),
                    Err(err) => debug!(%err, "ignoring unknown bridge message"),
                },
                Some(Err(err)) if err.is_eof() => break stream.byte_offset(),
                Some(Err(err)) => {
                    warn!(%err, "discarding malformed bridge input");
                    break self.buffer.len();
                }
                None => break stream.byte_offset(),
            }
        };
        self.buffer.drain(..consumed);
        messages
    }
}

/// Bind the bridge port on the loopback interface.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to listen on bridge port {port}"))?;
    info!(port, "bridge listening");
    Ok(listener)
}

/// Accept connections forever, turning every message into an [`AppEvent`].
pub async fn serve(listener: TcpListener, events: UnboundedSender<AppEvent>) -> Result<()> {
    loop {
        let (socket, peer) = listener.accept().await.context("bridge accept failed")?;
        debug!(%peer, "bridge connection");
        let events = events.clone();
        tokio::spawn(async move {
            if let Err(err) = read_messages(socket, events).await {
                warn!(%err, "bridge connection failed");
            }
        });
    }
}

async fn read_messages(mut socket: TcpStream, events: UnboundedSender<AppEvent>) -> Result<()> {
    let mut decoder = MessageDecoder::default();
    let mut chunk = [0u8; 1024];
    loop {
        let read = socket.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        for message in decoder.feed(&chunk[..read]) {
            if events.send(AppEvent::Bridge(message)).is_err() {
                return Ok(());
            }
        }
    }
}

/// Connect to the launcher that shows and hides the palette pane.
pub async fn connect_looking_glass(port: u16) -> Result<TcpStream> {
    TcpStream::connect(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to connect to looking glass on port {port}"))
}

/// Write every outgoing message to the launcher until the channel closes.
pub async fn forward(
    mut stream: TcpStream,
    mut outgoing: UnboundedReceiver<BridgeMessage>,
) -> Result<()> {
    while let Some(message) = outgoing.recv().await {
        let payload = serde_json::to_vec(&message)?;
        stream
            .write_all(&payload)
            .await
            .context("failed to write to looking glass")?;
        debug!(?message, "forwarded to looking glass");
    }
    Ok(())
}
