use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use huddle_core::Envelope;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Websocket connection to the relay, exposed as a pair of envelope
/// channels.
///
/// Dropping every outbound sender closes the socket; the inbound receiver
/// yields `None` once the relay goes away.
pub struct SignalingClient {
    outbound: mpsc::UnboundedSender<Envelope>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SignalingClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to relay at {}", url))?;
        info!("Connected to relay at {}", url);

        let (mut sink, mut stream) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        let writer = tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                let text = match envelope.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize `{}` envelope: {}", envelope.kind, e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!("Relay write failed: {}", e);
                    return;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Relay read failed: {}", e);
                        break;
                    }
                };
                match Envelope::decode(text.as_str()) {
                    Ok(envelope) => {
                        if inbound_tx.send(envelope).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Dropping envelope from relay: {}", e),
                }
            }
            debug!("Relay connection closed");
        });

        Ok(Self {
            outbound,
            inbound,
            reader,
            writer,
        })
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Envelope> {
        self.outbound.clone()
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inbound.recv().await
    }

    /// Detaches the socket tasks; they end when the channels close.
    pub fn into_channels(
        self,
    ) -> (
        mpsc::UnboundedSender<Envelope>,
        mpsc::UnboundedReceiver<Envelope>,
    ) {
        (self.outbound, self.inbound)
    }

    /// Closes the socket immediately.
    pub fn abort(self) {
        self.reader.abort();
        self.writer.abort();
    }
}
