use crate::MeshError;
use crate::mesh::MeshCommand;
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use gameverse_core::{ParticipantId, SignalMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Relay client speaking JSON [`SignalMessage`] frames over a WebSocket.
///
/// The relay identifies the client by the last path segment of the URL.
/// Inbound frames addressed to this client are turned into
/// [`MeshCommand`]s and pushed to `commands`.
///
/// Only a weak reference to `commands` is kept, so the client never keeps a
/// mesh alive on its own. Dropping the client stops reading; frames already
/// queued (such as the final `leave-room`) are still written before the
/// socket is closed.
pub struct WsSignaling {
    local_id: ParticipantId,
    send_tx: mpsc::UnboundedSender<SignalMessage>,
    reader: JoinHandle<()>,
}

impl WsSignaling {
    pub async fn connect(
        url: &str,
        local_id: ParticipantId,
        commands: &mpsc::Sender<MeshCommand>,
    ) -> Result<Self, MeshError> {
        let url = format!("{}/{}", url.trim_end_matches('/'), local_id);
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| MeshError::SignalingConnect(e.to_string()))?;
        info!("Signaling connected to {}", url);

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (send_tx, mut send_rx) = mpsc::unbounded_channel::<SignalMessage>();

        tokio::spawn(async move {
            while let Some(message) = send_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Dropping unserializable {} message: {}", message.kind(), e);
                        continue;
                    }
                };
                if ws_write.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_write.close().await;
        });

        let reader_id = local_id.clone();
        let commands = commands.downgrade();
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_read.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(data)) => match String::from_utf8(data) {
                        Ok(text) => text,
                        Err(_) => continue,
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Signaling socket error: {}", e);
                        break;
                    }
                };

                let message = match serde_json::from_str::<SignalMessage>(&text) {
                    Ok(message) => message,
                    Err(e) => {
                        debug!("Ignoring malformed signaling frame: {}", e);
                        continue;
                    }
                };

                let Some(command) = MeshCommand::from_signal(message, &reader_id) else {
                    continue;
                };
                let Some(commands) = commands.upgrade() else {
                    break;
                };
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            info!("Signaling connection closed");
        });

        Ok(Self {
            local_id,
            send_tx,
            reader,
        })
    }

    pub fn is_open(&self) -> bool {
        !self.send_tx.is_closed()
    }
}

#[async_trait]
impl SignalingOutput for WsSignaling {
    fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    async fn send(&self, message: SignalMessage) {
        let kind = message.kind();
        if self.send_tx.send(message).is_err() {
            warn!("{}: {} not sent", MeshError::SignalingClosed, kind);
        }
    }
}

impl Drop for WsSignaling {
    fn drop(&mut self) {
        // The writer ends by itself once `send_tx` is gone.
        self.reader.abort();
    }
}
