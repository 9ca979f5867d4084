use crate::error::ClientError;
use crate::mesh::mesh_coordinator::MeshCommand;
use crate::peer::LinkState;
use crate::transport::MediaSource;
use huddle_core::{RoomCode, RoomMembership, SessionId};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

/// Cloneable front for a running [`MeshCoordinator`](crate::MeshCoordinator).
#[derive(Clone)]
pub struct MeshHandle {
    commands: mpsc::UnboundedSender<MeshCommand>,
}

impl MeshHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<MeshCommand>) -> Self {
        Self { commands }
    }

    /// Joins `room` and resolves with the relay's acknowledgement. The code
    /// is checked locally before anything is sent. Fails with
    /// [`ClientError::JoinPending`] while an earlier join is unanswered.
    pub async fn join(&self, room: &str) -> Result<RoomMembership, ClientError> {
        let room = RoomCode::parse(room)?;
        self.request(|reply| MeshCommand::Join { room, reply })
            .await?
    }

    /// Closes every link and leaves the current room.
    pub async fn leave(&self) -> Result<(), ClientError> {
        self.request(|reply| MeshCommand::Leave { reply }).await?
    }

    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), ClientError> {
        let text = text.into();
        self.request(|reply| MeshCommand::Chat { text, reply })
            .await?
    }

    /// Switches the outgoing video and renegotiates every link.
    pub async fn set_local_media(&self, source: MediaSource) -> Result<(), ClientError> {
        self.request(|reply| MeshCommand::SetLocalMedia { source, reply })
            .await
    }

    pub async fn membership(&self) -> Result<Option<RoomMembership>, ClientError> {
        self.request(|reply| MeshCommand::Membership { reply }).await
    }

    pub async fn link_states(&self) -> Result<HashMap<SessionId, LinkState>, ClientError> {
        self.request(|reply| MeshCommand::LinkStates { reply }).await
    }

    pub async fn link_state(&self, remote: SessionId) -> Result<Option<LinkState>, ClientError> {
        Ok(self.link_states().await?.get(&remote).copied())
    }

    /// Stops the coordinator after closing every link. Does not send `leave`;
    /// the relay sees the transport go away instead.
    pub fn shutdown(&self) {
        let _ = self.commands.send(MeshCommand::Shutdown);
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> MeshCommand,
    ) -> Result<T, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .map_err(|_| ClientError::CoordinatorStopped)?;
        reply_rx.await.map_err(|_| ClientError::CoordinatorStopped)
    }
}
