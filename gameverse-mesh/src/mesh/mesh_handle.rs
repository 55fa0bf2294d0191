use crate::MeshError;
use crate::mesh::{MeshCommand, MeshEvent, MeshStatus};
use tokio::sync::{mpsc, watch};

/// UI-side handle to a running coordinator.
pub struct MeshHandle {
    commands: mpsc::Sender<MeshCommand>,
    status: watch::Receiver<MeshStatus>,
    events: mpsc::Receiver<MeshEvent>,
}

impl MeshHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<MeshCommand>,
        status: watch::Receiver<MeshStatus>,
        events: mpsc::Receiver<MeshEvent>,
    ) -> Self {
        Self {
            commands,
            status,
            events,
        }
    }

    /// Tears the mesh down and rebuilds it with reduced media.
    pub async fn reconnect(&self) -> Result<(), MeshError> {
        self.send(MeshCommand::Reconnect).await
    }

    pub async fn leave(&self) -> Result<(), MeshError> {
        self.send(MeshCommand::Leave).await
    }

    pub async fn send(&self, command: MeshCommand) -> Result<(), MeshError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| MeshError::Stopped)
    }

    pub fn command_sender(&self) -> mpsc::Sender<MeshCommand> {
        self.commands.clone()
    }

    pub fn status(&self) -> MeshStatus {
        self.status.borrow().clone()
    }

    pub fn status_updates(&self) -> watch::Receiver<MeshStatus> {
        self.status.clone()
    }

    pub async fn next_event(&mut self) -> Option<MeshEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<MeshEvent> {
        self.events.try_recv().ok()
    }
}
