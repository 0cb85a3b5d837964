use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use workdesk_types::api::{SendMessageRequest, SendMessageResponse};

use crate::client::MessagingClient;
use crate::error::SyncError;
use crate::poller::{SyncCommand, SyncPoller, SyncSnapshot, ThreadView};

const COMMAND_BUFFER: usize = 32;

/// UI-side handle to a poller running on its own task.
pub struct SyncHandle {
    commands: mpsc::Sender<SyncCommand>,
    snapshots: watch::Receiver<SyncSnapshot>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<C: MessagingClient + 'static> SyncPoller<C> {
    pub fn spawn(self) -> SyncHandle {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let snapshots = self.subscribe();
        let task = tokio::spawn(self.run(rx, shutdown_rx));

        SyncHandle {
            commands,
            snapshots,
            shutdown,
            task,
        }
    }
}

impl SyncHandle {
    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A fresh receiver; `changed()` fires on every publish.
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshots.clone()
    }

    pub async fn open_thread(&self, conversation_key: &str) -> Result<ThreadView, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.request(SyncCommand::Open {
            conversation_key: conversation_key.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SyncError::Stopped)?
    }

    pub async fn close_thread(&self) -> Result<(), SyncError> {
        self.request(SyncCommand::Close).await
    }

    pub async fn send(&self, request: SendMessageRequest) -> Result<SendMessageResponse, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.request(SyncCommand::Send { request, reply }).await?;
        rx.await.map_err(|_| SyncError::Stopped)?
    }

    /// Poll now instead of waiting for the next tick.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.request(SyncCommand::Refresh).await
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    async fn request(&self, cmd: SyncCommand) -> Result<(), SyncError> {
        self.commands.send(cmd).await.map_err(|_| SyncError::Stopped)
    }
}
