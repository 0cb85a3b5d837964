//! Polling client for the workdesk messaging API.

pub mod cache;
pub mod client;
pub mod error;
pub mod handle;
pub mod poller;

pub use client::{HttpClient, MessagingClient};
pub use error::SyncError;
pub use handle::SyncHandle;
pub use poller::{SyncCommand, SyncConfig, SyncPoller, SyncSnapshot, ThreadView};
