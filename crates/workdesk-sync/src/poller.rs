//! Poll-based client sync.
//!
//! The server never pushes. A client learns about messages from other
//! accounts on its next tick (every [`DEFAULT_POLL_INTERVAL`]), and refreshes
//! immediately only after its own actions: opening a thread or sending.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use workdesk_types::api::{ConversationResponse, SendMessageRequest, SendMessageResponse};
use workdesk_types::models::Message;

use crate::cache::ThreadCache;
use crate::client::{HttpClient, MessagingClient};
use crate::error::SyncError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub token: String,
    pub poll_interval: Duration,
    pub cache_ttl: Duration,
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadView {
    pub conversation_key: String,
    pub messages: Vec<Message>,
    /// Rendered from the cache while a fetch is pending or after it failed.
    pub from_cache: bool,
    pub stale: bool,
}

/// What the UI renders. Published on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSnapshot {
    pub conversations: Vec<ConversationResponse>,
    pub open_thread: Option<ThreadView>,
    pub last_error: Option<String>,
    pub ticks: u64,
}

impl SyncSnapshot {
    pub fn unread_total(&self) -> u32 {
        self.conversations.iter().map(|c| c.unread_count).sum()
    }
}

/// Requests from the UI to a running poller.
pub enum SyncCommand {
    Open {
        conversation_key: String,
        reply: oneshot::Sender<Result<ThreadView, SyncError>>,
    },
    Close,
    Send {
        request: SendMessageRequest,
        reply: oneshot::Sender<Result<SendMessageResponse, SyncError>>,
    },
    Refresh,
}

pub struct SyncPoller<C> {
    client: C,
    config: SyncConfig,
    cache: ThreadCache,
    conversations: Vec<ConversationResponse>,
    open_key: Option<String>,
    open_view: Option<ThreadView>,
    last_error: Option<String>,
    ticks: u64,
    snapshot_tx: watch::Sender<SyncSnapshot>,
}

impl SyncPoller<HttpClient> {
    /// Poller talking to the API at `config.base_url` with `config.token`.
    pub fn connect(config: SyncConfig) -> Self {
        let client = HttpClient::new(config.base_url.clone(), config.token.clone());
        Self::new(client, config)
    }
}

impl<C: MessagingClient> SyncPoller<C> {
    pub fn new(client: C, config: SyncConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(SyncSnapshot::default());
        Self {
            client,
            cache: ThreadCache::new(config.cache_ttl),
            config,
            conversations: Vec::new(),
            open_key: None,
            open_view: None,
            last_error: None,
            ticks: 0,
            snapshot_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// One scheduled poll: conversation list, then the open thread. If the
    /// open thread has unread messages they are marked read after the fetched
    /// copy is published.
    pub async fn tick(&mut self) -> Result<(), SyncError> {
        self.ticks += 1;
        match self.poll_once().await {
            Ok(()) => {
                self.succeed();
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn poll_once(&mut self) -> Result<(), SyncError> {
        self.refresh_conversations().await?;

        if let Some(key) = self.open_key.clone() {
            self.fetch_thread(&key).await?;
            if self.unread_in(&key) > 0 {
                self.mark_read(&key).await?;
            }
        }

        let evicted = self.cache.evict_expired(self.open_key.as_deref());
        if evicted > 0 {
            debug!("Evicted {} expired thread(s) from cache", evicted);
        }
        Ok(())
    }

    /// Open a thread: render the cached copy at once if there is one, then
    /// fetch, publish, mark read, and refresh the conversation list.
    pub async fn open_thread(&mut self, conversation_key: &str) -> Result<ThreadView, SyncError> {
        self.open_key = Some(conversation_key.to_string());
        self.open_view = self.cache.get(conversation_key).map(|cached| ThreadView {
            conversation_key: conversation_key.to_string(),
            messages: cached.messages,
            from_cache: true,
            stale: cached.stale,
        });
        self.publish();

        match self.load_thread(conversation_key).await {
            Ok(view) => {
                self.succeed();
                Ok(view)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn load_thread(&mut self, conversation_key: &str) -> Result<ThreadView, SyncError> {
        let view = self.fetch_thread(conversation_key).await?;
        self.mark_read(conversation_key).await?;
        self.refresh_conversations().await?;
        Ok(view)
    }

    pub fn close_thread(&mut self) {
        self.open_key = None;
        self.open_view = None;
        self.publish();
    }

    /// Send, then re-fetch the sender's own thread and list so its view is
    /// fresh without waiting for a tick. A failed refresh is recorded but the
    /// send still counts as done.
    pub async fn send(&mut self, req: &SendMessageRequest) -> Result<SendMessageResponse, SyncError> {
        let resp = match self.client.send_message(req).await {
            Ok(resp) => resp,
            Err(e) => return Err(self.fail(e)),
        };

        match self.refresh_after_send(&resp).await {
            Ok(()) => self.succeed(),
            Err(e) => {
                self.fail(e);
            }
        }
        Ok(resp)
    }

    async fn refresh_after_send(&mut self, resp: &SendMessageResponse) -> Result<(), SyncError> {
        if let Some(key) = resp.conversation_key.as_deref() {
            self.fetch_thread(key).await?;
        }
        self.refresh_conversations().await
    }

    /// Drive the poller until `shutdown` flips to true or every command
    /// sender is gone. Failed ticks are logged and retried on the next one.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SyncCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Sync poller started ({:?} interval)", self.config.poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let _ = self.tick().await;
                }
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Sync poller stopped after {} tick(s)", self.ticks);
    }

    async fn handle(&mut self, cmd: SyncCommand) {
        match cmd {
            SyncCommand::Open {
                conversation_key,
                reply,
            } => {
                let _ = reply.send(self.open_thread(&conversation_key).await);
            }
            SyncCommand::Close => self.close_thread(),
            SyncCommand::Send { request, reply } => {
                let _ = reply.send(self.send(&request).await);
            }
            SyncCommand::Refresh => {
                let _ = self.tick().await;
            }
        }
    }

    async fn refresh_conversations(&mut self) -> Result<(), SyncError> {
        self.conversations = self.client.list_conversations().await?;
        self.publish();
        Ok(())
    }

    /// A successful fetch always supersedes the cached copy.
    async fn fetch_thread(&mut self, conversation_key: &str) -> Result<ThreadView, SyncError> {
        let messages = self.client.list_messages(conversation_key).await?;
        self.cache.put(conversation_key, messages.clone());

        let view = ThreadView {
            conversation_key: conversation_key.to_string(),
            messages,
            from_cache: false,
            stale: false,
        };
        if self.open_key.as_deref() == Some(conversation_key) {
            self.open_view = Some(view.clone());
            self.publish();
        }
        Ok(view)
    }

    async fn mark_read(&mut self, conversation_key: &str) -> Result<(), SyncError> {
        let updated = self.client.mark_conversation_read(conversation_key).await?;
        debug!("Marked {} message(s) read in {}", updated, conversation_key);

        for c in self
            .conversations
            .iter_mut()
            .filter(|c| c.conversation_key == conversation_key)
        {
            c.unread_count = 0;
        }
        self.publish();
        Ok(())
    }

    fn unread_in(&self, conversation_key: &str) -> u32 {
        self.conversations
            .iter()
            .find(|c| c.conversation_key == conversation_key)
            .map_or(0, |c| c.unread_count)
    }

    fn succeed(&mut self) {
        self.last_error = None;
        self.publish();
    }

    fn fail(&mut self, e: SyncError) -> SyncError {
        warn!("Sync failed, keeping last view: {}", e);
        self.last_error = Some(e.to_string());
        self.publish();
        e
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SyncSnapshot {
            conversations: self.conversations.clone(),
            open_thread: self.open_view.clone(),
            last_error: self.last_error.clone(),
            ticks: self.ticks,
        });
    }
}
