use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::live::{LiveEvent, LiveGeneration, LiveMessage};
use crate::pagination::{Batch, CursorPager, PageSource};
use crate::viewport::{TriggerGate, ViewportTrigger};

use super::notification_models::{Cursor, NotiId, NotificationRecord, UserId};
use super::notification_repository::NotificationRepository;
use super::notification_store::{FeedAction, NotificationStore};

/// One user's notification history as a page source.
pub struct NotificationPages {
    repo: Arc<dyn NotificationRepository>,
    user_id: UserId,
}

impl NotificationPages {
    pub fn new(repo: Arc<dyn NotificationRepository>, user_id: UserId) -> Self {
        Self { repo, user_id }
    }
}

#[async_trait]
impl PageSource for NotificationPages {
    type Item = NotificationRecord;
    type Cursor = Cursor;

    async fn fetch(
        &self,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<Batch<NotificationRecord, Cursor>> {
        self.repo.find_page(self.user_id, cursor, limit).await
    }
}

/// Drives the notification panel: refresh on open, scroll pagination, read and
/// delete actions, and live pushes, all written through the shared store.
#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    pager: Arc<CursorPager<NotificationPages>>,
    store: NotificationStore,
    user_id: UserId,
    page_size: usize,
    live_generation: Option<LiveGeneration>,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        store: NotificationStore,
        user_id: UserId,
        page_size: usize,
    ) -> Self {
        let pager = CursorPager::new(NotificationPages::new(repo.clone(), user_id));
        Self {
            repo,
            pager: Arc::new(pager),
            store,
            user_id,
            page_size,
            live_generation: None,
        }
    }

    /// Only live messages from the connection `generation` currently names are applied.
    pub fn with_live_generation(mut self, generation: LiveGeneration) -> Self {
        self.live_generation = Some(generation);
        self
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Reloads the first page and the unread count. On failure the records
    /// already shown stay in place and an inline error is set.
    ///
    /// Results that arrive after the panel was closed, reopened or reset are
    /// dropped and the call returns `Ok(())`.
    pub async fn open_panel(&self) -> Result<()> {
        let epoch = self.store.begin_refresh();

        let result = tokio::try_join!(
            self.pager.fetch_first_page(self.page_size),
            self.repo.count_unread(self.user_id),
        );

        match result {
            Ok((page, unread_count)) => {
                let records = page.items.len();
                let applied = self.store.dispatch_if_current(
                    epoch,
                    [
                        FeedAction::Replace {
                            records: page.items,
                            unread_count,
                            next_cursor: page.next_cursor,
                        },
                        FeedAction::LoadFinished {
                            has_more: page.has_more,
                        },
                    ],
                );
                if !applied {
                    debug!(user_id = self.user_id, epoch, "Discarding stale panel refresh");
                    return Ok(());
                }
                info!(
                    user_id = self.user_id,
                    records,
                    unread_count,
                    "Notification panel loaded"
                );
                Ok(())
            }
            Err(e) => {
                let applied = self.store.dispatch_if_current(
                    epoch,
                    [FeedAction::LoadFailed {
                        message: e.user_message(),
                    }],
                );
                if !applied {
                    debug!(user_id = self.user_id, epoch, "Discarding stale panel failure: {}", e);
                    return Ok(());
                }
                error!(user_id = self.user_id, "Failed to load notifications: {}", e);
                Err(e)
            }
        }
    }

    /// Loads the next older page. Returns `Ok(false)` without a request when a
    /// load is already running or the feed is exhausted.
    pub async fn load_more(&self) -> Result<bool> {
        let Some(epoch) = self.store.try_begin_page() else {
            return Ok(false);
        };

        let Some(cursor) = self.store.next_cursor() else {
            self.store
                .dispatch_if_current(epoch, [FeedAction::LoadFinished { has_more: false }]);
            return Ok(false);
        };

        let result = self.pager.fetch_next_page(&cursor, self.page_size).await;

        match result {
            Ok(page) => {
                let records = page.items.len();
                let has_more = page.has_more;
                let applied = self.store.dispatch_if_current(
                    epoch,
                    [
                        FeedAction::Append {
                            records: page.items,
                            next_cursor: page.next_cursor,
                        },
                        FeedAction::LoadFinished { has_more },
                    ],
                );
                if !applied {
                    debug!(user_id = self.user_id, epoch, "Discarding stale page");
                    return Ok(false);
                }
                debug!(
                    user_id = self.user_id,
                    last_id = cursor.last_id,
                    records,
                    has_more,
                    "Loaded older notifications"
                );
                Ok(true)
            }
            Err(e) => {
                let applied = self.store.dispatch_if_current(
                    epoch,
                    [FeedAction::LoadFailed {
                        message: e.user_message(),
                    }],
                );
                if !applied {
                    debug!(user_id = self.user_id, epoch, "Discarding stale page failure: {}", e);
                    return Ok(false);
                }
                error!(user_id = self.user_id, "Failed to load older notifications: {}", e);
                Err(e)
            }
        }
    }

    /// Stops applying results of requests still in flight.
    pub fn close_panel(&self) {
        self.store.cancel_loads();
    }

    /// Current gates for the scroll sentinel.
    pub fn trigger_gate(&self) -> TriggerGate {
        let state = self.store.snapshot();
        TriggerGate {
            loading: state.loading(),
            has_more: state.has_more(),
        }
    }

    /// Builds a sentinel trigger that schedules `load_more` on the current runtime.
    pub fn sentinel_trigger(&self, threshold: f64) -> Result<ViewportTrigger> {
        let service = self.clone();
        ViewportTrigger::new(threshold, move || {
            let service = service.clone();
            tokio::spawn(async move {
                if let Err(e) = service.load_more().await {
                    debug!("Scroll pagination stopped: {}", e);
                }
            });
        })
    }

    pub async fn mark_read(&self, noti_id: NotiId) -> Result<()> {
        self.remote("mark notification read", self.repo.mark_as_read(noti_id))
            .await?;
        self.store.mark_read(noti_id);
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.remote(
            "mark all notifications read",
            self.repo.mark_all_as_read(self.user_id),
        )
        .await?;
        self.store.mark_all_read();
        Ok(())
    }

    pub async fn remove(&self, noti_id: NotiId) -> Result<()> {
        self.remote("delete notification", self.repo.delete(noti_id))
            .await?;
        self.store.remove(noti_id);
        Ok(())
    }

    pub async fn remove_all(&self) -> Result<()> {
        self.remote("delete all notifications", self.repo.delete_all(self.user_id))
            .await?;
        self.store.remove_all();
        Ok(())
    }

    async fn remote<F>(&self, action: &str, call: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        call.await.map_err(|e| {
            error!(user_id = self.user_id, "Failed to {}: {}", action, e);
            e
        })
    }

    /// Applies one message from the live client.
    pub fn handle_live(&self, message: LiveMessage) {
        if let Some(generation) = &self.live_generation {
            if !generation.is_current(message.generation) {
                debug!(generation = message.generation, "Ignoring message from closed connection");
                return;
            }
        }

        match message.event {
            LiveEvent::NewNotification(record) => {
                if record.user_id != self.user_id {
                    warn!(
                        user_id = self.user_id,
                        owner = record.user_id,
                        noti_id = record.noti_id,
                        "Dropping notification addressed to another user"
                    );
                    return;
                }
                self.store.prepend(record);
            }
            LiveEvent::Connected => {
                debug!(user_id = self.user_id, "Live updates connected");
            }
            LiveEvent::AuthFailed { status } => {
                warn!(user_id = self.user_id, status, "Live updates need a new sign-in");
            }
        }
    }

    /// Drains live messages into the store until the channel closes.
    pub fn spawn_live_listener(&self, mut rx: mpsc::UnboundedReceiver<LiveMessage>) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                service.handle_live(message);
            }
            debug!(user_id = service.user_id, "Live listener stopped");
        })
    }

    /// Drops the feed and abandons loads in flight, for logout.
    pub fn reset(&self) {
        self.store.reset();
    }
}
