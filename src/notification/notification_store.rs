use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use super::notification_models::{Cursor, NotiId, NotificationRecord, ReadFlag};
use crate::pagination::Paginated;

/// What the notification panel renders: records newest-first plus bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    records: Vec<NotificationRecord>,
    unread_count: u64,
    has_more: bool,
    loading: bool,
    last_error: Option<String>,
    next_cursor: Option<Cursor>,
}

/// Every way the feed can change.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedAction {
    Replace {
        records: Vec<NotificationRecord>,
        unread_count: u64,
        next_cursor: Option<Cursor>,
    },
    /// An older page. A `None` cursor keeps the current one.
    Append {
        records: Vec<NotificationRecord>,
        next_cursor: Option<Cursor>,
    },
    /// A live push. Counts towards `unread_count` only if the record is unread.
    Prepend(NotificationRecord),
    MarkRead(NotiId),
    MarkAllRead,
    Remove(NotiId),
    RemoveAll,
    /// Panel (re)opened: more pages assumed, error cleared, first page loading.
    Refreshing,
    LoadFinished { has_more: bool },
    /// A load failed; pagination stays off until the next refresh.
    LoadFailed { message: String },
    LoadCancelled,
    Reset,
}

impl FeedState {
    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn unread_count(&self) -> u64 {
        self.unread_count
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, noti_id: NotiId) -> Option<&NotificationRecord> {
        self.records.iter().find(|r| r.noti_id == noti_id)
    }

    /// Position of the last history entry the server returned, where the next
    /// page starts. It can point past the oldest loaded record when the server
    /// sent entries that could not be decoded.
    pub fn next_cursor(&self) -> Option<Cursor> {
        self.next_cursor
    }

    pub fn reduce(&mut self, action: FeedAction) {
        match action {
            FeedAction::Replace {
                records,
                unread_count,
                next_cursor,
            } => {
                self.records = records;
                self.unread_count = unread_count;
                self.next_cursor = next_cursor;
            }
            FeedAction::Append {
                records,
                next_cursor,
            } => {
                self.records.extend(records);
                if next_cursor.is_some() {
                    self.next_cursor = next_cursor;
                }
            }
            FeedAction::Prepend(record) => {
                if self.get(record.noti_id).is_some() {
                    tracing::debug!(noti_id = record.noti_id, "Notification already in feed");
                    return;
                }
                if record.is_unread() {
                    self.unread_count += 1;
                }
                self.records.insert(0, record);
            }
            FeedAction::MarkRead(noti_id) => {
                if let Some(record) = self.records.iter_mut().find(|r| r.noti_id == noti_id) {
                    if record.is_unread() {
                        record.is_read = ReadFlag::Read;
                        self.unread_count = self.unread_count.saturating_sub(1);
                    }
                }
            }
            FeedAction::MarkAllRead => {
                for record in &mut self.records {
                    record.is_read = ReadFlag::Read;
                }
                self.unread_count = 0;
            }
            FeedAction::Remove(noti_id) => {
                if let Some(index) = self.records.iter().position(|r| r.noti_id == noti_id) {
                    let removed = self.records.remove(index);
                    if removed.is_unread() {
                        self.unread_count = self.unread_count.saturating_sub(1);
                    }
                }
            }
            FeedAction::RemoveAll => {
                self.records.clear();
                self.unread_count = 0;
            }
            FeedAction::Refreshing => {
                self.has_more = true;
                self.loading = true;
                self.last_error = None;
            }
            FeedAction::LoadFinished { has_more } => {
                self.loading = false;
                self.has_more = has_more;
            }
            FeedAction::LoadFailed { message } => {
                self.loading = false;
                self.has_more = false;
                self.last_error = Some(message);
            }
            FeedAction::LoadCancelled => {
                self.loading = false;
            }
            FeedAction::Reset => {
                *self = FeedState::default();
            }
        }
    }
}

/// Shared handle to the feed. Mutations are synchronous and applied atomically;
/// observers get every new snapshot through `subscribe`.
///
/// The store also owns the load epoch. Refreshing, cancelling and resetting
/// bump it, and results of loads started under an older epoch are dropped by
/// `dispatch_if_current`. The bump and the check both run under the channel
/// lock, so a reset can never interleave with a stale write.
#[derive(Clone)]
pub struct NotificationStore {
    state: Arc<watch::Sender<FeedState>>,
    epoch: Arc<AtomicU64>,
}

impl NotificationStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(FeedState::default());
        Self {
            state: Arc::new(state),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn dispatch(&self, action: FeedAction) {
        self.state.send_modify(|state| state.reduce(action));
    }

    /// Applies several actions as one change.
    pub fn dispatch_all(&self, actions: impl IntoIterator<Item = FeedAction>) {
        self.state.send_modify(|state| {
            for action in actions {
                state.reduce(action);
            }
        });
    }

    /// Applies the actions as one change if `epoch` is still current.
    pub fn dispatch_if_current(
        &self,
        epoch: u64,
        actions: impl IntoIterator<Item = FeedAction>,
    ) -> bool {
        self.state.send_if_modified(|state| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            for action in actions {
                state.reduce(action);
            }
            true
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn bump_and_reduce(&self, action: FeedAction) -> u64 {
        let mut epoch = 0;
        self.state.send_modify(|state| {
            epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            state.reduce(action);
        });
        epoch
    }

    /// Starts a panel refresh under a new epoch and returns it.
    pub fn begin_refresh(&self) -> u64 {
        self.bump_and_reduce(FeedAction::Refreshing)
    }

    /// Abandons loads in flight; their results will be dropped.
    pub fn cancel_loads(&self) {
        self.bump_and_reduce(FeedAction::LoadCancelled);
    }

    pub fn snapshot(&self) -> FeedState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    pub fn unread_count(&self) -> u64 {
        self.state.borrow().unread_count
    }

    pub fn next_cursor(&self) -> Option<Cursor> {
        self.state.borrow().next_cursor
    }

    /// Marks a page load as started if none is running and more pages are
    /// expected. Returns the epoch the load belongs to.
    pub fn try_begin_page(&self) -> Option<u64> {
        let mut epoch = None;
        self.state.send_if_modified(|state| {
            if state.loading || !state.has_more {
                return false;
            }
            state.loading = true;
            epoch = Some(self.epoch.load(Ordering::SeqCst));
            true
        });
        epoch
    }

    pub fn replace(&self, records: Vec<NotificationRecord>, unread_count: u64) {
        let next_cursor = records.last().map(|r| r.cursor());
        self.dispatch(FeedAction::Replace {
            records,
            unread_count,
            next_cursor,
        });
    }

    pub fn append(&self, records: Vec<NotificationRecord>) {
        let next_cursor = records.last().map(|r| r.cursor());
        self.dispatch(FeedAction::Append {
            records,
            next_cursor,
        });
    }

    pub fn prepend(&self, record: NotificationRecord) {
        self.dispatch(FeedAction::Prepend(record));
    }

    pub fn mark_read(&self, noti_id: NotiId) {
        self.dispatch(FeedAction::MarkRead(noti_id));
    }

    pub fn mark_all_read(&self) {
        self.dispatch(FeedAction::MarkAllRead);
    }

    pub fn remove(&self, noti_id: NotiId) {
        self.dispatch(FeedAction::Remove(noti_id));
    }

    pub fn remove_all(&self) {
        self.dispatch(FeedAction::RemoveAll);
    }

    /// Drops the feed and every load still in flight.
    pub fn reset(&self) {
        self.bump_and_reduce(FeedAction::Reset);
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}
