use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::notification::NotificationRecord;

/// Server event name carrying a JSON `NotificationRecord`.
pub const NEW_NOTIFICATION_EVENT: &str = "new-notification";

/// Bearer token for the live channel. Debug output never shows the token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// The server rejected the credential; only a new credential reconnects.
    AuthFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Connected,
    NewNotification(NotificationRecord),
    AuthFailed { status: u16 },
}

/// A live event tagged with the connection generation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveMessage {
    pub generation: u64,
    pub event: LiveEvent,
}

/// Shared counter identifying the current connection; bumped on every teardown.
#[derive(Debug, Clone, Default)]
pub struct LiveGeneration(Arc<AtomicU64>);

impl LiveGeneration {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }

    pub(crate) fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSettings {
    /// Silence longer than this counts as a dead connection.
    pub heartbeat_timeout: Duration,
    /// Delay before reconnecting; the server may change it with `retry:`.
    pub retry_delay: Duration,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(120),
            retry_delay: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.token(), "secret-token");
    }

    #[test]
    fn test_generation_advances() {
        let generation = LiveGeneration::default();
        let first = generation.advance();
        assert!(generation.is_current(first));

        generation.advance();
        assert!(!generation.is_current(first));
    }
}
