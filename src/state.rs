use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{AppError, Result};
use crate::live::Credential;
use crate::notification::{
    NotificationRepository, NotificationService, NotificationStore, UserId,
};

/// A signed-in user and the bearer credential issued for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub credential: Credential,
}

/// Holder of the current session; the live client and REST calls read from it.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn login(&self, session: Session) {
        tracing::info!(user_id = session.user_id, "Session started");
        self.tx.send_replace(Some(session));
    }

    pub fn logout(&self) {
        if self.tx.send_replace(None).is_some() {
            tracing::info!("Session ended");
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.tx.borrow().as_ref().map(|s| s.credential.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub live_path: String,
    pub page_size: usize,
    pub heartbeat_timeout: Duration,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so it can be driven without touching the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("STAY_API_URL")
            .ok_or_else(|| AppError::Config("STAY_API_URL must be set".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let live_path = lookup("STAY_LIVE_PATH")
            .unwrap_or_else(|| "/notifications/subscribe".to_string());

        let page_size: usize = parse_or(&lookup, "STAY_PAGE_SIZE", 10)?;
        if page_size == 0 {
            return Err(AppError::Config(
                "STAY_PAGE_SIZE must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_base_url,
            live_path,
            page_size,
            heartbeat_timeout: Duration::from_secs(parse_or(
                &lookup,
                "STAY_HEARTBEAT_TIMEOUT_SECS",
                120,
            )?),
            retry_delay: Duration::from_millis(parse_or(&lookup, "STAY_RETRY_DELAY_MS", 3000)?),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "STAY_REQUEST_TIMEOUT_SECS",
                10,
            )?),
        })
    }

    pub fn live_url(&self) -> String {
        if self.live_path.starts_with('/') {
            format!("{}{}", self.api_base_url, self.live_path)
        } else {
            format!("{}/{}", self.api_base_url, self.live_path)
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a number, got {:?}", key, raw))),
        None => Ok(default),
    }
}

/// Application-wide container handed to every component that needs shared state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: SessionStore,
    pub notification_store: NotificationStore,
    pub notification_repository: Arc<dyn NotificationRepository>,
}

impl AppState {
    pub fn notification_service(&self, user_id: UserId) -> NotificationService {
        NotificationService::new(
            self.notification_repository.clone(),
            self.notification_store.clone(),
            user_id,
            self.config.page_size,
        )
    }

    /// Clears the session and the feed that belonged to it. Loads still in
    /// flight for that session are dropped when they finish.
    pub fn logout(&self) {
        self.session.logout();
        self.notification_store.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[("STAY_API_URL", "http://api.local/")])).unwrap();

        assert_eq!(config.api_base_url, "http://api.local");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(120));
        assert_eq!(config.live_url(), "http://api.local/notifications/subscribe");
    }

    #[test]
    fn test_config_requires_base_url() {
        assert!(matches!(
            Config::from_lookup(lookup(&[])),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_config_rejects_bad_numbers() {
        let result = Config::from_lookup(lookup(&[
            ("STAY_API_URL", "http://api.local"),
            ("STAY_PAGE_SIZE", "ten"),
        ]));
        assert!(matches!(result, Err(AppError::Config(_))));

        let result = Config::from_lookup(lookup(&[
            ("STAY_API_URL", "http://api.local"),
            ("STAY_PAGE_SIZE", "0"),
        ]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_session_store_login_logout() {
        let sessions = SessionStore::new();
        let rx = sessions.subscribe();
        assert!(sessions.current().is_none());

        sessions.login(Session {
            user_id: 7,
            credential: Credential::new("token-a"),
        });
        assert_eq!(sessions.credential(), Some(Credential::new("token-a")));
        assert_eq!(rx.borrow().as_ref().map(|s| s.user_id), Some(7));

        sessions.logout();
        assert!(sessions.current().is_none());
    }
}
