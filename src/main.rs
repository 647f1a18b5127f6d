use std::sync::Arc;

use anyhow::Context;
use stay_notify::live::{Credential, LiveEventClient, LiveSettings, SseTransport};
use stay_notify::notification::{HttpNotificationRepository, NotificationStore};
use stay_notify::{AppState, Config, Session, SessionStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stay_notify=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let token = std::env::var("STAY_ACCESS_TOKEN").context("STAY_ACCESS_TOKEN must be set")?;
    let user_id: i64 = std::env::var("STAY_USER_ID")
        .context("STAY_USER_ID must be set")?
        .parse()
        .context("STAY_USER_ID must be a number")?;

    // REST calls are bounded; the event stream must not be.
    let rest_http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;
    let live_http = reqwest::Client::builder()
        .connect_timeout(config.request_timeout)
        .build()?;

    let session = SessionStore::new();
    let repository = HttpNotificationRepository::new(
        rest_http,
        config.api_base_url.clone(),
        session.clone(),
    );

    let state = AppState {
        config: config.clone(),
        session: session.clone(),
        notification_store: NotificationStore::new(),
        notification_repository: Arc::new(repository),
    };

    // Live client owns the connection and follows the session.
    let (live_client, live_rx) = LiveEventClient::new(
        Arc::new(SseTransport::new(live_http, config.live_url())),
        LiveSettings {
            heartbeat_timeout: config.heartbeat_timeout,
            retry_delay: config.retry_delay,
        },
    );
    let notifications = state
        .notification_service(user_id)
        .with_live_generation(live_client.generation());
    let live_task = tokio::spawn(live_client.run(session.subscribe()));
    let listener = notifications.spawn_live_listener(live_rx);

    state.session.login(Session {
        user_id,
        credential: Credential::new(token),
    });

    if let Err(e) = notifications.open_panel().await {
        tracing::warn!("{}", e.user_message());
    }
    let feed = notifications.store().snapshot();
    tracing::info!(
        records = feed.len(),
        unread = feed.unread_count(),
        has_more = feed.has_more(),
        "Notification feed ready"
    );

    let mut changes = notifications.store().subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let feed = changes.borrow_and_update().clone();
                if let Some(latest) = feed.records().first() {
                    tracing::info!(
                        noti_id = latest.noti_id,
                        noti_type = %latest.noti_type(),
                        unread = feed.unread_count(),
                        "Feed updated"
                    );
                }
            }
        }
    }

    tracing::info!("Shutting down");
    state.logout();
    // Dropping the client tears down any connection still open.
    live_task.abort();
    listener.abort();

    Ok(())
}
