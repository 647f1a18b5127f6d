use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::notification::NotificationRecord;

use super::sse::{SseDecoder, SseFrame};
use super::transport::{ChunkStream, PushTransport};
use super::types::{
    ConnectionState, Credential, LiveEvent, LiveGeneration, LiveMessage, LiveSettings,
    NEW_NOTIFICATION_EVENT,
};

/// Everything one connection task needs; owned by the task.
pub(crate) struct ConnectionContext {
    pub transport: Arc<dyn PushTransport>,
    pub credential: Credential,
    pub settings: LiveSettings,
    pub generation: u64,
    pub current: LiveGeneration,
    pub events: mpsc::UnboundedSender<LiveMessage>,
    pub state: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionContext {
    fn is_current(&self) -> bool {
        self.current.is_current(self.generation)
    }

    /// The generation check runs under the state lock, the same lock
    /// `LiveEventClient::close` holds while it retires the generation.
    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if !self.is_current() || *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    fn emit(&self, event: LiveEvent) {
        if !self.is_current() {
            return;
        }
        let message = LiveMessage {
            generation: self.generation,
            event,
        };
        if self.events.send(message).is_err() {
            debug!(generation = self.generation, "No live event consumer");
        }
    }
}

/// Connects, pumps events, and reconnects until the credential is rejected or the task is aborted.
pub(crate) async fn run_connection(ctx: ConnectionContext) {
    let mut retry_delay = ctx.settings.retry_delay;

    loop {
        let attempt = Uuid::new_v4();
        ctx.set_state(ConnectionState::Connecting);
        debug!(generation = ctx.generation, %attempt, "Opening live connection");

        match ctx.transport.connect(&ctx.credential).await {
            Ok(stream) => {
                ctx.set_state(ConnectionState::Open);
                ctx.emit(LiveEvent::Connected);
                info!(generation = ctx.generation, %attempt, "Live connection open");

                let reason = pump(&ctx, stream, &mut retry_delay).await;
                warn!(
                    generation = ctx.generation,
                    %attempt,
                    "Live connection lost: {}",
                    reason
                );
            }
            Err(AppError::Auth { status }) => {
                warn!(
                    generation = ctx.generation,
                    status, "Live connection rejected; waiting for a new credential"
                );
                ctx.set_state(ConnectionState::AuthFailed);
                ctx.emit(LiveEvent::AuthFailed { status });
                return;
            }
            Err(e) => {
                warn!(generation = ctx.generation, %attempt, "Live connection failed: {}", e);
            }
        }

        ctx.set_state(ConnectionState::Connecting);
        tokio::time::sleep(retry_delay).await;
    }
}

/// Reads the stream until it ends, errors, or stays silent past the heartbeat window.
async fn pump(ctx: &ConnectionContext, mut stream: ChunkStream, retry_delay: &mut Duration) -> AppError {
    let mut decoder = SseDecoder::new();

    loop {
        let next = tokio::time::timeout(ctx.settings.heartbeat_timeout, stream.next()).await;
        let chunk = match next {
            Err(_) => return AppError::HeartbeatTimeout(ctx.settings.heartbeat_timeout),
            Ok(None) => return AppError::StreamClosed,
            Ok(Some(Err(e))) => return e,
            Ok(Some(Ok(chunk))) => chunk,
        };

        for frame in decoder.feed(&chunk) {
            dispatch_frame(ctx, frame);
        }
        if let Some(delay) = decoder.take_retry() {
            debug!(?delay, "Server changed reconnect delay");
            *retry_delay = delay;
        }
    }
}

fn dispatch_frame(ctx: &ConnectionContext, frame: SseFrame) {
    if frame.event != NEW_NOTIFICATION_EVENT {
        debug!(event = %frame.event, "Ignoring live event");
        return;
    }

    match serde_json::from_str::<NotificationRecord>(&frame.data) {
        Ok(record) => {
            debug!(noti_id = record.noti_id, noti_type = %record.noti_type(), "Live notification");
            ctx.emit(LiveEvent::NewNotification(record));
        }
        Err(e) => {
            warn!(
                generation = ctx.generation,
                id = ?frame.id,
                "Dropping malformed notification payload: {}",
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl PushTransport for Unreachable {
        async fn connect(&self, _credential: &Credential) -> crate::error::Result<ChunkStream> {
            Err(AppError::StreamClosed)
        }
    }

    fn context(
        current: &LiveGeneration,
    ) -> (ConnectionContext, mpsc::UnboundedReceiver<LiveMessage>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let ctx = ConnectionContext {
            transport: Arc::new(Unreachable),
            credential: Credential::new("a"),
            settings: LiveSettings::default(),
            generation: current.advance(),
            current: current.clone(),
            events,
            state: Arc::new(state),
        };
        (ctx, rx)
    }

    #[test]
    fn test_retired_connection_cannot_touch_state() {
        let generation = LiveGeneration::default();
        let (ctx, mut rx) = context(&generation);

        ctx.set_state(ConnectionState::Open);
        assert_eq!(*ctx.state.borrow(), ConnectionState::Open);

        ctx.state.send_modify(|state| {
            generation.advance();
            *state = ConnectionState::Disconnected;
        });
        ctx.set_state(ConnectionState::Open);
        ctx.emit(LiveEvent::Connected);

        assert_eq!(*ctx.state.borrow(), ConnectionState::Disconnected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_non_notification_frames_are_ignored() {
        let generation = LiveGeneration::default();
        let (ctx, mut rx) = context(&generation);

        dispatch_frame(
            &ctx,
            SseFrame {
                event: "connect".to_string(),
                data: "connected".to_string(),
                id: None,
            },
        );

        assert!(rx.try_recv().is_err());
    }
}
