use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::state::Session;

use super::handler::{run_connection, ConnectionContext};
use super::transport::PushTransport;
use super::types::{ConnectionState, Credential, LiveGeneration, LiveMessage, LiveSettings};

struct ActiveConnection {
    credential: Credential,
    task: JoinHandle<()>,
}

/// Sole owner of the process-wide live connection.
///
/// At most one connection task runs at a time, keyed by the credential it was
/// opened with. Everything else observes it through `LiveMessage`s and the
/// state channel.
pub struct LiveEventClient {
    transport: Arc<dyn PushTransport>,
    settings: LiveSettings,
    events: mpsc::UnboundedSender<LiveMessage>,
    state: Arc<watch::Sender<ConnectionState>>,
    generation: LiveGeneration,
    active: Option<ActiveConnection>,
}

impl LiveEventClient {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        settings: LiveSettings,
    ) -> (Self, mpsc::UnboundedReceiver<LiveMessage>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        let client = Self {
            transport,
            settings,
            events,
            state: Arc::new(state),
            generation: LiveGeneration::default(),
            active: None,
        };

        (client, rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Handle consumers use to discard messages from torn-down connections.
    pub fn generation(&self) -> LiveGeneration {
        self.generation.clone()
    }

    /// Applies a credential change. Must be called from within a tokio runtime.
    ///
    /// The same credential never opens a second connection, including after it
    /// was rejected. A different credential replaces the current connection;
    /// `None` closes it.
    pub fn set_credential(&mut self, credential: Option<Credential>) {
        let Some(credential) = credential else {
            self.close();
            return;
        };

        if let Some(active) = &self.active {
            if active.credential == credential {
                debug!(state = ?self.state(), "Credential unchanged; keeping live connection");
                return;
            }
        }

        self.close();
        self.open(credential);
    }

    fn open(&mut self, credential: Credential) {
        let generation = self.generation.advance();
        info!(generation, "Starting live connection");

        let ctx = ConnectionContext {
            transport: self.transport.clone(),
            credential: credential.clone(),
            settings: self.settings,
            generation,
            current: self.generation.clone(),
            events: self.events.clone(),
            state: self.state.clone(),
        };
        let task = tokio::spawn(run_connection(ctx));

        self.active = Some(ActiveConnection { credential, task });
    }

    /// Tears down the current connection, if any.
    pub fn close(&mut self) {
        let active = self.active.take();
        let generation = &self.generation;
        // Retire the generation under the state lock so a task racing with
        // the close cannot write its state afterwards.
        self.state.send_modify(|state| {
            if active.is_some() {
                generation.advance();
            }
            *state = ConnectionState::Disconnected;
        });

        if let Some(active) = active {
            active.task.abort();
            info!("Live connection closed");
        }
    }

    /// Follows session changes until the session holder goes away.
    pub async fn run(mut self, mut sessions: watch::Receiver<Option<Session>>) {
        loop {
            let credential = sessions
                .borrow_and_update()
                .as_ref()
                .map(|s| s.credential.clone());
            self.set_credential(credential);

            if sessions.changed().await.is_err() {
                break;
            }
        }

        self.close();
    }
}

impl Drop for LiveEventClient {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            self.generation.advance();
            active.task.abort();
        }
    }
}
