pub mod client;
mod handler;
pub mod sse;
pub mod transport;
pub mod types;

pub use client::LiveEventClient;
pub use sse::{SseDecoder, SseFrame};
pub use transport::{ChunkStream, PushTransport, SseTransport};
pub use types::{
    ConnectionState, Credential, LiveEvent, LiveGeneration, LiveMessage, LiveSettings,
    NEW_NOTIFICATION_EVENT,
};
