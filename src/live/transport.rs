use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::notification::notification_repository::check_status;

use super::types::Credential;

/// Raw body chunks of an open event stream.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>>>;

/// Opens the server-push channel for a credential.
///
/// A 401/403 answer must come back as `AppError::Auth`; the client treats it as
/// final for that credential. Any other error is retried.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self, credential: &Credential) -> Result<ChunkStream>;
}

/// Server-sent events over a long-lived HTTP GET.
#[derive(Clone)]
pub struct SseTransport {
    http: Client,
    url: String,
}

impl SseTransport {
    /// `http` must not carry a total request timeout, or it would cut the stream.
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushTransport for SseTransport {
    async fn connect(&self, credential: &Credential) -> Result<ChunkStream> {
        let response = self
            .http
            .get(&self.url)
            .bearer_auth(credential.token())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let response = check_status(response).await?;

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(AppError::from));

        Ok(chunks.boxed())
    }
}
