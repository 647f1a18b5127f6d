use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::pagination::{Batch, Paginated};
use crate::state::SessionStore;

use super::notification_dto::{
    NotificationPageQuery, ReadAllRequest, ReadOneRequest, UnreadCountResponse,
};
use super::notification_models::{Cursor, NotiId, NotificationRecord, RecordPosition, UserId};

/// Remote notification history and the read/delete commands on it.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Newest-first page; with a cursor, only records strictly older than it.
    /// Entries that fail to decode are left out of `items` but still counted.
    async fn find_page(
        &self,
        user_id: UserId,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<Batch<NotificationRecord, Cursor>>;

    async fn count_unread(&self, user_id: UserId) -> Result<u64>;

    async fn mark_as_read(&self, noti_id: NotiId) -> Result<()>;

    async fn mark_all_as_read(&self, user_id: UserId) -> Result<()>;

    async fn delete(&self, noti_id: NotiId) -> Result<()>;

    async fn delete_all(&self, user_id: UserId) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpNotificationRepository {
    http: Client,
    base_url: String,
    session: SessionStore,
}

impl HttpNotificationRepository {
    pub fn new(http: Client, base_url: impl Into<String>, session: SessionStore) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.credential() {
            Some(credential) => request.bearer_auth(credential.token()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        check_status(response).await
    }
}

/// Maps 401/403 to `AppError::Auth` and any other non-2xx status to `AppError::Status`.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AppError::Auth {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AppError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

/// Decodes a history page entry by entry, skipping the ones that are not valid
/// notifications. The batch still ends at the last entry the server sent.
pub(crate) fn decode_page(entries: Vec<Value>) -> Batch<NotificationRecord, Cursor> {
    let scanned = entries.len();
    let mut last = None;
    let mut items = Vec::with_capacity(scanned);

    for entry in &entries {
        let position = RecordPosition::deserialize(entry).ok();
        let noti_id = position.as_ref().map(|p| p.noti_id);

        match NotificationRecord::deserialize(entry) {
            Ok(record) => {
                last = Some(record.cursor());
                items.push(record);
            }
            Err(e) => {
                warn!(?noti_id, "Skipping undecodable notification: {}", e);
                if let Some(position) = position {
                    last = Some(position.into());
                }
            }
        }
    }

    Batch {
        items,
        scanned,
        last,
    }
}

#[async_trait]
impl NotificationRepository for HttpNotificationRepository {
    async fn find_page(
        &self,
        user_id: UserId,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<Batch<NotificationRecord, Cursor>> {
        let query = NotificationPageQuery::new(cursor, limit);
        let request = self
            .http
            .get(self.url(&format!("/notifications/{}", user_id)))
            .query(&query);

        let body = self.send(request).await?.text().await?;
        let entries: Vec<Value> = serde_json::from_str(&body)?;

        Ok(decode_page(entries))
    }

    async fn count_unread(&self, user_id: UserId) -> Result<u64> {
        let request = self
            .http
            .get(self.url(&format!("/notifications/{}/unread-count", user_id)));

        let body = self.send(request).await?.text().await?;
        let count: UnreadCountResponse = serde_json::from_str(&body)?;

        Ok(count.count())
    }

    async fn mark_as_read(&self, noti_id: NotiId) -> Result<()> {
        let request = self
            .http
            .patch(self.url("/notifications/read-one"))
            .json(&ReadOneRequest { noti_id });

        self.send(request).await?;
        Ok(())
    }

    async fn mark_all_as_read(&self, user_id: UserId) -> Result<()> {
        let request = self
            .http
            .patch(self.url("/notifications/read-all"))
            .json(&ReadAllRequest { user_id });

        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, noti_id: NotiId) -> Result<()> {
        let request = self
            .http
            .delete(self.url(&format!("/notifications/{}/delete", noti_id)));

        self.send(request).await?;
        Ok(())
    }

    async fn delete_all(&self, user_id: UserId) -> Result<()> {
        let request = self
            .http
            .delete(self.url(&format!("/notifications/{}/delete-all", user_id)));

        self.send(request).await?;
        Ok(())
    }
}
