use serde::{Deserialize, Serialize};

use super::notification_models::{Cursor, NotiId, UserId};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOneRequest {
    pub noti_id: NotiId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadAllRequest {
    pub user_id: UserId,
}

/// Query string of the history endpoint; the cursor fields are sent only for older pages.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPageQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_noti_id: Option<NotiId>,
    pub limit: usize,
}

impl NotificationPageQuery {
    pub fn new(cursor: Option<&Cursor>, limit: usize) -> Self {
        Self {
            last_created_at: cursor.map(|c| c.last_created_at.to_rfc3339()),
            last_noti_id: cursor.map(|c| c.last_id),
            limit,
        }
    }
}

/// The unread-count endpoint answers with a bare number or a wrapped object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UnreadCountResponse {
    Plain(u64),
    Wrapped {
        #[serde(rename = "unreadCount", alias = "count")]
        unread_count: u64,
    },
}

impl UnreadCountResponse {
    pub fn count(&self) -> u64 {
        match self {
            UnreadCountResponse::Plain(count) => *count,
            UnreadCountResponse::Wrapped { unread_count } => *unread_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_first_page_query_has_no_cursor() {
        let query = NotificationPageQuery::new(None, 10);
        let value = serde_json::to_value(&query).unwrap();

        assert_eq!(value, serde_json::json!({ "limit": 10 }));
    }

    #[test]
    fn test_next_page_query_carries_cursor() {
        let cursor = Cursor {
            last_id: 88,
            last_created_at: Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap(),
        };
        let value = serde_json::to_value(NotificationPageQuery::new(Some(&cursor), 20)).unwrap();

        assert_eq!(value["lastNotiId"], 88);
        assert_eq!(value["lastCreatedAt"], "2026-10-01T12:00:00+00:00");
        assert_eq!(value["limit"], 20);
    }

    #[test]
    fn test_unread_count_shapes() {
        let plain: UnreadCountResponse = serde_json::from_str("4").unwrap();
        let wrapped: UnreadCountResponse = serde_json::from_str(r#"{"unreadCount":6}"#).unwrap();

        assert_eq!(plain.count(), 4);
        assert_eq!(wrapped.count(), 6);
    }
}
