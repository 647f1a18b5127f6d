use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::pagination::Paginated;

pub type NotiId = i64;
pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotiType {
    BookingConfirmed,
    BookingCancelled,
    CheckInReminder,
    JournalComment,
    CommentReply,
    ReviewReply,
    CouponIssued,
}

impl NotiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotiType::BookingConfirmed => "BOOKING_CONFIRMED",
            NotiType::BookingCancelled => "BOOKING_CANCELLED",
            NotiType::CheckInReminder => "CHECK_IN_REMINDER",
            NotiType::JournalComment => "JOURNAL_COMMENT",
            NotiType::CommentReply => "COMMENT_REPLY",
            NotiType::ReviewReply => "REVIEW_REPLY",
            NotiType::CouponIssued => "COUPON_ISSUED",
        }
    }
}

impl std::fmt::Display for NotiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotiType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOOKING_CONFIRMED" => Ok(NotiType::BookingConfirmed),
            "BOOKING_CANCELLED" => Ok(NotiType::BookingCancelled),
            "CHECK_IN_REMINDER" => Ok(NotiType::CheckInReminder),
            "JOURNAL_COMMENT" => Ok(NotiType::JournalComment),
            "COMMENT_REPLY" => Ok(NotiType::CommentReply),
            "REVIEW_REPLY" => Ok(NotiType::ReviewReply),
            "COUPON_ISSUED" => Ok(NotiType::CouponIssued),
            other => Err(AppError::InvalidPayload(format!(
                "unknown notiType {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadFlag {
    #[serde(rename = "Y")]
    Read,
    #[serde(rename = "N")]
    Unread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmedDetails {
    pub accommodation_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCancelledDetails {
    pub accommodation_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInReminderDetails {
    pub accommodation_name: String,
    pub check_in: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalCommentDetails {
    pub journal_title: String,
    pub commenter_nickname: String,
    pub comment_preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentReplyDetails {
    pub commenter_nickname: String,
    pub comment_preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReplyDetails {
    pub accommodation_name: String,
    pub reply_preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponIssuedDetails {
    pub coupon_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Payload of a notification; the variant always agrees with the record's `notiType`.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationDetails {
    BookingConfirmed(BookingConfirmedDetails),
    BookingCancelled(BookingCancelledDetails),
    CheckInReminder(CheckInReminderDetails),
    JournalComment(JournalCommentDetails),
    CommentReply(CommentReplyDetails),
    ReviewReply(ReviewReplyDetails),
    CouponIssued(CouponIssuedDetails),
}

impl NotificationDetails {
    pub fn noti_type(&self) -> NotiType {
        match self {
            NotificationDetails::BookingConfirmed(_) => NotiType::BookingConfirmed,
            NotificationDetails::BookingCancelled(_) => NotiType::BookingCancelled,
            NotificationDetails::CheckInReminder(_) => NotiType::CheckInReminder,
            NotificationDetails::JournalComment(_) => NotiType::JournalComment,
            NotificationDetails::CommentReply(_) => NotiType::CommentReply,
            NotificationDetails::ReviewReply(_) => NotiType::ReviewReply,
            NotificationDetails::CouponIssued(_) => NotiType::CouponIssued,
        }
    }

    fn from_value(noti_type: NotiType, details: Value) -> Result<Self, AppError> {
        let details = match noti_type {
            NotiType::BookingConfirmed => {
                NotificationDetails::BookingConfirmed(serde_json::from_value(details)?)
            }
            NotiType::BookingCancelled => {
                NotificationDetails::BookingCancelled(serde_json::from_value(details)?)
            }
            NotiType::CheckInReminder => {
                NotificationDetails::CheckInReminder(serde_json::from_value(details)?)
            }
            NotiType::JournalComment => {
                NotificationDetails::JournalComment(serde_json::from_value(details)?)
            }
            NotiType::CommentReply => {
                NotificationDetails::CommentReply(serde_json::from_value(details)?)
            }
            NotiType::ReviewReply => {
                NotificationDetails::ReviewReply(serde_json::from_value(details)?)
            }
            NotiType::CouponIssued => {
                NotificationDetails::CouponIssued(serde_json::from_value(details)?)
            }
        };

        Ok(details)
    }

    fn to_value(&self) -> Value {
        let value = match self {
            NotificationDetails::BookingConfirmed(d) => serde_json::to_value(d),
            NotificationDetails::BookingCancelled(d) => serde_json::to_value(d),
            NotificationDetails::CheckInReminder(d) => serde_json::to_value(d),
            NotificationDetails::JournalComment(d) => serde_json::to_value(d),
            NotificationDetails::CommentReply(d) => serde_json::to_value(d),
            NotificationDetails::ReviewReply(d) => serde_json::to_value(d),
            NotificationDetails::CouponIssued(d) => serde_json::to_value(d),
        };

        // Plain structs of strings, dates and numbers always serialize.
        value.unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNotification", into = "RawNotification")]
pub struct NotificationRecord {
    pub noti_id: NotiId,
    pub user_id: UserId,
    pub target_id: i64,
    pub details: NotificationDetails,
    pub is_read: ReadFlag,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn noti_type(&self) -> NotiType {
        self.details.noti_type()
    }

    pub fn is_unread(&self) -> bool {
        self.is_read == ReadFlag::Unread
    }
}

/// Cursor for the next page: the last record a page ended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub last_id: NotiId,
    pub last_created_at: DateTime<Utc>,
}

impl Paginated for NotificationRecord {
    type Cursor = Cursor;

    fn cursor(&self) -> Cursor {
        Cursor {
            last_id: self.noti_id,
            last_created_at: self.created_at,
        }
    }
}

/// Just enough of a wire record to place it in the history.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordPosition {
    pub noti_id: NotiId,
    pub created_at: DateTime<Utc>,
}

impl From<RecordPosition> for Cursor {
    fn from(position: RecordPosition) -> Self {
        Cursor {
            last_id: position.noti_id,
            last_created_at: position.created_at,
        }
    }
}

/// Wire shape of a notification before `details` is checked against `notiType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNotification {
    noti_id: NotiId,
    user_id: UserId,
    noti_type: String,
    target_id: i64,
    #[serde(default)]
    details: Value,
    is_read: ReadFlag,
    created_at: DateTime<Utc>,
}

impl TryFrom<RawNotification> for NotificationRecord {
    type Error = AppError;

    fn try_from(raw: RawNotification) -> Result<Self, Self::Error> {
        let noti_type: NotiType = raw.noti_type.parse()?;
        let details = NotificationDetails::from_value(noti_type, raw.details)?;

        Ok(Self {
            noti_id: raw.noti_id,
            user_id: raw.user_id,
            target_id: raw.target_id,
            details,
            is_read: raw.is_read,
            created_at: raw.created_at,
        })
    }
}

impl From<NotificationRecord> for RawNotification {
    fn from(record: NotificationRecord) -> Self {
        Self {
            noti_id: record.noti_id,
            user_id: record.user_id,
            noti_type: record.noti_type().as_str().to_string(),
            target_id: record.target_id,
            details: record.details.to_value(),
            is_read: record.is_read,
            created_at: record.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn booking_json() -> Value {
        json!({
            "notiId": 101,
            "userId": 7,
            "notiType": "BOOKING_CONFIRMED",
            "targetId": 5501,
            "details": {
                "accommodationName": "Seaside Hanok",
                "checkIn": "2026-11-02",
                "checkOut": "2026-11-04"
            },
            "isRead": "N",
            "createdAt": "2026-10-18T09:30:00Z"
        })
    }

    #[test]
    fn test_parse_booking_confirmed() {
        let record: NotificationRecord = serde_json::from_value(booking_json()).unwrap();

        assert_eq!(record.noti_id, 101);
        assert_eq!(record.noti_type(), NotiType::BookingConfirmed);
        assert!(record.is_unread());
        match record.details {
            NotificationDetails::BookingConfirmed(ref d) => {
                assert_eq!(d.accommodation_name, "Seaside Hanok");
                assert_eq!(d.check_out, NaiveDate::from_ymd_opt(2026, 11, 4).unwrap());
            }
            ref other => panic!("unexpected details: {:?}", other),
        }
    }

    #[test]
    fn test_parse_coupon_with_optional_fields_missing() {
        let record: NotificationRecord = serde_json::from_value(json!({
            "notiId": 3,
            "userId": 7,
            "notiType": "COUPON_ISSUED",
            "targetId": 90,
            "details": { "couponName": "Winter 10%" },
            "isRead": "Y",
            "createdAt": "2026-10-01T00:00:00Z"
        }))
        .unwrap();

        assert!(!record.is_unread());
        assert_eq!(
            record.details,
            NotificationDetails::CouponIssued(CouponIssuedDetails {
                coupon_name: "Winter 10%".to_string(),
                discount_rate: None,
                expires_at: None,
            })
        );
    }

    #[test]
    fn test_unknown_noti_type_is_rejected() {
        let mut value = booking_json();
        value["notiType"] = json!("LOYALTY_POINTS");

        let err = serde_json::from_value::<NotificationRecord>(value).unwrap_err();
        assert!(err.to_string().contains("LOYALTY_POINTS"));
    }

    #[test]
    fn test_details_must_match_tag() {
        let mut value = booking_json();
        value["notiType"] = json!("JOURNAL_COMMENT");

        assert!(serde_json::from_value::<NotificationRecord>(value).is_err());
    }

    #[test]
    fn test_invalid_read_flag_is_rejected() {
        let mut value = booking_json();
        value["isRead"] = json!("maybe");

        assert!(serde_json::from_value::<NotificationRecord>(value).is_err());
    }

    #[test]
    fn test_serializes_wire_shape() {
        let record: NotificationRecord = serde_json::from_value(booking_json()).unwrap();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["notiType"], "BOOKING_CONFIRMED");
        assert_eq!(value["isRead"], "N");
        assert_eq!(value["details"]["checkIn"], "2026-11-02");
    }

    #[test]
    fn test_noti_type_display() {
        assert_eq!(NotiType::CheckInReminder.to_string(), "CHECK_IN_REMINDER");
        assert_eq!(NotiType::ReviewReply.to_string(), "REVIEW_REPLY");
    }

    #[test]
    fn test_cursor_comes_from_record() {
        let record: NotificationRecord = serde_json::from_value(booking_json()).unwrap();
        let cursor = record.cursor();

        assert_eq!(cursor.last_id, 101);
        assert_eq!(cursor.last_created_at, record.created_at);
    }
}
