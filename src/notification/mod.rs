pub mod notification_dto;
pub mod notification_models;
pub mod notification_repository;
pub mod notification_service;
pub mod notification_store;

pub use notification_models::{
    Cursor, NotiId, NotiType, NotificationDetails, NotificationRecord, ReadFlag, UserId,
};
pub use notification_repository::{HttpNotificationRepository, NotificationRepository};
pub use notification_service::{NotificationPages, NotificationService};
pub use notification_store::{FeedAction, FeedState, NotificationStore};
