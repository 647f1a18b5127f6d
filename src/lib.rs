//! Client-side notification pipeline for the stay booking front-end: paginated
//! history, a live server-sent event feed, and local unread bookkeeping.

pub mod error;
pub mod live;
pub mod notification;
pub mod pagination;
pub mod state;
pub mod viewport;

pub use error::{AppError, Result};
pub use state::{AppState, Config, Session, SessionStore};
