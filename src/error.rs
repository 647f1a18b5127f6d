use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authorization rejected with status {status}")]
    Auth { status: u16 },

    #[error("Unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Pagination error: {0}")]
    Pagination(#[source] Box<AppError>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No data received for {0:?}")]
    HeartbeatTimeout(Duration),

    #[error("Live stream closed by server")]
    StreamClosed,
}

impl AppError {
    pub fn pagination(err: AppError) -> Self {
        match err {
            AppError::Pagination(_) => err,
            other => AppError::Pagination(Box::new(other)),
        }
    }

    /// Short inline notice suitable for showing next to the feed.
    pub fn user_message(&self) -> String {
        let message = match self {
            AppError::Transport(e) => {
                tracing::debug!("Transport error: {:?}", e);
                "Unable to reach the server. Please check your connection."
            }
            AppError::Auth { .. } => "Your session has expired. Please sign in again.",
            AppError::Status { status, .. } if *status >= 500 => {
                "The server is having trouble right now. Please try again later."
            }
            AppError::Status { .. } => "The request could not be completed.",
            AppError::Parse(_) | AppError::InvalidPayload(_) => {
                "Received an unexpected response from the server."
            }
            AppError::Pagination(inner) => return inner.user_message(),
            AppError::Config(_) => "The application is misconfigured.",
            AppError::HeartbeatTimeout(_) | AppError::StreamClosed => {
                "Live updates are temporarily unavailable."
            }
        };

        message.to_string()
    }

    pub fn is_auth(&self) -> bool {
        match self {
            AppError::Auth { .. } => true,
            AppError::Pagination(inner) => inner.is_auth(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
