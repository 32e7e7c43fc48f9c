use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Remote command failed: {0}")]
    Command(String),

    #[error("Payload decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Message parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No messages found")]
    NotFound,

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl RelayError {
    /// True for failures on the connection path: the remote device was
    /// unreachable, refused us, or misbehaved.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RelayError::Auth(_)
                | RelayError::Network(_)
                | RelayError::Session(_)
                | RelayError::Command(_)
                | RelayError::Timeout { .. }
                | RelayError::Cancelled
        )
    }
}

impl From<russh::Error> for RelayError {
    fn from(e: russh::Error) -> Self {
        RelayError::Session(e.to_string())
    }
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Session(e.to_string())
    }
}
