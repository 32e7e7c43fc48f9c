use crate::codec;
use crate::error::{RelayError, Result};
use crate::gateway::{bounded, Deadlines, Gateway};
use crate::message::Message;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builds the one-shot command that injects `payload` into the device log.
pub fn send_log_command(payload: &str) -> String {
    format!("send log {}", payload)
}

/// Write path: turns a body into a tagged syslog entry on the device.
pub struct Publisher {
    gateway: Arc<dyn Gateway>,
    deadlines: Deadlines,
    clock: fn() -> DateTime<Utc>,
}

impl Publisher {
    pub fn new(gateway: Arc<dyn Gateway>, deadlines: Deadlines) -> Self {
        Self {
            gateway,
            deadlines,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn send(&self, body: &str, cancel: &CancellationToken) -> Result<Message> {
        if body.is_empty() {
            return Err(RelayError::Validation("message body is empty".into()));
        }

        let message = Message::new((self.clock)(), self.gateway.owner(), body);
        let command = send_log_command(&codec::encode(&message.to_json()?));

        let mut conn = bounded(
            "connect",
            self.deadlines.connect,
            cancel,
            self.gateway.dial(),
        )
        .await?;

        let sent = bounded(
            "send log",
            self.deadlines.command,
            cancel,
            conn.exec(&command),
        )
        .await;

        if let Err(e) = conn.close().await {
            warn!("Failed to close connection after publish: {}", e);
        }
        sent?;

        info!("Published message {} from {}", message.id, message.owner);
        Ok(message)
    }
}
