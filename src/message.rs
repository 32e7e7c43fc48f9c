use crate::error::{RelayError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// A relayed message as it travels through the device log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Lowercase hex SHA-1 over `date + owner + body`
    #[serde(default)]
    pub id: String,
    /// RFC 3339 UTC timestamp, second precision, `Z` suffix
    pub date: String,
    /// SSH login user that published the message
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub body: String,
}

impl Message {
    pub fn new(at: DateTime<Utc>, owner: &str, body: &str) -> Self {
        let date = format_date(at);
        let id = content_id(&date, owner, body);
        Self {
            id,
            date,
            owner: owner.to_string(),
            body: body.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Rebuild a message from its JSON form. The date must parse, since
    /// ordering depends on it.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let message: Message =
            serde_json::from_slice(bytes).map_err(|e| RelayError::Parse(e.to_string()))?;
        message.timestamp()?;
        Ok(message)
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.date)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| RelayError::Parse(format!("invalid date {:?}: {}", self.date, e)))
    }
}

pub fn content_id(date: &str, owner: &str, body: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(date.as_bytes());
    hasher.update(owner.as_bytes());
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
