//! Transport encoding for payloads carried inside a single shell token.
//!
//! Standard base64 with padding. The alphabet has no whitespace, so an
//! encoded payload survives `send log <payload>` and the log filter intact.

use base64::engine::general_purpose::STANDARD;
use base64::{DecodeError, Engine};

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(text)
}
