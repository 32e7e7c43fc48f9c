//! Message relay over a network device's syslog.
//!
//! Messages are published with `send log <base64-json>` over SSH and read
//! back by filtering `show log` output in an interactive shell.

pub mod codec;
pub mod collector;
pub mod config;
pub mod error;
pub mod gateway;
pub mod log_line;
pub mod message;
pub mod publisher;
pub mod relay;
pub mod server;

pub use error::{RelayError, Result};
pub use gateway::{Connection, Deadlines, Gateway, Interactive, SshGateway, Target};
pub use message::Message;
pub use relay::Relay;
