//! Read path: replays the device log through an interactive shell.
//!
//! The shell is an unframed, human-oriented stream. The response ends when
//! the [`Framing`] recognizes the end-of-output line; reading past that
//! point would block once the device is back at its top-level prompt.

use crate::codec;
use crate::error::{RelayError, Result};
use crate::gateway::{bounded, Deadlines, Gateway, Interactive};
use crate::log_line::{Framing, LogLine};
use crate::message::Message;
use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use std::cmp::Reverse;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Commands typed into the shell, in order.
pub const SHELL_SCRIPT: [&str; 3] = [
    "terminal length 0",
    "sh log | inc %SYS-[0-7]-USERLOG_",
    "exit",
];

pub struct Collector {
    gateway: Arc<dyn Gateway>,
    framing: Arc<dyn Framing>,
    deadlines: Deadlines,
}

impl Collector {
    pub fn new(gateway: Arc<dyn Gateway>, framing: Arc<dyn Framing>, deadlines: Deadlines) -> Self {
        Self {
            gateway,
            framing,
            deadlines,
        }
    }

    /// Every decodable message in the device log, newest first.
    pub async fn fetch_all(&self, cancel: &CancellationToken) -> Result<Vec<Message>> {
        let mut conn = bounded(
            "connect",
            self.deadlines.connect,
            cancel,
            self.gateway.dial(),
        )
        .await?;

        let scanned = bounded("log scan", self.deadlines.scan, cancel, async {
            let shell = conn.open_interactive().await?;
            run_script(shell, self.framing.as_ref()).await
        })
        .await;

        if let Err(e) = conn.close().await {
            warn!("Failed to close connection after fetch: {}", e);
        }

        let messages = decode_candidates(&scanned?);
        if messages.is_empty() {
            return Err(RelayError::NotFound);
        }

        info!("Fetched {} messages", messages.len());
        Ok(messages)
    }
}

async fn run_script(shell: Interactive, framing: &dyn Framing) -> Result<Vec<String>> {
    let Interactive { mut input, output } = shell;

    for command in SHELL_SCRIPT {
        debug!("Sending shell command: {}", command);
        input.write_all(format!("{}\n", command).as_bytes()).await?;
    }
    input.flush().await?;

    Ok(scan_output(BufReader::new(output), framing).await?)
}

/// Collect carrier payloads until the end-of-output line or EOF.
///
/// Lines are split on raw bytes; invalid UTF-8 is replaced rather than
/// rejected, so a garbled line ends up as noise.
pub async fn scan_output<R>(reader: R, framing: &dyn Framing) -> std::io::Result<Vec<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.split(b'\n');
    let mut payloads = Vec::new();

    while let Some(raw) = lines.next_segment().await? {
        let text = String::from_utf8_lossy(&raw);
        let line = text.trim_end_matches('\r');
        trace!("Shell output: {}", line);

        match LogLine::classify(line, framing) {
            LogLine::Carrier { payload } => payloads.push(payload.to_string()),
            LogLine::EndOfOutput => {
                debug!("End of output reached");
                return Ok(payloads);
            }
            LogLine::Noise => {}
        }
    }

    debug!("Shell output closed before end-of-output line");
    Ok(payloads)
}

/// Decode payloads into messages, dropping the ones that don't survive,
/// and order newest first. Equal dates keep their log order.
pub fn decode_candidates(payloads: &[String]) -> Vec<Message> {
    let mut dated: Vec<(DateTime<Utc>, Message)> = payloads
        .iter()
        .filter_map(|payload| match decode_payload(payload) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Dropping log entry {:?}: {}", payload, e);
                None
            }
        })
        .collect();

    dated.sort_by_key(|(at, _)| Reverse(*at));
    dated.into_iter().map(|(_, message)| message).collect()
}

fn decode_payload(payload: &str) -> Result<(DateTime<Utc>, Message)> {
    let json = codec::decode(payload)?;
    let message = Message::from_json(&json)?;
    Ok((message.timestamp()?, message))
}
