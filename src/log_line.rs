use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_SENTINEL: &str = "Press RETURN to get started.";

static CARRIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"%SYS-[0-7]-USERLOG_(DEBUG|INFO|NOTICE|WARNING|ERR|CRIT|ALERT|EMERG): Message from (?-u:\w)+\(user id: .+\): .*$",
    )
    .expect("carrier pattern is a valid regex")
});

/// Decides where the device's response ends on an unframed shell stream.
pub trait Framing: Send + Sync {
    fn is_end_of_output(&self, line: &str) -> bool;
}

/// Ends the response when the device prints its top-level prompt banner.
#[derive(Debug, Clone)]
pub struct SentinelFraming {
    sentinel: String,
}

impl SentinelFraming {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }
}

impl Default for SentinelFraming {
    fn default() -> Self {
        Self::new(DEFAULT_SENTINEL)
    }
}

impl Framing for SentinelFraming {
    fn is_end_of_output(&self, line: &str) -> bool {
        line == self.sentinel
    }
}

/// One line of interactive shell output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLine<'a> {
    /// Tagged user-log entry; `payload` is the encoded message
    Carrier { payload: &'a str },
    EndOfOutput,
    Noise,
}

impl<'a> LogLine<'a> {
    pub fn classify(line: &'a str, framing: &dyn Framing) -> Self {
        if is_carrier(line) {
            LogLine::Carrier {
                payload: payload_of(line),
            }
        } else if framing.is_end_of_output(line) {
            LogLine::EndOfOutput
        } else {
            LogLine::Noise
        }
    }
}

pub fn is_carrier(line: &str) -> bool {
    CARRIER_PATTERN.is_match(line)
}

/// Everything after the last `": "` in the line.
pub fn payload_of(line: &str) -> &str {
    line.rsplit(": ").next().unwrap_or(line)
}
