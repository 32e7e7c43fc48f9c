//! In-memory stand-in for the SSH gateway.

#![allow(dead_code)]

use async_trait::async_trait;
use logrelay::codec;
use logrelay::{Connection, Gateway, Interactive, Message, RelayError, Result};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, DuplexStream};

#[derive(Clone)]
pub enum ShellOutput {
    /// Fixed transcript, EOF after the last byte
    Transcript(String),
    /// Never produces a line and never closes
    Silent,
}

#[derive(Default)]
pub struct Recorded {
    pub dials: usize,
    pub execs: Vec<String>,
    pub shell_input: Vec<u8>,
    pub closes: usize,
}

pub struct FakeGateway {
    owner: String,
    output: ShellOutput,
    fail_dial: Option<fn() -> RelayError>,
    exec_status: Option<fn() -> RelayError>,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl FakeGateway {
    pub fn new(owner: &str, output: ShellOutput) -> Self {
        Self {
            owner: owner.to_string(),
            output,
            fail_dial: None,
            exec_status: None,
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    pub fn failing_dial(mut self, error: fn() -> RelayError) -> Self {
        self.fail_dial = Some(error);
        self
    }

    pub fn failing_exec(mut self, error: fn() -> RelayError) -> Self {
        self.exec_status = Some(error);
        self
    }

    pub fn dials(&self) -> usize {
        self.recorded.lock().unwrap().dials
    }

    pub fn execs(&self) -> Vec<String> {
        self.recorded.lock().unwrap().execs.clone()
    }

    pub fn closes(&self) -> usize {
        self.recorded.lock().unwrap().closes
    }

    pub fn shell_input(&self) -> String {
        String::from_utf8(self.recorded.lock().unwrap().shell_input.clone()).unwrap()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn dial(&self) -> Result<Box<dyn Connection>> {
        self.recorded.lock().unwrap().dials += 1;
        if let Some(error) = self.fail_dial {
            return Err(error());
        }
        Ok(Box::new(FakeConnection {
            output: self.output.clone(),
            exec_status: self.exec_status,
            recorded: Arc::clone(&self.recorded),
            held_open: None,
        }))
    }

    fn owner(&self) -> &str {
        &self.owner
    }
}

struct FakeConnection {
    output: ShellOutput,
    exec_status: Option<fn() -> RelayError>,
    recorded: Arc<Mutex<Recorded>>,
    held_open: Option<DuplexStream>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn exec(&mut self, command: &str) -> Result<Vec<u8>> {
        self.recorded.lock().unwrap().execs.push(command.to_string());
        match self.exec_status {
            Some(error) => Err(error()),
            None => Ok(Vec::new()),
        }
    }

    async fn open_interactive(&mut self) -> Result<Interactive> {
        let input = Box::new(CaptureWriter(Arc::clone(&self.recorded)));
        let output: Box<dyn tokio::io::AsyncRead + Send + Unpin> = match self.output {
            ShellOutput::Transcript(ref text) => Box::new(io::Cursor::new(text.clone().into_bytes())),
            ShellOutput::Silent => {
                let (ours, theirs) = tokio::io::duplex(64);
                self.held_open = Some(theirs);
                Box::new(ours)
            }
        };
        Ok(Interactive { input, output })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.recorded.lock().unwrap().closes += 1;
        Ok(())
    }
}

struct CaptureWriter(Arc<Mutex<Recorded>>);

impl AsyncWrite for CaptureWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().shell_input.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A syslog line carrying `message`, as the device prints it.
pub fn carrier_line(message: &Message) -> String {
    format!(
        "*Mar  1 00:00:01.000: %SYS-5-USERLOG_NOTICE: Message from 0(user id: {}): {}",
        message.owner,
        codec::encode(&message.to_json().unwrap())
    )
}

pub fn transcript(lines: &[String]) -> ShellOutput {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push_str("\r\n");
    }
    ShellOutput::Transcript(text)
}
