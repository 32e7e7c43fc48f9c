//! Authenticated SSH sessions to the remote device.
//!
//! Every publish and every fetch dials its own connection and tears it down
//! when done. Nothing is pooled or shared between operations.

use crate::error::{RelayError, Result};
use async_trait::async_trait;
use log::{debug, info, trace};
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// Remote login destination, written `USER@HOST` on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl Target {
    /// Split on the last `@`, so the user part may itself contain `@`.
    pub fn parse(destination: &str, port: u16) -> Result<Self> {
        let (user, host) = destination.rsplit_once('@').ok_or_else(|| {
            RelayError::Validation(format!(
                "destination {:?} must be USER@REMOTE_HOST",
                destination
            ))
        })?;

        if user.is_empty() || host.is_empty() {
            return Err(RelayError::Validation(format!(
                "destination {:?} must be USER@REMOTE_HOST",
                destination
            )));
        }

        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Both directions of an interactive shell.
pub struct Interactive {
    pub input: Box<dyn AsyncWrite + Send + Unpin>,
    pub output: Box<dyn AsyncRead + Send + Unpin>,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Open a fresh, authenticated connection.
    async fn dial(&self) -> Result<Box<dyn Connection>>;

    /// Identity the connections authenticate as.
    fn owner(&self) -> &str;
}

#[async_trait]
pub trait Connection: Send {
    /// Run a one-shot command and collect its output.
    async fn exec(&mut self, command: &str) -> Result<Vec<u8>>;

    async fn open_interactive(&mut self) -> Result<Interactive>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Time limits for the blocking points of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub connect: Duration,
    pub command: Duration,
    pub scan: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            command: Duration::from_secs(10),
            scan: Duration::from_secs(30),
        }
    }
}

/// Run `fut` until it finishes, `limit` elapses, or `cancel` fires.
pub async fn bounded<T, F>(
    operation: &'static str,
    limit: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RelayError::Cancelled),
        result = tokio::time::timeout(limit, fut) => match result {
            Ok(inner) => inner,
            Err(_) => Err(RelayError::Timeout { operation, after: limit }),
        },
    }
}

struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        // No known_hosts store; any host key is accepted.
        debug!("Server host key fingerprint: {}", server_public_key.fingerprint());
        Ok(true)
    }
}

/// Public-key SSH gateway. The key file is re-read on every dial.
pub struct SshGateway {
    target: Target,
    identity: PathBuf,
    config: Arc<client::Config>,
}

impl SshGateway {
    pub fn new(target: Target, identity: impl Into<PathBuf>) -> Self {
        Self {
            target,
            identity: identity.into(),
            config: Arc::new(client::Config::default()),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    async fn load_key(&self) -> Result<key::KeyPair> {
        let pem = tokio::fs::read_to_string(&self.identity).await.map_err(|e| {
            RelayError::Auth(format!("failed to read key {:?}: {}", self.identity, e))
        })?;

        russh_keys::decode_secret_key(&pem, None).map_err(|e| {
            RelayError::Auth(format!("failed to parse key {:?}: {}", self.identity, e))
        })
    }
}

/// A server that answers the publickey request and says no is an `Auth`
/// failure; a transport error during the exchange is a `Network` failure.
fn check_auth(outcome: std::result::Result<bool, russh::Error>, target: &Target) -> Result<()> {
    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => Err(RelayError::Auth(format!("public key rejected for {}", target))),
        Err(e) => Err(RelayError::Network(format!(
            "authentication exchange with {} failed: {}",
            target, e
        ))),
    }
}

#[async_trait]
impl Gateway for SshGateway {
    /// Key read or parse failure and key rejection map to `Auth`; failure
    /// to connect or to complete the exchange maps to `Network`.
    async fn dial(&self) -> Result<Box<dyn Connection>> {
        let key = self.load_key().await?;

        debug!("Dialing {}", self.target);
        let mut handle = client::connect(
            Arc::clone(&self.config),
            (self.target.host.as_str(), self.target.port),
            ClientHandler,
        )
        .await
        .map_err(|e| RelayError::Network(format!("failed to dial {}: {}", self.target, e)))?;

        let outcome = handle
            .authenticate_publickey(self.target.user.as_str(), Arc::new(key))
            .await;
        check_auth(outcome, &self.target)?;

        info!("Connected to {}", self.target);
        Ok(Box::new(SshConnection { handle }))
    }

    fn owner(&self) -> &str {
        &self.target.user
    }
}

struct SshConnection {
    handle: Handle<ClientHandler>,
}

impl SshConnection {
    async fn open_channel(&self) -> Result<Channel<Msg>> {
        self.handle
            .channel_open_session()
            .await
            .map_err(|e| RelayError::Session(format!("failed to open session: {}", e)))
    }
}

#[async_trait]
impl Connection for SshConnection {
    async fn exec(&mut self, command: &str) -> Result<Vec<u8>> {
        let mut channel = self.open_channel().await?;
        debug!("Executing remote command: {}", command);
        channel
            .exec(true, command)
            .await
            .map_err(|e| RelayError::Command(format!("failed to start command: {}", e)))?;

        let mut output = Vec::new();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, .. } => output.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } if exit_status != 0 => {
                    return Err(RelayError::Command(format!(
                        "command exited with status {}",
                        exit_status
                    )));
                }
                ChannelMsg::Failure => {
                    return Err(RelayError::Command("remote side refused the command".into()));
                }
                ChannelMsg::Close => break,
                other => trace!("Ignoring channel message: {:?}", other),
            }
        }

        Ok(output)
    }

    async fn open_interactive(&mut self) -> Result<Interactive> {
        let channel = self.open_channel().await?;
        channel
            .request_shell(true)
            .await
            .map_err(|e| RelayError::Session(format!("failed to start shell: {}", e)))?;

        let (output, input) = tokio::io::split(channel.into_stream());
        Ok(Interactive {
            input: Box::new(input),
            output: Box::new(output),
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}
