use crate::gateway::Deadlines;
use crate::log_line::DEFAULT_SENTINEL;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(name = "logrelay", version, about, override_usage = "logrelay [OPTIONS] USER@REMOTE_HOST")]
pub struct Cli {
    /// Path to private key file
    #[clap(short, long)]
    pub identity: Option<PathBuf>,

    /// SSH destination port [default: 22]
    #[clap(short, long)]
    pub port: Option<u16>,

    /// Web/API listening port [default: 8080]
    #[clap(short, long)]
    pub listen: Option<u16>,

    /// Optional TOML file with timeouts and server settings
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Remote device login, USER@REMOTE_HOST
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub identity: Option<PathBuf>,
    pub port: u16,
    pub listen: u16,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub scan_timeout_secs: u64,
    pub public_dir: PathBuf,
    pub sentinel: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: None,
            port: 22,
            listen: 8080,
            connect_timeout_secs: 10,
            command_timeout_secs: 10,
            scan_timeout_secs: 30,
            public_dir: PathBuf::from("public"),
            sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }
}

impl Config {
    pub fn deadlines(&self) -> Deadlines {
        Deadlines {
            connect: Duration::from_secs(self.connect_timeout_secs),
            command: Duration::from_secs(self.command_timeout_secs),
            scan: Duration::from_secs(self.scan_timeout_secs),
        }
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config: Config = match cli.config {
        Some(ref path) => {
            let config_content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&config_content).context("Failed to parse config file")?
        }
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(ref identity) = cli.identity {
        config.identity = Some(identity.clone());
    }

    if let Some(port) = cli.port {
        config.port = port;
    }

    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    if config.identity.is_none() {
        anyhow::bail!("No private key given; pass --identity or set `identity` in the config file");
    }

    Ok(config)
}
