use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ServerConfig;

#[derive(Parser, Debug)]
#[command(
    name = "apiserver",
    version,
    about = "It's a server containing workers of appscode",
    long_about = "All the worker profiles of AppsCode Ltd. are served by this server"
)]
pub struct Cli {
    /// TOML config file. Built-in defaults are used when omitted.
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the API server
    Start(StartArgs),
    /// Print the version of apiserver
    Version,
}

#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Port to listen on
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Skip basic auth for every request. Never use outside development.
    #[arg(long)]
    pub bypass_auth: bool,

    /// Seconds to wait after the interrupt before draining
    #[arg(long, value_name = "SECS")]
    pub stop_delay: Option<u64>,

    /// Seconds in-flight requests get to finish during shutdown
    #[arg(long, value_name = "SECS")]
    pub graceful_timeout: Option<u64>,

    /// Database URL, overriding the [database] section
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,
}

impl StartArgs {
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.http_port = port;
        }
        if self.bypass_auth {
            config.auth.bypass = true;
        }
        if let Some(secs) = self.stop_delay {
            config.stop_delay_secs = secs;
        }
        if let Some(secs) = self.graceful_timeout {
            config.graceful_timeout_secs = secs;
        }
        if let Some(url) = &self.database_url {
            config.database.url = Some(url.clone());
        }
    }
}

pub fn version_line() -> String {
    format!("apiserver - v{}", env!("CARGO_PKG_VERSION"))
}
