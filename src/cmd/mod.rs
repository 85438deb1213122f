mod group;
mod proxy;
mod serve;
mod token;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::auth::Authorizer;
use crate::config::ConfigArgs;
use crate::logs::{LogLevel, LogTarget, LogsConfig};
use crate::server::config::ServerConfig;

/// Group-based token authorization for retrieval services.
#[derive(Parser)]
#[command(author, version, about)]
pub struct App {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub commands: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Serve(serve::ServeArgs),
    Proxy(proxy::ProxyArgs),

    /// Manage groups in the local store.
    #[command(subcommand)]
    Group(group::GroupCommand),

    /// Issue, list and revoke tokens in the local store.
    #[command(subcommand)]
    Token(token::TokenCommand),
}

impl App {
    pub async fn run(&self) -> Result<()> {
        match &self.commands {
            Commands::Serve(args) => args.run(&self.config).await,
            Commands::Proxy(args) => args.run(&self.config).await,
            Commands::Group(cmd) => cmd.run(&self.config),
            Commands::Token(cmd) => cmd.run(&self.config),
        }
    }
}

/// Opens the store named by `server.toml` the way the service does at start,
/// for the management commands. A running service sharing the store sees
/// groups created here on its next lookup, and deletions within
/// `auth.registry_refresh_secs`.
fn open_authorizer(config: &ConfigArgs) -> Result<Authorizer> {
    let cfg: ServerConfig = config.load("server")?;

    let mut logs = LogsConfig::default();
    logs.target = LogTarget::Stderr;
    logs.level = LogLevel::Warning;
    logs.init("cli")?;

    let db = Arc::new(cfg.db.build().context("init database")?);
    Authorizer::open(&cfg.auth, db)
}
