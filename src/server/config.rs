use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod};
use serde::{Deserialize, Serialize};

use crate::auth::config::AuthConfig;
use crate::config::{expandenv, CommonConfig, PathSet};
use crate::db::config::DbConfig;
use crate::logs::LogsConfig;

/// `server.toml`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,

    #[serde(default)]
    pub ssl: bool,

    /// Default: `{config_dir}/pki/server.crt`.
    #[serde(default)]
    pub cert_path: String,

    /// Default: `{config_dir}/pki/server.key`.
    #[serde(default)]
    pub key_path: String,

    /// 0 keeps the actix default.
    #[serde(default)]
    pub keep_alive_secs: u64,

    /// 0 uses one worker per cpu.
    #[serde(default)]
    pub workers: u64,

    #[serde(default = "ServerConfig::default_payload_limit_mib")]
    pub payload_limit_mib: usize,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub db: DbConfig,

    #[serde(default)]
    pub logs: LogsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            ssl: false,
            cert_path: String::new(),
            key_path: String::new(),
            keep_alive_secs: 0,
            workers: 0,
            payload_limit_mib: Self::default_payload_limit_mib(),
            auth: AuthConfig::default(),
            db: DbConfig::default(),
            logs: LogsConfig::default(),
        }
    }
}

impl CommonConfig for ServerConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.bind = expandenv("bind", &self.bind)?;
        if self.bind.is_empty() {
            bail!("bind cannot be empty");
        }

        self.cert_path = expandenv("cert_path", &self.cert_path)?;
        if self.cert_path.is_empty() {
            self.cert_path = format!("{}", ps.pki_dir.join("server.crt").display());
        }
        self.key_path = expandenv("key_path", &self.key_path)?;
        if self.key_path.is_empty() {
            self.key_path = format!("{}", ps.pki_dir.join("server.key").display());
        }

        if self.payload_limit_mib < Self::MIN_PAYLOAD_LIMIT_MIB
            || self.payload_limit_mib > Self::MAX_PAYLOAD_LIMIT_MIB
        {
            bail!(
                "payload_limit_mib must be in range [{}, {}]",
                Self::MIN_PAYLOAD_LIMIT_MIB,
                Self::MAX_PAYLOAD_LIMIT_MIB
            );
        }

        self.auth.complete(ps).context("auth")?;
        self.db.complete(ps).context("db")?;
        self.logs.complete(ps).context("logs")?;

        Ok(())
    }
}

impl ServerConfig {
    const MIN_PAYLOAD_LIMIT_MIB: usize = 1;
    const MAX_PAYLOAD_LIMIT_MIB: usize = 10;

    pub fn default_bind() -> String {
        String::from("127.0.0.1:7890")
    }

    pub fn default_payload_limit_mib() -> usize {
        1
    }

    pub fn build_ssl(&self) -> Result<Option<SslAcceptorBuilder>> {
        if !self.ssl {
            return Ok(None);
        }
        Ok(Some(build_ssl_acceptor(&self.cert_path, &self.key_path)?))
    }
}

pub fn build_ssl_acceptor(cert_path: &str, key_path: &str) -> Result<SslAcceptorBuilder> {
    let cert = PathBuf::from(cert_path);
    let key = PathBuf::from(key_path);
    if !cert.exists() || !key.exists() {
        bail!(
            "ssl is enabled but certificate '{}' or key '{}' does not exist",
            cert.display(),
            key.display()
        );
    }

    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())?;
    builder
        .set_private_key_file(&key, SslFiletype::PEM)
        .context("load ssl private key")?;
    builder
        .set_certificate_chain_file(&cert)
        .context("load ssl certificate")?;
    Ok(builder)
}
