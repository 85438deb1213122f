use std::fs;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Certificate, Url};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};
use crate::logs::LogsConfig;
use crate::server::config::build_ssl_acceptor;

/// `proxy.toml`. The proxy holds no token keys and no store.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProxyConfig {
    #[serde(default = "ProxyConfig::default_bind")]
    pub bind: String,

    /// Base url of the authorizing service, e.g. `https://127.0.0.1:7890`.
    #[serde(default = "ProxyConfig::default_upstream")]
    pub upstream: String,

    /// Extra root certificate for a self-signed upstream.
    #[serde(default)]
    pub upstream_cert_path: String,

    #[serde(default = "ProxyConfig::default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub ssl: bool,

    #[serde(default)]
    pub cert_path: String,

    #[serde(default)]
    pub key_path: String,

    #[serde(default)]
    pub workers: u64,

    #[serde(default)]
    pub logs: LogsConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            upstream: Self::default_upstream(),
            upstream_cert_path: String::new(),
            timeout_secs: Self::default_timeout_secs(),
            ssl: false,
            cert_path: String::new(),
            key_path: String::new(),
            workers: 0,
            logs: LogsConfig::default(),
        }
    }
}

impl CommonConfig for ProxyConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.bind = expandenv("bind", &self.bind)?;
        if self.bind.is_empty() {
            bail!("bind cannot be empty");
        }

        self.upstream = expandenv("upstream", &self.upstream)?;
        self.upstream = validate_upstream(&self.upstream)?;

        self.upstream_cert_path = expandenv("upstream_cert_path", &self.upstream_cert_path)?;

        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than 0");
        }

        self.cert_path = expandenv("cert_path", &self.cert_path)?;
        if self.cert_path.is_empty() {
            self.cert_path = format!("{}", ps.pki_dir.join("proxy.crt").display());
        }
        self.key_path = expandenv("key_path", &self.key_path)?;
        if self.key_path.is_empty() {
            self.key_path = format!("{}", ps.pki_dir.join("proxy.key").display());
        }

        self.logs.complete(ps).context("logs")?;
        Ok(())
    }
}

impl ProxyConfig {
    pub fn default_bind() -> String {
        String::from("127.0.0.1:7891")
    }

    pub fn default_upstream() -> String {
        String::from("http://127.0.0.1:7890")
    }

    pub fn default_timeout_secs() -> u64 {
        30
    }

    pub fn build_client(&self) -> Result<reqwest::Client> {
        let builder = reqwest::Client::builder().timeout(Duration::from_secs(self.timeout_secs));
        if self.upstream_cert_path.is_empty() || self.upstream.starts_with("http://") {
            return builder.build().context("build upstream client");
        }

        let data = fs::read(&self.upstream_cert_path).context("read upstream cert file")?;
        let cert = Certificate::from_pem(&data).context("load upstream cert file")?;
        builder
            .add_root_certificate(cert)
            .build()
            .context("build upstream client")
    }

    pub fn build_ssl(&self) -> Result<Option<openssl::ssl::SslAcceptorBuilder>> {
        if !self.ssl {
            return Ok(None);
        }
        Ok(Some(build_ssl_acceptor(&self.cert_path, &self.key_path)?))
    }
}

/// Accepts `http(s)://host[:port]` with an empty path and returns it without
/// the trailing slash.
pub fn validate_upstream(upstream: &str) -> Result<String> {
    let upstream = upstream.trim_end_matches('/');
    let parsed = match Url::parse(upstream) {
        Ok(url) => url,
        Err(_) => bail!("invalid upstream url '{upstream}'"),
    };
    match parsed.scheme() {
        "http" | "https" => {}
        _ => bail!(
            "invalid upstream scheme, expect 'http' or 'https', not '{}'",
            parsed.scheme()
        ),
    }
    if parsed.path() != "/" {
        bail!(
            "invalid upstream url, path should be '/', not '{}'",
            parsed.path()
        );
    }
    if parsed.query().is_some() {
        bail!("invalid upstream url, query is not allowed");
    }
    Ok(upstream.to_string())
}
