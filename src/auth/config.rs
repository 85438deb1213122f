use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

/// Token and authorization settings. Passed explicitly into the services that
/// need it; nothing under `auth` reads the environment at request time.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// Audience this service accepts, tokens for other audiences are rejected.
    #[serde(default = "AuthConfig::default_audience")]
    pub audience: String,

    /// Ttl used when a create-token request does not name one.
    #[serde(default = "AuthConfig::default_token_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Upper bound for the ttl of issued tokens (bootstrap tokens excluded).
    #[serde(default = "AuthConfig::default_max_ttl_secs")]
    pub max_ttl_secs: u64,

    /// Ttl of the bootstrap public and admin tokens.
    #[serde(default = "AuthConfig::default_bootstrap_ttl_days")]
    pub bootstrap_ttl_days: u64,

    /// Bound on a store-checked verification round trip.
    #[serde(default = "AuthConfig::default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Max age of the in-memory group view before it is reloaded from the
    /// store. Groups created or deleted by another process sharing the store
    /// become visible within this bound. 0 reloads on every lookup.
    #[serde(default = "AuthConfig::default_registry_refresh_secs")]
    pub registry_refresh_secs: u64,

    /// RSA public key (PEM). Default: `{config_dir}/pki/token_public.pem`,
    /// generated together with the private key when both are missing.
    #[serde(default)]
    pub public_key_path: String,

    /// RSA private key (PEM). Default: `{config_dir}/pki/token_private.pem`.
    #[serde(default)]
    pub private_key_path: String,

    #[serde(skip)]
    pub public_key: PathBuf,

    #[serde(skip)]
    pub private_key: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            audience: Self::default_audience(),
            default_ttl_secs: Self::default_token_ttl_secs(),
            max_ttl_secs: Self::default_max_ttl_secs(),
            bootstrap_ttl_days: Self::default_bootstrap_ttl_days(),
            store_timeout_ms: Self::default_store_timeout_ms(),
            registry_refresh_secs: Self::default_registry_refresh_secs(),
            public_key_path: String::new(),
            private_key_path: String::new(),
            public_key: PathBuf::new(),
            private_key: PathBuf::new(),
        }
    }
}

impl CommonConfig for AuthConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.audience = expandenv("audience", &self.audience)?;
        if self.audience.is_empty() {
            bail!("audience is required");
        }

        if self.max_ttl_secs == 0 {
            bail!("max_ttl_secs must be greater than 0");
        }
        if self.default_ttl_secs == 0 || self.default_ttl_secs > self.max_ttl_secs {
            bail!(
                "default_ttl_secs must be in range [1, {}]",
                self.max_ttl_secs
            );
        }
        if self.bootstrap_ttl_days == 0 {
            bail!("bootstrap_ttl_days must be greater than 0");
        }
        if self.store_timeout_ms < Self::MIN_STORE_TIMEOUT_MS
            || self.store_timeout_ms > Self::MAX_STORE_TIMEOUT_MS
        {
            bail!(
                "store_timeout_ms must be in range [{}, {}]",
                Self::MIN_STORE_TIMEOUT_MS,
                Self::MAX_STORE_TIMEOUT_MS
            );
        }

        self.public_key_path = expandenv("public_key_path", &self.public_key_path)?;
        self.private_key_path = expandenv("private_key_path", &self.private_key_path)?;
        match (
            self.public_key_path.is_empty(),
            self.private_key_path.is_empty(),
        ) {
            (true, true) => {
                self.public_key = ps.pki_dir.join("token_public.pem");
                self.private_key = ps.pki_dir.join("token_private.pem");
            }
            (false, false) => {
                self.public_key = PathBuf::from(&self.public_key_path);
                self.private_key = PathBuf::from(&self.private_key_path);
            }
            _ => bail!(
                "both public_key_path and private_key_path should be set or both should be empty"
            ),
        }

        Ok(())
    }
}

impl AuthConfig {
    const MIN_STORE_TIMEOUT_MS: u64 = 10;
    const MAX_STORE_TIMEOUT_MS: u64 = 60 * 1000;

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn registry_refresh(&self) -> Duration {
        Duration::from_secs(self.registry_refresh_secs)
    }

    pub fn bootstrap_ttl(&self) -> Duration {
        Duration::from_secs(self.bootstrap_ttl_days * 24 * 60 * 60)
    }

    pub fn default_audience() -> String {
        String::from("groupgate")
    }

    pub fn default_token_ttl_secs() -> u64 {
        60 * 60 // 1 hour
    }

    pub fn default_max_ttl_secs() -> u64 {
        60 * 60 * 24 * 365
    }

    pub fn default_bootstrap_ttl_days() -> u64 {
        3650
    }

    pub fn default_store_timeout_ms() -> u64 {
        2000
    }

    pub fn default_registry_refresh_secs() -> u64 {
        5
    }
}
