use std::path::PathBuf;
use std::{env, fs, io};

use anyhow::{Context, Result};
use clap::Args;
use log::warn;
use serde::de::DeserializeOwned;

use crate::dirs;

/// Directories every component resolves its files against.
pub struct PathSet {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub pki_dir: PathBuf,
}

impl PathSet {
    pub fn new(config_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => match env::var_os("GROUPGATE_CONFIG") {
                Some(dir) => PathBuf::from(dir),
                None => dirs::default_config_dir()?,
            },
        };

        let data_dir = match data_dir {
            Some(dir) => dir,
            None => match env::var_os("GROUPGATE_DATA") {
                Some(dir) => PathBuf::from(dir),
                None => dirs::default_data_dir()?,
            },
        };

        // PKI material always lives under the config directory
        let pki_dir = config_dir.join("pki");

        dirs::ensure_dir_exists(&config_dir).context("ensure config dir")?;
        dirs::ensure_dir_exists(&data_dir).context("ensure data dir")?;
        dirs::ensure_dir_exists(&pki_dir).context("ensure pki dir")?;

        Ok(Self {
            config_dir,
            data_dir,
            pki_dir,
        })
    }

    /// Loads `{config_dir}/{name}.toml`, falling back to defaults when the file
    /// does not exist, then validates it.
    pub fn load_config<T>(&self, name: &str) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
    {
        let path = self.config_dir.join(format!("{name}.toml"));
        let mut cfg: T = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s)
                .with_context(|| format!("parse config toml: {}", path.display()))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Config file for {name} not found, using defaults");
                T::default()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read config file: {}", path.display()));
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }
}

pub trait CommonConfig: Default {
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// The config directory, default: `~/.config/groupgate` or `/etc/groupgate` for root.
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// The data directory, default: `~/.local/share/groupgate` or `/var/lib/groupgate` for root.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load<T>(&self, name: &str) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
    {
        let ps = PathSet::new(self.config_dir.clone(), self.data_dir.clone())?;
        ps.load_config(name)
    }
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

#[cfg(test)]
pub fn test_path_set(name: &str) -> PathSet {
    let base = env::temp_dir().join(format!("groupgate_test_{name}"));
    PathSet::new(Some(base.join("config")), Some(base.join("data"))).unwrap()
}
