use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

use super::memory::MemoryConnection;
use super::sqlite::SqliteConnection;
use super::{Database, UnionConnection};

/// Storage configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DbConfig {
    #[serde(default)]
    pub name: DbType,

    /// Path of the sqlite database file, default: `{data_dir}/groupgate.db`.
    #[serde(default)]
    pub path: String,

    #[serde(skip)]
    sqlite_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq)]
pub enum DbType {
    #[serde(rename = "sqlite")]
    #[default]
    Sqlite,

    /// Everything is lost on restart, including the bootstrap tokens.
    #[serde(rename = "memory")]
    Memory,
}

impl CommonConfig for DbConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.name != DbType::Sqlite {
            return Ok(());
        }

        self.path = expandenv("path", &self.path)?;
        self.sqlite_path = if self.path.is_empty() {
            ps.data_dir.join("groupgate.db")
        } else {
            PathBuf::from(&self.path)
        };

        Ok(())
    }
}

impl DbConfig {
    pub fn build(&self) -> Result<Database> {
        let conn = match self.name {
            DbType::Sqlite => {
                let conn = SqliteConnection::open(&self.sqlite_path).with_context(|| {
                    format!("open sqlite database '{}'", self.sqlite_path.display())
                })?;
                UnionConnection::Sqlite(conn)
            }
            DbType::Memory => UnionConnection::Memory(MemoryConnection::new()),
        };
        Ok(Database::new(conn))
    }
}
