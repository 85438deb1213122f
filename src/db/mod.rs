mod memory;
mod sqlite;

#[cfg(test)]
mod tests;

pub mod config;
pub mod types;

use std::sync::Mutex;

use anyhow::{bail, Result};
use memory::{MemoryConnection, MemoryTransaction};
use sqlite::{SqliteConnection, SqliteTransaction};
use types::{Connection, GroupRecord, SourceRecord, TokenRecord, Transaction};

/// The token store. Every access goes through [`Database::with_transaction`],
/// which serializes callers on one connection and commits or rolls back
/// depending on the closure result.
pub struct Database {
    conn: Mutex<UnionConnection>,
}

impl Database {
    pub fn new(conn: UnionConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn memory() -> Self {
        Self::new(UnionConnection::Memory(MemoryConnection::new()))
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        let conn = SqliteConnection::memory().unwrap();
        Self::new(UnionConnection::Sqlite(conn))
    }

    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction) -> Result<T>,
    {
        let mut conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(e) => bail!("failed to lock connection: {:#}", e),
        };
        let tx = conn.transaction()?;

        let result = f(&tx);

        if result.is_ok() {
            tx.commit()
        } else {
            tx.rollback()
        }?;

        result
    }
}

pub enum UnionConnection {
    Sqlite(SqliteConnection),
    Memory(MemoryConnection),
}

pub enum UnionTransaction<'a> {
    Sqlite(SqliteTransaction<'a>),
    Memory(MemoryTransaction<'a>),
}

impl<'a> Connection<'a, UnionTransaction<'a>> for UnionConnection {
    fn transaction(&'a mut self) -> Result<UnionTransaction<'a>> {
        match self {
            UnionConnection::Sqlite(conn) => conn.transaction().map(UnionTransaction::Sqlite),
            UnionConnection::Memory(conn) => conn.transaction().map(UnionTransaction::Memory),
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $tx:ident => $call:expr) => {
        match $self {
            UnionTransaction::Sqlite($tx) => $call,
            UnionTransaction::Memory($tx) => $call,
        }
    };
}

impl Transaction for UnionTransaction<'_> {
    fn create_group(&self, group: &GroupRecord) -> Result<()> {
        dispatch!(self, tx => tx.create_group(group))
    }

    fn get_group(&self, name: &str) -> Result<Option<GroupRecord>> {
        dispatch!(self, tx => tx.get_group(name))
    }

    fn list_groups(&self) -> Result<Vec<GroupRecord>> {
        dispatch!(self, tx => tx.list_groups())
    }

    fn update_group_description(
        &self,
        name: &str,
        description: Option<&str>,
        update_time: u64,
    ) -> Result<()> {
        dispatch!(self, tx => tx.update_group_description(name, description, update_time))
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        dispatch!(self, tx => tx.delete_group(name))
    }

    fn create_token(&self, token: &TokenRecord) -> Result<()> {
        dispatch!(self, tx => tx.create_token(token))
    }

    fn get_token(&self, id: &str) -> Result<Option<TokenRecord>> {
        dispatch!(self, tx => tx.get_token(id))
    }

    fn list_tokens(&self) -> Result<Vec<TokenRecord>> {
        dispatch!(self, tx => tx.list_tokens())
    }

    fn revoke_token(&self, id: &str) -> Result<()> {
        dispatch!(self, tx => tx.revoke_token(id))
    }

    fn is_group_in_use(&self, group: &str, now: u64) -> Result<bool> {
        dispatch!(self, tx => tx.is_group_in_use(group, now))
    }

    fn get_bootstrap_token(&self, kind: &str) -> Result<Option<String>> {
        dispatch!(self, tx => tx.get_bootstrap_token(kind))
    }

    fn put_bootstrap_token(&self, kind: &str, token: &str) -> Result<()> {
        dispatch!(self, tx => tx.put_bootstrap_token(kind, token))
    }

    fn create_source(&self, source: &SourceRecord) -> Result<()> {
        dispatch!(self, tx => tx.create_source(source))
    }

    fn has_source(&self, name: &str) -> Result<bool> {
        dispatch!(self, tx => tx.has_source(name))
    }

    fn list_sources(&self, groups: &[String]) -> Result<Vec<SourceRecord>> {
        dispatch!(self, tx => tx.list_sources(groups))
    }

    fn commit(self) -> Result<()> {
        dispatch!(self, tx => tx.commit())
    }

    fn rollback(self) -> Result<()> {
        dispatch!(self, tx => tx.rollback())
    }
}
