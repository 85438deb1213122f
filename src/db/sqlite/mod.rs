mod bootstrap;
mod group;
mod source;
mod token;

use std::path::Path;

use anyhow::Result;
use rusqlite::Connection as RawConnection;
use rusqlite::Transaction as RawTransaction;

use super::types::{Connection, GroupRecord, SourceRecord, TokenRecord, Transaction};

/// SQLite-backed store, the default for single-node deployments. Supports
/// both file-based and in-memory databases.
pub struct SqliteConnection {
    conn: RawConnection,
}

pub struct SqliteTransaction<'a> {
    tx: RawTransaction<'a>,
}

impl SqliteConnection {
    /// Opens a SQLite database file, creating it and the tables when missing.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = RawConnection::open(path)?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database, content is lost when the process exits.
    pub fn memory() -> Result<Self> {
        let conn = RawConnection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    fn init_tables(conn: &RawConnection) -> Result<()> {
        group::create_table(conn)?;
        token::create_table(conn)?;
        bootstrap::create_table(conn)?;
        source::create_table(conn)?;
        Ok(())
    }
}

impl<'a> Connection<'a, SqliteTransaction<'a>> for SqliteConnection {
    fn transaction(&'a mut self) -> Result<SqliteTransaction<'a>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTransaction { tx })
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn create_group(&self, group: &GroupRecord) -> Result<()> {
        group::create(&self.tx, group)
    }

    fn get_group(&self, name: &str) -> Result<Option<GroupRecord>> {
        group::get(&self.tx, name)
    }

    fn list_groups(&self) -> Result<Vec<GroupRecord>> {
        group::list(&self.tx)
    }

    fn update_group_description(
        &self,
        name: &str,
        description: Option<&str>,
        update_time: u64,
    ) -> Result<()> {
        group::update_description(&self.tx, name, description, update_time)
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        group::delete(&self.tx, name)
    }

    fn create_token(&self, token: &TokenRecord) -> Result<()> {
        token::create(&self.tx, token)
    }

    fn get_token(&self, id: &str) -> Result<Option<TokenRecord>> {
        token::get(&self.tx, id)
    }

    fn list_tokens(&self) -> Result<Vec<TokenRecord>> {
        token::list(&self.tx)
    }

    fn revoke_token(&self, id: &str) -> Result<()> {
        token::revoke(&self.tx, id)
    }

    fn is_group_in_use(&self, group: &str, now: u64) -> Result<bool> {
        token::is_group_in_use(&self.tx, group, now)
    }

    fn get_bootstrap_token(&self, kind: &str) -> Result<Option<String>> {
        bootstrap::get(&self.tx, kind)
    }

    fn put_bootstrap_token(&self, kind: &str, token: &str) -> Result<()> {
        bootstrap::put(&self.tx, kind, token)
    }

    fn create_source(&self, source: &SourceRecord) -> Result<()> {
        source::create(&self.tx, source)
    }

    fn has_source(&self, name: &str) -> Result<bool> {
        source::has(&self.tx, name)
    }

    fn list_sources(&self, groups: &[String]) -> Result<Vec<SourceRecord>> {
        source::list(&self.tx, groups)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
