use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::db::types::TokenRecord;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS token (
    id TEXT PRIMARY KEY NOT NULL,
    audience TEXT NOT NULL,
    issued_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    revoked INTEGER NOT NULL,
    note TEXT
);
CREATE TABLE IF NOT EXISTS token_group (
    token_id TEXT NOT NULL,
    group_name TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (token_id, group_name)
);
CREATE INDEX IF NOT EXISTS idx_token_group_name ON token_group (group_name);
"#;

const SELECT_COLUMNS: &str = "id, audience, issued_at, expires_at, revoked, note";

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create(tx: &Transaction, token: &TokenRecord) -> Result<()> {
    let sql = r#"
    INSERT INTO token (id, audience, issued_at, expires_at, revoked, note)
    VALUES (?, ?, ?, ?, ?, ?)
    "#;
    debug!("Database create_token: {sql}, {token:?}");
    tx.execute(
        sql,
        params![
            token.id,
            token.audience,
            token.issued_at,
            token.expires_at,
            token.revoked,
            token.note,
        ],
    )?;

    let sql = "INSERT INTO token_group (token_id, group_name, position) VALUES (?, ?, ?)";
    for (position, group) in token.groups.iter().enumerate() {
        tx.execute(sql, params![token.id, group, position as u64])?;
    }

    Ok(())
}

pub fn get(tx: &Transaction, id: &str) -> Result<Option<TokenRecord>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM token WHERE id = ?");
    debug!("Database get_token: {sql}, {id}");
    let token = tx.query_row(&sql, params![id], parse_row).optional()?;
    match token {
        Some(mut token) => {
            token.groups = list_groups(tx, &token.id)?;
            Ok(Some(token))
        }
        None => Ok(None),
    }
}

pub fn list(tx: &Transaction) -> Result<Vec<TokenRecord>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM token ORDER BY issued_at DESC, id ASC");
    debug!("Database list_tokens: {sql}");
    let mut stmt = tx.prepare(&sql)?;
    let mut tokens = stmt
        .query_map([], parse_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for token in tokens.iter_mut() {
        token.groups = list_groups(tx, &token.id)?;
    }

    Ok(tokens)
}

pub fn revoke(tx: &Transaction, id: &str) -> Result<()> {
    let sql = "UPDATE token SET revoked = 1 WHERE id = ?";
    debug!("Database revoke_token: {sql}, {id}");
    tx.execute(sql, params![id])?;
    Ok(())
}

pub fn is_group_in_use(tx: &Transaction, group: &str, now: u64) -> Result<bool> {
    let sql = r#"
    SELECT COUNT(*) FROM token t
    JOIN token_group g ON t.id = g.token_id
    WHERE g.group_name = ? AND t.revoked = 0 AND t.expires_at > ?
    "#;
    debug!("Database is_group_in_use: {sql}, {group}, {now}");
    let count: i64 = tx.query_row(sql, params![group, now], |row| row.get(0))?;
    Ok(count > 0)
}

fn list_groups(tx: &Transaction, id: &str) -> Result<Vec<String>> {
    let sql = "SELECT group_name FROM token_group WHERE token_id = ? ORDER BY position ASC";
    let mut stmt = tx.prepare(sql)?;
    let groups = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(groups)
}

fn parse_row(row: &Row) -> rusqlite::Result<TokenRecord> {
    Ok(TokenRecord {
        id: row.get(0)?,
        groups: vec![],
        audience: row.get(1)?,
        issued_at: row.get(2)?,
        expires_at: row.get(3)?,
        revoked: row.get(4)?,
        note: row.get(5)?,
    })
}
