use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS bootstrap_token (
    kind TEXT PRIMARY KEY NOT NULL,
    token TEXT NOT NULL
);
"#;

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn get(tx: &Transaction, kind: &str) -> Result<Option<String>> {
    let sql = "SELECT token FROM bootstrap_token WHERE kind = ?";
    debug!("Database get_bootstrap_token: {sql}, {kind}");
    let token = tx
        .query_row(sql, params![kind], |row| row.get(0))
        .optional()?;
    Ok(token)
}

pub fn put(tx: &Transaction, kind: &str, token: &str) -> Result<()> {
    let sql = r#"
    INSERT INTO bootstrap_token (kind, token) VALUES (?, ?)
    ON CONFLICT(kind) DO UPDATE SET token = excluded.token
    "#;
    debug!("Database put_bootstrap_token: {kind}");
    tx.execute(sql, params![kind, token])?;
    Ok(())
}
