use anyhow::Result;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Transaction};

use crate::db::types::SourceRecord;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS source (
    name TEXT PRIMARY KEY NOT NULL,
    url TEXT NOT NULL,
    group_name TEXT NOT NULL,
    create_time INTEGER NOT NULL
);
"#;

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create(tx: &Transaction, source: &SourceRecord) -> Result<()> {
    let sql = "INSERT INTO source (name, url, group_name, create_time) VALUES (?, ?, ?, ?)";
    debug!("Database create_source: {sql}, {source:?}");
    tx.execute(
        sql,
        params![source.name, source.url, source.group, source.create_time],
    )?;
    Ok(())
}

pub fn has(tx: &Transaction, name: &str) -> Result<bool> {
    let sql = "SELECT COUNT(*) FROM source WHERE name = ?";
    debug!("Database has_source: {sql}, {name}");
    let count: i64 = tx.query_row(sql, params![name], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn list(tx: &Transaction, groups: &[String]) -> Result<Vec<SourceRecord>> {
    if groups.is_empty() {
        return Ok(vec![]);
    }

    let placeholders = vec!["?"; groups.len()].join(", ");
    let sql = format!(
        "SELECT name, url, group_name, create_time FROM source WHERE group_name IN ({placeholders}) ORDER BY name ASC"
    );
    let values: Vec<Value> = groups.iter().map(|g| Value::Text(g.clone())).collect();
    debug!("Database list_sources: {sql}, {values:?}");

    let mut stmt = tx.prepare(&sql)?;
    let sources = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(SourceRecord {
                name: row.get(0)?,
                url: row.get(1)?,
                group: row.get(2)?,
                create_time: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sources)
}
