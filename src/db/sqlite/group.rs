use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::db::types::GroupRecord;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS groups (
    name TEXT PRIMARY KEY NOT NULL,
    description TEXT,
    reserved INTEGER NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);
"#;

const SELECT_COLUMNS: &str = "name, description, reserved, create_time, update_time";

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create(tx: &Transaction, group: &GroupRecord) -> Result<()> {
    let sql = r#"
    INSERT INTO groups (name, description, reserved, create_time, update_time)
    VALUES (?, ?, ?, ?, ?)
    "#;
    debug!("Database create_group: {sql}, {group:?}");
    tx.execute(
        sql,
        params![
            group.name,
            group.description,
            group.reserved,
            group.create_time,
            group.update_time,
        ],
    )?;
    Ok(())
}

pub fn get(tx: &Transaction, name: &str) -> Result<Option<GroupRecord>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM groups WHERE name = ?");
    debug!("Database get_group: {sql}, {name}");
    let group = tx
        .query_row(&sql, params![name], parse_row)
        .optional()?;
    Ok(group)
}

pub fn list(tx: &Transaction) -> Result<Vec<GroupRecord>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM groups ORDER BY name ASC");
    debug!("Database list_groups: {sql}");
    let mut stmt = tx.prepare(&sql)?;
    let groups = stmt
        .query_map([], parse_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(groups)
}

pub fn update_description(
    tx: &Transaction,
    name: &str,
    description: Option<&str>,
    update_time: u64,
) -> Result<()> {
    let sql = "UPDATE groups SET description = ?, update_time = ? WHERE name = ?";
    debug!("Database update_group_description: {sql}, {name}, {description:?}");
    tx.execute(sql, params![description, update_time, name])?;
    Ok(())
}

pub fn delete(tx: &Transaction, name: &str) -> Result<()> {
    let sql = "DELETE FROM groups WHERE name = ?";
    debug!("Database delete_group: {sql}, {name}");
    tx.execute(sql, params![name])?;
    Ok(())
}

fn parse_row(row: &Row) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        name: row.get(0)?,
        description: row.get(1)?,
        reserved: row.get(2)?,
        create_time: row.get(3)?,
        update_time: row.get(4)?,
    })
}
