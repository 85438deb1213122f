use anyhow::Result;
use chrono::{Local, TimeZone};
use clap::ValueEnum;
use serde::Serialize;

use crate::auth::group::Group;
use crate::db::types::TokenRecord;
use crate::now::current_timestamp;
use crate::table::Table;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DisplayStyle {
    Table,
    Json,
}

/// Types listed by the management commands.
pub trait TerminalDisplay {
    fn table_titles() -> Vec<&'static str>;
    fn table_row(&self) -> Vec<String>;
}

pub fn pretty_json<T: Serialize>(o: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&o)?);
    Ok(())
}

pub fn display_list<T>(list: &[T], style: DisplayStyle) -> Result<()>
where
    T: Serialize + TerminalDisplay,
{
    match style {
        DisplayStyle::Table => {
            if list.is_empty() {
                println!("<empty list>");
                return Ok(());
            }
            let mut table = Table::new(&T::table_titles());
            for item in list {
                table.add(item.table_row());
            }
            table.show();
            Ok(())
        }
        DisplayStyle::Json => pretty_json(list),
    }
}

pub fn format_time(ts: u64) -> String {
    match Local.timestamp_opt(ts as i64, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}

impl TerminalDisplay for Group {
    fn table_titles() -> Vec<&'static str> {
        vec!["NAME", "RESERVED", "DESCRIPTION", "UPDATED"]
    }

    fn table_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            if self.reserved { "yes" } else { "no" }.to_string(),
            self.description.clone().unwrap_or_default(),
            format_time(self.update_time),
        ]
    }
}

impl TerminalDisplay for TokenRecord {
    fn table_titles() -> Vec<&'static str> {
        vec!["ID", "GROUPS", "AUDIENCE", "EXPIRES", "STATUS", "NOTE"]
    }

    fn table_row(&self) -> Vec<String> {
        let status = if self.revoked {
            "revoked"
        } else if self.expires_at <= current_timestamp() {
            "expired"
        } else {
            "live"
        };
        vec![
            self.id.clone(),
            self.groups.join(","),
            self.audience.clone(),
            format_time(self.expires_at),
            status.to_string(),
            self.note.clone().unwrap_or_default(),
        ]
    }
}
