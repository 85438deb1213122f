use anyhow::Result;
use serde::{Deserialize, Serialize};

pub trait Connection<'a, T>
where
    T: Transaction + 'a,
{
    fn transaction(&'a mut self) -> Result<T>;
}

/// Storage operations for groups, token records, bootstrap tokens and
/// content sources. All methods run inside one transaction; nothing is
/// visible to other callers until `commit`.
pub trait Transaction {
    fn create_group(&self, group: &GroupRecord) -> Result<()>;
    fn get_group(&self, name: &str) -> Result<Option<GroupRecord>>;
    fn list_groups(&self) -> Result<Vec<GroupRecord>>;
    fn update_group_description(
        &self,
        name: &str,
        description: Option<&str>,
        update_time: u64,
    ) -> Result<()>;
    fn delete_group(&self, name: &str) -> Result<()>;

    fn create_token(&self, token: &TokenRecord) -> Result<()>;
    fn get_token(&self, id: &str) -> Result<Option<TokenRecord>>;
    fn list_tokens(&self) -> Result<Vec<TokenRecord>>;
    fn revoke_token(&self, id: &str) -> Result<()>;
    /// Whether an unrevoked token that expires after `now` names `group`.
    fn is_group_in_use(&self, group: &str, now: u64) -> Result<bool>;

    fn get_bootstrap_token(&self, kind: &str) -> Result<Option<String>>;
    fn put_bootstrap_token(&self, kind: &str, token: &str) -> Result<()>;

    fn create_source(&self, source: &SourceRecord) -> Result<()>;
    fn has_source(&self, name: &str) -> Result<bool>;
    /// Lists sources attributed to any of `groups`, ordered by name.
    fn list_sources(&self, groups: &[String]) -> Result<Vec<SourceRecord>>;

    fn commit(self) -> Result<()>;
    fn rollback(self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub description: Option<String>,
    pub reserved: bool,
    pub create_time: u64,
    pub update_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: String,
    pub groups: Vec<String>,
    pub audience: String,
    pub issued_at: u64,
    pub expires_at: u64,
    pub revoked: bool,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub name: String,
    pub url: String,
    pub group: String,
    pub create_time: u64,
}
