use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Result};

use super::types::{Connection, GroupRecord, SourceRecord, TokenRecord, Transaction};

/// Map-based store kept entirely in process memory. A transaction works on a
/// copy of the state which replaces the original on commit.
pub struct MemoryConnection {
    state: MemoryState,
}

pub struct MemoryTransaction<'a> {
    origin: &'a mut MemoryState,
    work: RefCell<MemoryState>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    groups: BTreeMap<String, GroupRecord>,
    tokens: HashMap<String, TokenRecord>,
    bootstrap: HashMap<String, String>,
    sources: BTreeMap<String, SourceRecord>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self {
            state: MemoryState::default(),
        }
    }
}

impl<'a> Connection<'a, MemoryTransaction<'a>> for MemoryConnection {
    fn transaction(&'a mut self) -> Result<MemoryTransaction<'a>> {
        let work = RefCell::new(self.state.clone());
        Ok(MemoryTransaction {
            origin: &mut self.state,
            work,
        })
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn create_group(&self, group: &GroupRecord) -> Result<()> {
        let mut state = self.work.borrow_mut();
        if state.groups.contains_key(&group.name) {
            bail!("group '{}' already exists in memory store", group.name);
        }
        state.groups.insert(group.name.clone(), group.clone());
        Ok(())
    }

    fn get_group(&self, name: &str) -> Result<Option<GroupRecord>> {
        Ok(self.work.borrow().groups.get(name).cloned())
    }

    fn list_groups(&self) -> Result<Vec<GroupRecord>> {
        Ok(self.work.borrow().groups.values().cloned().collect())
    }

    fn update_group_description(
        &self,
        name: &str,
        description: Option<&str>,
        update_time: u64,
    ) -> Result<()> {
        if let Some(group) = self.work.borrow_mut().groups.get_mut(name) {
            group.description = description.map(String::from);
            group.update_time = update_time;
        }
        Ok(())
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        self.work.borrow_mut().groups.remove(name);
        Ok(())
    }

    fn create_token(&self, token: &TokenRecord) -> Result<()> {
        let mut state = self.work.borrow_mut();
        if state.tokens.contains_key(&token.id) {
            bail!("token '{}' already exists in memory store", token.id);
        }
        state.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    fn get_token(&self, id: &str) -> Result<Option<TokenRecord>> {
        Ok(self.work.borrow().tokens.get(id).cloned())
    }

    fn list_tokens(&self) -> Result<Vec<TokenRecord>> {
        let mut tokens: Vec<_> = self.work.borrow().tokens.values().cloned().collect();
        tokens.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then(a.id.cmp(&b.id)));
        Ok(tokens)
    }

    fn revoke_token(&self, id: &str) -> Result<()> {
        if let Some(token) = self.work.borrow_mut().tokens.get_mut(id) {
            token.revoked = true;
        }
        Ok(())
    }

    fn is_group_in_use(&self, group: &str, now: u64) -> Result<bool> {
        let in_use = self.work.borrow().tokens.values().any(|token| {
            !token.revoked && token.expires_at > now && token.groups.iter().any(|g| g == group)
        });
        Ok(in_use)
    }

    fn get_bootstrap_token(&self, kind: &str) -> Result<Option<String>> {
        Ok(self.work.borrow().bootstrap.get(kind).cloned())
    }

    fn put_bootstrap_token(&self, kind: &str, token: &str) -> Result<()> {
        self.work
            .borrow_mut()
            .bootstrap
            .insert(kind.to_string(), token.to_string());
        Ok(())
    }

    fn create_source(&self, source: &SourceRecord) -> Result<()> {
        let mut state = self.work.borrow_mut();
        if state.sources.contains_key(&source.name) {
            bail!("source '{}' already exists in memory store", source.name);
        }
        state.sources.insert(source.name.clone(), source.clone());
        Ok(())
    }

    fn has_source(&self, name: &str) -> Result<bool> {
        Ok(self.work.borrow().sources.contains_key(name))
    }

    fn list_sources(&self, groups: &[String]) -> Result<Vec<SourceRecord>> {
        let sources = self
            .work
            .borrow()
            .sources
            .values()
            .filter(|source| groups.contains(&source.group))
            .cloned()
            .collect();
        Ok(sources)
    }

    fn commit(self) -> Result<()> {
        *self.origin = self.work.into_inner();
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::tests::run_tests;
    use crate::db::Database;

    #[test]
    fn test_memory() {
        let db = Database::memory();
        run_tests(&db);
    }
}
