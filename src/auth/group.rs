use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::db::types::GroupRecord;
use crate::db::Database;
use crate::now::current_timestamp;

use super::error::AuthError;

pub const PUBLIC_GROUP: &str = "public";
pub const ADMIN_GROUP: &str = "admin";

pub const RESERVED_GROUPS: [&str; 2] = [PUBLIC_GROUP, ADMIN_GROUP];

const MAX_GROUP_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub reserved: bool,

    pub create_time: u64,
    pub update_time: u64,
}

impl From<GroupRecord> for Group {
    fn from(r: GroupRecord) -> Self {
        Self {
            name: r.name,
            description: r.description,
            reserved: r.reserved,
            create_time: r.create_time,
            update_time: r.update_time,
        }
    }
}

impl From<&Group> for GroupRecord {
    fn from(g: &Group) -> Self {
        Self {
            name: g.name.clone(),
            description: g.description.clone(),
            reserved: g.reserved,
            create_time: g.create_time,
            update_time: g.update_time,
        }
    }
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_GROUPS.contains(&name)
}

pub fn validate_group_name(name: &str) -> Result<(), AuthError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_GROUP_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(AuthError::InvalidGroupName(name.to_string()));
    }
    Ok(())
}

/// The set of known groups.
///
/// The store is the source of truth and may be shared with other processes,
/// such as the management CLI. The registry keeps a sorted view of it behind
/// a reader/writer lock so the verification path usually checks membership
/// without a store round trip. A name missing from the view is looked up in
/// the store, and the whole view is reloaded once it is older than the
/// refresh interval. Mutations hold the write lock for the whole store
/// transaction and decide on the store's answer, not the view's.
pub struct GroupRegistry {
    db: Arc<Database>,
    refresh: Duration,
    view: RwLock<GroupView>,
}

struct GroupView {
    groups: BTreeMap<String, Group>,
    loaded_at: Option<Instant>,
}

impl GroupView {
    fn is_fresh(&self, refresh: Duration) -> bool {
        match self.loaded_at {
            Some(loaded_at) => loaded_at.elapsed() < refresh,
            None => false,
        }
    }

    fn replace(&mut self, records: Vec<GroupRecord>) {
        self.groups = records
            .into_iter()
            .map(|r| (r.name.clone(), Group::from(r)))
            .collect();
        self.loaded_at = Some(Instant::now());
    }
}

impl GroupRegistry {
    /// Builds the registry and runs [`GroupRegistry::ensure_reserved`].
    pub fn open(db: Arc<Database>, refresh: Duration) -> Result<Self, AuthError> {
        let registry = Self {
            db,
            refresh,
            view: RwLock::new(GroupView {
                groups: BTreeMap::new(),
                loaded_at: None,
            }),
        };
        registry.ensure_reserved()?;
        Ok(registry)
    }

    /// Creates the reserved groups when absent and reloads the view. Safe to
    /// call any number of times.
    pub fn ensure_reserved(&self) -> Result<(), AuthError> {
        let mut view = self.write_view()?;

        let groups = self
            .db
            .with_transaction(|tx| {
                let now = current_timestamp();
                for name in RESERVED_GROUPS {
                    if tx.get_group(name)?.is_some() {
                        continue;
                    }
                    info!("Create reserved group '{name}'");
                    tx.create_group(&GroupRecord {
                        name: name.to_string(),
                        description: Some(format!("Reserved {name} group")),
                        reserved: true,
                        create_time: now,
                        update_time: now,
                    })?;
                }
                tx.list_groups()
            })
            .map_err(AuthError::backend)?;

        view.replace(groups);
        Ok(())
    }

    pub fn create_group(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<Group, AuthError> {
        validate_group_name(name)?;
        if is_reserved(name) {
            return Err(AuthError::ReservedNameConflict(name.to_string()));
        }

        let mut view = self.write_view()?;
        let now = current_timestamp();
        let group = Group {
            name: name.to_string(),
            description,
            reserved: false,
            create_time: now,
            update_time: now,
        };

        let existing = self
            .db
            .with_transaction(|tx| {
                if let Some(existing) = tx.get_group(name)? {
                    return Ok(Some(existing));
                }
                tx.create_group(&GroupRecord::from(&group))?;
                Ok(None)
            })
            .map_err(AuthError::backend)?;
        if let Some(existing) = existing {
            // Created by another process sharing the store
            view.groups.insert(existing.name.clone(), Group::from(existing));
            return Err(AuthError::GroupAlreadyExists(name.to_string()));
        }

        debug!("Group created: {group:?}");
        view.groups.insert(group.name.clone(), group.clone());
        Ok(group)
    }

    pub fn get_group(&self, name: &str) -> Result<Group, AuthError> {
        match self.lookup(name)? {
            Some(group) => Ok(group),
            None => Err(AuthError::GroupNotFound(name.to_string())),
        }
    }

    /// All groups, sorted by name.
    pub fn list_groups(&self) -> Result<Vec<Group>, AuthError> {
        {
            let view = self.read_view()?;
            if view.is_fresh(self.refresh) {
                return Ok(view.groups.values().cloned().collect());
            }
        }

        let mut view = self.write_view()?;
        if !view.is_fresh(self.refresh) {
            self.reload(&mut view)?;
        }
        Ok(view.groups.values().cloned().collect())
    }

    pub fn contains(&self, name: &str) -> Result<bool, AuthError> {
        Ok(self.lookup(name)?.is_some())
    }

    pub fn update_description(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<Group, AuthError> {
        let mut view = self.write_view()?;

        let now = current_timestamp();
        let updated = self
            .db
            .with_transaction(|tx| {
                let mut record = match tx.get_group(name)? {
                    Some(record) => record,
                    None => return Ok(None),
                };
                tx.update_group_description(name, description.as_deref(), now)?;
                record.description = description.clone();
                record.update_time = now;
                Ok(Some(record))
            })
            .map_err(AuthError::backend)?;

        match updated {
            Some(record) => {
                let group = Group::from(record);
                view.groups.insert(group.name.clone(), group.clone());
                Ok(group)
            }
            None => {
                view.groups.remove(name);
                Err(AuthError::GroupNotFound(name.to_string()))
            }
        }
    }

    /// Deletes a non-reserved group that no live token references.
    pub fn delete_group(&self, name: &str) -> Result<(), AuthError> {
        if is_reserved(name) {
            return Err(AuthError::ReservedNameConflict(name.to_string()));
        }

        let mut view = self.write_view()?;

        let now = current_timestamp();
        let outcome = self
            .db
            .with_transaction(|tx| {
                if tx.get_group(name)?.is_none() {
                    return Ok(Err(AuthError::GroupNotFound(name.to_string())));
                }
                if tx.is_group_in_use(name, now)? {
                    return Ok(Err(AuthError::GroupInUse(name.to_string())));
                }
                tx.delete_group(name)?;
                Ok(Ok(()))
            })
            .map_err(AuthError::backend)?;

        match outcome {
            Ok(()) => info!("Group '{name}' deleted"),
            Err(AuthError::GroupNotFound(name)) => {
                view.groups.remove(&name);
                return Err(AuthError::GroupNotFound(name));
            }
            Err(e) => return Err(e),
        }
        view.groups.remove(name);
        Ok(())
    }

    /// Finds `name` in the view, falling back to the store on a miss or when
    /// the view is due for a reload.
    fn lookup(&self, name: &str) -> Result<Option<Group>, AuthError> {
        {
            let view = self.read_view()?;
            if view.is_fresh(self.refresh) {
                if let Some(group) = view.groups.get(name) {
                    return Ok(Some(group.clone()));
                }
            }
        }

        let mut view = self.write_view()?;
        if !view.is_fresh(self.refresh) {
            self.reload(&mut view)?;
        } else if !view.groups.contains_key(name) {
            let record = self
                .db
                .with_transaction(|tx| tx.get_group(name))
                .map_err(AuthError::backend)?;
            if let Some(record) = record {
                debug!("Group '{name}' loaded from store");
                view.groups.insert(record.name.clone(), Group::from(record));
            }
        }
        Ok(view.groups.get(name).cloned())
    }

    fn reload(&self, view: &mut GroupView) -> Result<(), AuthError> {
        let groups = self
            .db
            .with_transaction(|tx| tx.list_groups())
            .map_err(AuthError::backend)?;
        debug!("Group view reloaded, {} groups", groups.len());
        view.replace(groups);
        Ok(())
    }

    fn read_view(&self) -> Result<RwLockReadGuard<'_, GroupView>, AuthError> {
        self.view
            .read()
            .map_err(|_| AuthError::BackendUnavailable(String::from("group registry poisoned")))
    }

    fn write_view(&self) -> Result<RwLockWriteGuard<'_, GroupView>, AuthError> {
        self.view
            .write()
            .map_err(|_| AuthError::BackendUnavailable(String::from("group registry poisoned")))
    }
}

#[cfg(test)]
mod tests {
    use crate::db::types::TokenRecord;

    use super::*;

    const REFRESH: Duration = Duration::from_secs(60);

    fn names(registry: &GroupRegistry) -> Vec<String> {
        registry
            .list_groups()
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect()
    }

    #[test]
    fn test_ensure_reserved() {
        let db = Arc::new(Database::new_test());
        let registry = GroupRegistry::open(db.clone(), REFRESH).unwrap();
        assert_eq!(names(&registry), vec!["admin", "public"]);

        for _ in 0..3 {
            registry.ensure_reserved().unwrap();
        }
        assert_eq!(names(&registry), vec!["admin", "public"]);

        // A second registry over the same store sees the same groups once
        let registry = GroupRegistry::open(db, REFRESH).unwrap();
        assert_eq!(names(&registry), vec!["admin", "public"]);
        assert!(registry.get_group("public").unwrap().reserved);
        assert!(registry.get_group("admin").unwrap().reserved);
    }

    #[test]
    fn test_create_group() {
        let registry = GroupRegistry::open(Arc::new(Database::new_test()), REFRESH).unwrap();

        let group = registry
            .create_group("us-sales", Some(String::from("US sales")))
            .unwrap();
        assert_eq!(group.name, "us-sales");
        assert!(!group.reserved);
        assert_eq!(registry.get_group("us-sales").unwrap(), group);

        assert!(matches!(
            registry.create_group("us-sales", None),
            Err(AuthError::GroupAlreadyExists(_))
        ));
        assert!(matches!(
            registry.create_group("public", None),
            Err(AuthError::ReservedNameConflict(_))
        ));
        assert!(matches!(
            registry.create_group("admin", None),
            Err(AuthError::ReservedNameConflict(_))
        ));
        assert!(matches!(
            registry.create_group("", None),
            Err(AuthError::InvalidGroupName(_))
        ));
        assert!(matches!(
            registry.create_group("bad name", None),
            Err(AuthError::InvalidGroupName(_))
        ));

        registry.create_group("apac-sales", None).unwrap();
        assert_eq!(
            names(&registry),
            vec!["admin", "apac-sales", "public", "us-sales"]
        );

        assert!(matches!(
            registry.get_group("none"),
            Err(AuthError::GroupNotFound(_))
        ));
        assert!(registry.contains("apac-sales").unwrap());
        assert!(!registry.contains("none").unwrap());
    }

    #[test]
    fn test_update_description() {
        let registry = GroupRegistry::open(Arc::new(Database::new_test()), REFRESH).unwrap();
        registry.create_group("ops", None).unwrap();

        let group = registry
            .update_description("ops", Some(String::from("Operations")))
            .unwrap();
        assert_eq!(group.description.as_deref(), Some("Operations"));
        assert_eq!(
            registry.get_group("ops").unwrap().description.as_deref(),
            Some("Operations")
        );

        assert!(matches!(
            registry.update_description("none", None),
            Err(AuthError::GroupNotFound(_))
        ));
    }

    #[test]
    fn test_delete_group() {
        let db = Arc::new(Database::new_test());
        let registry = GroupRegistry::open(db.clone(), REFRESH).unwrap();
        registry.create_group("ops", None).unwrap();
        registry.create_group("dev", None).unwrap();

        let now = current_timestamp();
        db.with_transaction(|tx| {
            tx.create_token(&TokenRecord {
                id: String::from("live"),
                groups: vec![String::from("ops")],
                audience: String::from("groupgate"),
                issued_at: now,
                expires_at: now + 3600,
                revoked: false,
                note: None,
            })
        })
        .unwrap();

        assert!(matches!(
            registry.delete_group("public"),
            Err(AuthError::ReservedNameConflict(_))
        ));
        assert!(matches!(
            registry.delete_group("ops"),
            Err(AuthError::GroupInUse(_))
        ));
        assert!(matches!(
            registry.delete_group("none"),
            Err(AuthError::GroupNotFound(_))
        ));

        registry.delete_group("dev").unwrap();
        assert!(!registry.contains("dev").unwrap());

        db.with_transaction(|tx| tx.revoke_token("live")).unwrap();
        registry.delete_group("ops").unwrap();
        assert_eq!(names(&registry), vec!["admin", "public"]);
    }

    #[test]
    fn test_shared_store() {
        let db = Arc::new(Database::new_test());
        let service = GroupRegistry::open(db.clone(), REFRESH).unwrap();
        let cli = GroupRegistry::open(db.clone(), REFRESH).unwrap();

        // Created elsewhere: found on the first miss
        cli.create_group("emea", Some(String::from("EMEA sales"))).unwrap();
        assert!(service.contains("emea").unwrap());
        assert_eq!(
            service.get_group("emea").unwrap().description.as_deref(),
            Some("EMEA sales")
        );

        cli.create_group("latam", None).unwrap();
        assert!(matches!(
            service.create_group("latam", None),
            Err(AuthError::GroupAlreadyExists(_))
        ));
        assert!(names(&service).contains(&String::from("latam")));

        // Deleted elsewhere: the service's own mutations follow the store
        cli.delete_group("latam").unwrap();
        assert!(matches!(
            service.update_description("latam", None),
            Err(AuthError::GroupNotFound(_))
        ));
        assert!(!service.contains("latam").unwrap());

        cli.delete_group("emea").unwrap();
        assert!(matches!(
            service.delete_group("emea"),
            Err(AuthError::GroupNotFound(_))
        ));
    }

    #[test]
    fn test_refresh() {
        let db = Arc::new(Database::new_test());
        let service = GroupRegistry::open(db.clone(), Duration::ZERO).unwrap();
        let cli = GroupRegistry::open(db.clone(), REFRESH).unwrap();

        cli.create_group("ops", None).unwrap();
        assert!(service.contains("ops").unwrap());

        cli.delete_group("ops").unwrap();
        assert!(!service.contains("ops").unwrap());
        assert_eq!(names(&service), vec!["admin", "public"]);
    }
}
