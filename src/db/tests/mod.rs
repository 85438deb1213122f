
use anyhow::{bail, Result};

use super::types::{GroupRecord, SourceRecord};
use super::Database;

/// Runs the same behavior checks against any backend.
pub fn run_tests(db: &Database) {
    group::run_group_tests(db);
    token::run_token_tests(db);

    test_bootstrap(db);
    test_sources(db);
    test_rollback(db);
}

fn test_bootstrap(db: &Database) {
    db.with_transaction(|tx| {
        assert_eq!(tx.get_bootstrap_token("public")?, None);
        tx.put_bootstrap_token("public", "token-1")?;
        tx.put_bootstrap_token("admin", "token-2")?;
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        assert_eq!(tx.get_bootstrap_token("public")?.as_deref(), Some("token-1"));
        tx.put_bootstrap_token("public", "token-3")?;
        assert_eq!(tx.get_bootstrap_token("public")?.as_deref(), Some("token-3"));
        assert_eq!(tx.get_bootstrap_token("admin")?.as_deref(), Some("token-2"));
        Ok(())
    })
    .unwrap();
}

fn test_sources(db: &Database) {
    let sources = [
        SourceRecord {
            name: String::from("wiki"),
            url: String::from("https://wiki.example.com"),
            group: String::from("public"),
            create_time: 10,
        },
        SourceRecord {
            name: String::from("crm"),
            url: String::from("https://crm.example.com"),
            group: String::from("us-sales"),
            create_time: 20,
        },
    ];

    db.with_transaction(|tx| {
        for source in sources.iter() {
            tx.create_source(source)?;
        }
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        assert!(tx.has_source("wiki")?);
        assert!(!tx.has_source("none")?);
        assert!(tx.create_source(&sources[0]).is_err());

        let list = tx.list_sources(&[String::from("public")])?;
        assert_eq!(list, vec![sources[0].clone()]);

        let list = tx.list_sources(&[String::from("public"), String::from("us-sales")])?;
        assert_eq!(list, vec![sources[1].clone(), sources[0].clone()]);

        assert!(tx.list_sources(&[])?.is_empty());
        Ok(())
    })
    .unwrap();
}

fn test_rollback(db: &Database) {
    let result: Result<()> = db.with_transaction(|tx| {
        tx.create_group(&GroupRecord {
            name: String::from("rollback"),
            description: None,
            reserved: false,
            create_time: 1,
            update_time: 1,
        })
        .unwrap();

        bail!("rollback");
    });
    assert!(result.is_err());

    db.with_transaction(|tx| {
        assert!(tx.get_group("rollback")?.is_none());
        Ok(())
    })
    .unwrap();
}
