// tests/concurrency.rs

//! Concurrent writers on one database file, one connection per thread.

mod common;

use common::{COMPOSE, RELEASE, change_json, create_release, manifest, setup_empty_db};
use rpmmap::audit::MemoryAudit;
use rpmmap::db;
use rpmmap::db::models::{Compose, OverrideRule, Release, Rpm};
use rpmmap::import::import_rpms;
use rpmmap::mapping::{MappingRequest, MappingService};
use rpmmap::nevra::Nevra;
use serde_json::json;
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

/// Run `f` on `THREADS` threads released together, collecting results
fn race<T, F>(db_path: &str, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(&mut rusqlite::Connection) -> T + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(THREADS));
    let f = Arc::new(f);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let f = Arc::clone(&f);
            let db_path = db_path.to_string();
            thread::spawn(move || {
                let mut conn = db::open(&db_path).unwrap();
                barrier.wait();
                f(&mut conn)
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn test_concurrent_upserts_store_one_row() {
    let (_temp, db_path) = setup_empty_db();

    let ids = race(&db_path, |conn| {
        let nevra: Nevra = "bash-0:5.2.26-3.el9.x86_64".parse().unwrap();
        let srpm: Nevra = "bash-0:5.2.26-3.el9.src".parse().unwrap();
        let rpm = Rpm::from_nevra(&nevra, Some(&srpm), nevra.filename()).unwrap();
        db::transaction(conn, |tx| db::upsert(tx, &rpm)).unwrap()
    });

    assert!(ids.iter().all(|id| *id == ids[0]));
    let conn = db::open(&db_path).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM rpms WHERE name = 'bash'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn test_concurrent_imports_of_one_compose() {
    let (_temp, db_path) = setup_empty_db();
    create_release(&mut db::open(&db_path).unwrap());

    let summaries = race(&db_path, |conn| {
        import_rpms(conn, RELEASE, &manifest(), &mut MemoryAudit::new()).unwrap()
    });

    assert_eq!(summaries.iter().filter(|s| s.compose_created).count(), 1);
    assert!(summaries.iter().all(|s| s.linked_rpms == 6));
    assert_eq!(summaries.iter().map(|s| s.new_links).sum::<usize>(), 6);
    assert_eq!(summaries.iter().filter(|s| s.changed()).count(), 1);

    let conn = db::open(&db_path).unwrap();
    let compose = Compose::get(&conn, COMPOSE).unwrap();
    assert_eq!(compose.rpm_count(&conn).unwrap(), 6);
    assert_eq!(compose.variants(&conn).unwrap().len(), 1);
    assert_eq!(Rpm::find_by_srpm_name(&conn, "bash").unwrap().len(), 4);
}

#[test]
fn test_concurrent_patches_of_one_rule() {
    let (_temp, db_path) = setup_empty_db();
    {
        let mut conn = db::open(&db_path).unwrap();
        create_release(&mut conn);
        import_rpms(&mut conn, RELEASE, &manifest(), &mut MemoryAudit::new()).unwrap();
    }

    let results = race(&db_path, |conn| {
        let payload = json!([change_json("create", "x86_64", "bash-doc", "noarch", Some(true))]);
        MappingService::default()
            .patch(
                conn,
                MappingRequest::new(COMPOSE, "bash"),
                &payload,
                &mut MemoryAudit::new(),
            )
            .map(|applied| applied[0].before.is_none())
    });

    let created = results.iter().filter(|r| matches!(r, Ok(true))).count();
    assert_eq!(created, 1);
    assert!(results.iter().all(|r| r.is_ok()));

    let conn = db::open(&db_path).unwrap();
    let release = Release::get(&conn, RELEASE).unwrap();
    let rules = OverrideRule::list_for_release(&conn, &release, None).unwrap();
    assert_eq!(rules.len(), 1);
    assert!(rules[0].include);
}
