// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use rpmmap::audit::MemoryAudit;
use rpmmap::db;
use rpmmap::db::IdCache;
use rpmmap::db::models::{Release, ReleaseVariant};
use rpmmap::import::{ComposeManifest, import_rpms};
use rusqlite::Connection;
use serde_json::{Value, json};
use tempfile::TempDir;

pub const RELEASE: &str = "rhel-9.4";
pub const COMPOSE: &str = "RHEL-9.4-20240101.0";

/// Create an empty, migrated database.
///
/// Returns (TempDir, db_path) - keep the TempDir alive to prevent cleanup.
pub fn setup_empty_db() -> (TempDir, String) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_str()
        .unwrap()
        .to_string();

    db::init(&db_path).unwrap();
    (temp_dir, db_path)
}

/// Declare release `rhel-9.4` with Server on x86_64 and s390x.
pub fn create_release(conn: &mut Connection) -> Release {
    db::transaction(conn, |tx| {
        let mut release = Release::from_release_id(RELEASE);
        release.insert(tx)?;

        let mut server = ReleaseVariant::new(release.pk()?, "Server".to_string());
        server.save(tx)?;
        let mut cache = IdCache::new();
        server.add_arch(tx, &mut cache, "x86_64")?;
        server.add_arch(tx, &mut cache, "s390x")?;
        Ok(release)
    })
    .unwrap()
}

fn rpm(path: &str, category: &str) -> Value {
    json!({"path": path, "sigkey": "fd431d51", "category": category})
}

/// Manifest of compose `RHEL-9.4-20240101.0`.
///
/// - Server.x86_64: bash.src, bash.x86_64, sendmail.src, sendmail.x86_64
/// - Server.s390x: bash.s390x, bash-doc.noarch
pub fn manifest() -> ComposeManifest {
    serde_json::from_value(json!({
        "compose": {"id": COMPOSE, "date": "20240101", "type": "production", "respin": 0},
        "variants": [{"uid": "Server", "id": "Server", "name": "Server",
                      "type": "variant", "arches": ["x86_64", "s390x"]}],
        "rpms": {"Server": {
            "x86_64": {
                "bash-0:5.2.26-3.el9.src": {
                    "bash-0:5.2.26-3.el9.src":
                        rpm("Server/source/tree/Packages/b/bash-5.2.26-3.el9.src.rpm", "source"),
                    "bash-0:5.2.26-3.el9.x86_64":
                        rpm("Server/x86_64/os/Packages/b/bash-5.2.26-3.el9.x86_64.rpm", "binary")
                },
                "sendmail-0:8.16.1-11.el9.src": {
                    "sendmail-0:8.16.1-11.el9.src":
                        rpm("Server/source/tree/Packages/s/sendmail-8.16.1-11.el9.src.rpm", "source"),
                    "sendmail-0:8.16.1-11.el9.x86_64":
                        rpm("Server/x86_64/os/Packages/s/sendmail-8.16.1-11.el9.x86_64.rpm", "binary")
                }
            },
            "s390x": {
                "bash-0:5.2.26-3.el9.src": {
                    "bash-0:5.2.26-3.el9.s390x":
                        rpm("Server/s390x/os/Packages/b/bash-5.2.26-3.el9.s390x.rpm", "binary"),
                    "bash-doc-0:5.2.26-3.el9.noarch":
                        rpm("Server/s390x/os/Packages/b/bash-doc-5.2.26-3.el9.noarch.rpm", "binary")
                }
            }
        }}
    }))
    .unwrap()
}

/// Database with the release declared and the compose imported.
pub fn setup_imported_db() -> (TempDir, String, Connection) {
    let (temp_dir, db_path) = setup_empty_db();
    let mut conn = db::open(&db_path).unwrap();
    create_release(&mut conn);
    import_rpms(&mut conn, RELEASE, &manifest(), &mut MemoryAudit::new()).unwrap();
    (temp_dir, db_path, conn)
}

/// A PATCH change object with the given action and include flag.
pub fn change_json(action: &str, arch: &str, rpm_name: &str, rpm_arch: &str, include: Option<bool>) -> Value {
    let mut change = json!({
        "action": action,
        "variant": "Server",
        "arch": arch,
        "srpm_name": "bash",
        "rpm_name": rpm_name,
        "rpm_arch": rpm_arch,
        "comment": "",
        "do_not_delete": false
    });
    if let Some(include) = include {
        change["include"] = json!(include);
    }
    change
}
