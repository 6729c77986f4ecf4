// src/db/migrations.rs
//! Database migration implementations
//!
//! Each function creates the tables of one schema version. They are run in
//! order by [`super::schema::migrate`].

use crate::error::Result;
use rusqlite::Connection;
use tracing::debug;

/// Initial schema - Version 1
///
/// Release topology and imported compose contents:
/// - releases / release_variants / release_variant_arches: current layout
/// - composes / compose_variants / compose_variant_arches: per-compose layout
/// - rpms: immutable RPM identities keyed by NEVRA
/// - paths, sigkeys, content_categories: interned lookup values
/// - compose_rpms: which RPM sits at which compose variant/arch
pub fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE releases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_id TEXT NOT NULL UNIQUE,
            short TEXT NOT NULL,
            version TEXT NOT NULL,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE arches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE release_variants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_id INTEGER NOT NULL,
            variant_uid TEXT NOT NULL,
            variant_id TEXT NOT NULL,
            variant_name TEXT NOT NULL,
            variant_type TEXT NOT NULL DEFAULT 'variant',
            UNIQUE(release_id, variant_uid),
            FOREIGN KEY (release_id) REFERENCES releases(id) ON DELETE CASCADE
        );

        CREATE TABLE release_variant_arches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variant_id INTEGER NOT NULL,
            arch_id INTEGER NOT NULL,
            UNIQUE(variant_id, arch_id),
            FOREIGN KEY (variant_id) REFERENCES release_variants(id) ON DELETE CASCADE,
            FOREIGN KEY (arch_id) REFERENCES arches(id)
        );

        CREATE TABLE composes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            compose_id TEXT NOT NULL UNIQUE,
            release_id INTEGER NOT NULL,
            compose_date TEXT NOT NULL,
            compose_type TEXT NOT NULL,
            compose_respin INTEGER NOT NULL DEFAULT 0,
            compose_label TEXT,
            imported_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (release_id) REFERENCES releases(id)
        );

        CREATE INDEX idx_composes_release ON composes(release_id);

        CREATE TABLE compose_variants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            compose_id INTEGER NOT NULL,
            variant_uid TEXT NOT NULL,
            variant_id TEXT NOT NULL,
            variant_name TEXT NOT NULL,
            variant_type TEXT NOT NULL DEFAULT 'variant',
            UNIQUE(compose_id, variant_uid),
            FOREIGN KEY (compose_id) REFERENCES composes(id) ON DELETE CASCADE
        );

        CREATE TABLE compose_variant_arches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variant_id INTEGER NOT NULL,
            arch_id INTEGER NOT NULL,
            UNIQUE(variant_id, arch_id),
            FOREIGN KEY (variant_id) REFERENCES compose_variants(id) ON DELETE CASCADE,
            FOREIGN KEY (arch_id) REFERENCES arches(id)
        );

        CREATE TABLE rpms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            epoch INTEGER NOT NULL DEFAULT 0,
            version TEXT NOT NULL,
            release TEXT NOT NULL,
            arch TEXT NOT NULL,
            srpm_name TEXT NOT NULL,
            srpm_nevra TEXT,
            filename TEXT NOT NULL,
            UNIQUE(name, epoch, version, release, arch)
        );

        CREATE INDEX idx_rpms_name ON rpms(name);
        CREATE INDEX idx_rpms_srpm_name ON rpms(srpm_name);

        CREATE TABLE paths (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE
        );

        CREATE TABLE sigkeys (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key_id TEXT NOT NULL UNIQUE
        );

        CREATE TABLE content_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE compose_rpms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variant_arch_id INTEGER NOT NULL,
            rpm_id INTEGER NOT NULL,
            sigkey_id INTEGER,
            content_category_id INTEGER NOT NULL,
            path_id INTEGER NOT NULL,
            UNIQUE(variant_arch_id, rpm_id),
            FOREIGN KEY (variant_arch_id) REFERENCES compose_variant_arches(id) ON DELETE CASCADE,
            FOREIGN KEY (rpm_id) REFERENCES rpms(id),
            FOREIGN KEY (sigkey_id) REFERENCES sigkeys(id),
            FOREIGN KEY (content_category_id) REFERENCES content_categories(id),
            FOREIGN KEY (path_id) REFERENCES paths(id)
        );

        CREATE INDEX idx_compose_rpms_rpm ON compose_rpms(rpm_id);
        ",
    )?;

    debug!("Schema version 1 created successfully");
    Ok(())
}

/// Version 2: override rules and the audit log
///
/// - override_rpms: release-scoped include/exclude rules
/// - changesets / changes: before/after records of every mutation
pub fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE override_rpms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_id INTEGER NOT NULL,
            variant TEXT NOT NULL,
            arch TEXT NOT NULL,
            srpm_name TEXT NOT NULL,
            rpm_name TEXT NOT NULL,
            rpm_arch TEXT NOT NULL,
            include INTEGER NOT NULL DEFAULT 1,
            comment TEXT NOT NULL DEFAULT '',
            do_not_delete INTEGER NOT NULL DEFAULT 0,
            UNIQUE(release_id, variant, arch, rpm_name, rpm_arch),
            FOREIGN KEY (release_id) REFERENCES releases(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_override_rpms_srpm ON override_rpms(release_id, srpm_name);

        CREATE TABLE changesets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author TEXT NOT NULL,
            comment TEXT,
            committed_on TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            changeset_id INTEGER NOT NULL,
            target_class TEXT NOT NULL,
            target_id INTEGER NOT NULL,
            old_value TEXT NOT NULL,
            new_value TEXT NOT NULL,
            FOREIGN KEY (changeset_id) REFERENCES changesets(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_changes_changeset ON changes(changeset_id);
        CREATE INDEX idx_changes_target ON changes(target_class, target_id);
        ",
    )?;

    debug!("Schema version 2 created successfully");
    Ok(())
}
