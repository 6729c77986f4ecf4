// src/mapping/reconcile.rs

//! Layering override rules over a raw mapping
//!
//! [`reconcile`] is pure. Rules that turn out to have no effect are split
//! into two groups: protected ones (`do_not_delete`) are reported as
//! useless and kept, unprotected ones are reported as stale. Removing
//! stale rules from storage is a separate, explicit step,
//! [`cleanup_stale`], so read-only callers can skip it.

use super::{EffectiveMapping, EntryKey, Provenance, RawMapping};
use crate::db::models::OverrideRule;
use rusqlite::Connection;
use tracing::{debug, info, warn};

/// Outcome of layering override rules over a raw mapping
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub mapping: EffectiveMapping,
    /// Ineffective rules protected by `do_not_delete`
    pub useless: Vec<OverrideRule>,
    /// Ineffective rules that may be removed
    pub stale: Vec<OverrideRule>,
}

/// Apply `overrides` to a copy of `raw`
///
/// Each rule only ever touches the entry with its own key, and keys are
/// unique per release, so the result does not depend on rule order.
pub fn reconcile(raw: &RawMapping, overrides: &[OverrideRule]) -> Reconciliation {
    let mut result = Reconciliation {
        mapping: raw.clone(),
        ..Default::default()
    };

    for rule in overrides {
        let key = EntryKey::new(
            rule.variant.as_str(),
            rule.arch.as_str(),
            rule.rpm_name.as_str(),
            rule.rpm_arch.as_str(),
        );

        let effective = match (result.mapping.get(&key), rule.include) {
            (Some(_), false) => {
                result.mapping.set(key, Provenance::Deleted);
                true
            }
            (None, true) => {
                result.mapping.set(key, Provenance::Created);
                true
            }
            // Including what is already there, or excluding what is not
            (Some(_), true) | (None, false) => false,
        };

        if effective {
            continue;
        }

        if rule.do_not_delete {
            debug!("Override {} has no effect, kept as do_not_delete", rule);
            result.useless.push(rule.clone());
        } else {
            debug!("Override {} has no effect", rule);
            result.stale.push(rule.clone());
        }
    }

    result
}

/// Delete stale rules found by [`reconcile`]
///
/// A rule that cannot be deleted is left in place for a later pass.
/// Returns the number of rules removed.
pub fn cleanup_stale(conn: &Connection, stale: &[OverrideRule]) -> usize {
    let mut removed = 0;
    for rule in stale {
        match rule.delete(conn) {
            Ok(()) => {
                info!("Deleted ineffective override {}", rule);
                removed += 1;
            }
            Err(e) => warn!("Could not delete ineffective override {}: {}", rule, e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Release;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn rule(rpm_name: &str, rpm_arch: &str, include: bool, do_not_delete: bool) -> OverrideRule {
        OverrideRule {
            id: None,
            release_pk: 1,
            release_id: "rhel-9.4".to_string(),
            variant: "Server".to_string(),
            arch: "x86_64".to_string(),
            srpm_name: "bash".to_string(),
            rpm_name: rpm_name.to_string(),
            rpm_arch: rpm_arch.to_string(),
            include,
            comment: String::new(),
            do_not_delete,
        }
    }

    fn raw() -> RawMapping {
        let mut raw = RawMapping::new();
        raw.add_original(EntryKey::new("Server", "x86_64", "bash", "x86_64"));
        raw.add_original(EntryKey::new("Server", "x86_64", "bash", "i686"));
        raw
    }

    #[test]
    fn test_exclude_existing_entry() {
        let result = reconcile(&raw(), &[rule("bash", "i686", false, false)]);
        assert_eq!(
            result
                .mapping
                .get(&EntryKey::new("Server", "x86_64", "bash", "i686")),
            Some(Provenance::Deleted)
        );
        assert!(result.useless.is_empty() && result.stale.is_empty());
    }

    #[test]
    fn test_include_new_arch_and_new_name() {
        let result = reconcile(
            &raw(),
            &[
                rule("bash", "ppc64le", true, false),
                rule("bash-doc", "noarch", true, false),
            ],
        );
        assert_eq!(
            result
                .mapping
                .get(&EntryKey::new("Server", "x86_64", "bash", "ppc64le")),
            Some(Provenance::Created)
        );
        assert_eq!(
            result
                .mapping
                .get(&EntryKey::new("Server", "x86_64", "bash-doc", "noarch")),
            Some(Provenance::Created)
        );
        assert_eq!(result.mapping.len(), 4);
    }

    #[test]
    fn test_include_into_unknown_variant_arch() {
        let mut overridden = rule("bash", "aarch64", true, false);
        overridden.arch = "aarch64".to_string();
        let result = reconcile(&raw(), &[overridden]);
        assert_eq!(
            result
                .mapping
                .get(&EntryKey::new("Server", "aarch64", "bash", "aarch64")),
            Some(Provenance::Created)
        );
    }

    #[test]
    fn test_ineffective_rules_are_classified() {
        let result = reconcile(
            &raw(),
            &[
                // redundant include
                rule("bash", "x86_64", true, false),
                // exclude of a missing arch
                rule("bash", "s390x", false, true),
                // exclude of a missing name
                rule("zsh", "x86_64", false, false),
            ],
        );
        assert_eq!(result.mapping, raw());
        assert_eq!(result.useless.len(), 1);
        assert_eq!(result.useless[0].rpm_arch, "s390x");
        let stale: Vec<_> = result.stale.iter().map(|r| r.rpm_name.as_str()).collect();
        assert_eq!(stale, vec!["bash", "zsh"]);
    }

    #[test]
    fn test_cleanup_stale_deletes_rows() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        schema::migrate(&conn).unwrap();

        let mut release = Release::from_release_id("rhel-9.4");
        release.insert(&conn).unwrap();
        let mut stored =
            OverrideRule::new(&release, "Server", "x86_64", "bash", "zsh", "x86_64").unwrap();
        stored.include = false;
        stored.insert(&conn).unwrap();

        // A rule that was never stored cannot be deleted and is skipped
        let unsaved = rule("bash", "s390x", false, false);

        assert_eq!(cleanup_stale(&conn, &[unsaved, stored.clone()]), 1);
        assert!(
            OverrideRule::find_by_id(&conn, stored.id.unwrap())
                .unwrap()
                .is_none()
        );
    }
}
