// tests/mapping_scenarios.rs

//! End-to-end mapping workflows against an imported compose.

mod common;

use common::{COMPOSE, RELEASE, change_json, setup_imported_db};
use rpmmap::audit::{ChangesetRecorder, MemoryAudit};
use rpmmap::db::models::{ChangeRecord, Changeset, OverrideRule, Release};
use rpmmap::mapping::{
    ChangeAction, EntryKey, MappingRequest, MappingService, Provenance, PureMapping,
};
use rpmmap::{Error, ErrorKind};
use serde_json::{Value, json};

fn request(package: &str) -> MappingRequest<'_> {
    MappingRequest::new(COMPOSE, package)
}

fn key(arch: &str, rpm_name: &str, rpm_arch: &str) -> EntryKey {
    EntryKey::new("Server", arch, rpm_name, rpm_arch)
}

fn pure_json(mapping: &PureMapping) -> Value {
    serde_json::to_value(mapping).unwrap()
}

#[test]
fn test_raw_mapping_of_imported_compose() {
    let (_temp, _path, conn) = setup_imported_db();
    let service = MappingService::default();

    let bash = service.get(&conn, request("bash"), true).unwrap();
    assert_eq!(
        pure_json(&bash),
        json!({"Server": {
            "s390x": {"bash": ["s390x"], "bash-doc": ["noarch"]},
            "x86_64": {"bash": ["src", "x86_64"]}
        }})
    );

    // Overrides disabled or not, nothing differs until rules exist
    assert_eq!(service.get(&conn, request("bash"), false).unwrap(), bash);
    assert!(service.get(&conn, request("zsh"), false).unwrap().is_empty());
}

#[test]
fn test_unknown_compose_and_release() {
    let (_temp, _path, conn) = setup_imported_db();
    let service = MappingService::default();

    let err = service
        .get(&conn, MappingRequest::new("RHEL-9.4-20991231.0", "bash"), false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service
        .get(&conn, request("bash").with_release(Some("fedora-40")), false)
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn test_create_then_enable() {
    let (_temp, _path, mut conn) = setup_imported_db();
    let service = MappingService::default();
    let mut audit = MemoryAudit::new();

    let mut target = service.get(&conn, request("bash"), false).unwrap();
    target.insert(&key("x86_64", "bash-doc", "noarch"));
    let target = pure_json(&target);

    let changes = service
        .put(&mut conn, request("bash"), &target, false, &mut audit)
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].action, ChangeAction::Create);
    assert_eq!(changes[0].key(), key("x86_64", "bash-doc", "noarch"));
    assert_eq!(changes[0].include, Some(true));
    assert_eq!(changes[0].release, RELEASE);
    assert!(audit.records.is_empty(), "dry run must not write");

    service
        .put(&mut conn, request("bash"), &target, true, &mut audit)
        .unwrap();
    let detail = service.detail(&conn, request("bash"), false).unwrap();
    assert_eq!(
        detail.mapping.get(&key("x86_64", "bash-doc", "noarch")),
        Some(Provenance::Created)
    );
    assert_eq!(audit.records.len(), 1);
    assert!(audit.records[0].before.is_none());
}

#[test]
fn test_suppress_original() {
    let (_temp, _path, mut conn) = setup_imported_db();
    let service = MappingService::default();
    let mut audit = MemoryAudit::new();

    let target = json!({"Server": {"x86_64": {"sendmail": ["src"]}}});
    let changes = service
        .put(&mut conn, request("sendmail"), &target, true, &mut audit)
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].action, ChangeAction::Create);
    assert_eq!(changes[0].key(), key("x86_64", "sendmail", "x86_64"));
    assert_eq!(changes[0].include, Some(false));

    let detail = service.detail(&conn, request("sendmail"), false).unwrap();
    let entry = detail
        .mapping
        .entries()
        .into_iter()
        .find(|e| e.key() == &key("x86_64", "sendmail", "x86_64"))
        .unwrap();
    assert!(!entry.included());
    assert_eq!(entry.provenance(), Provenance::Deleted);
    assert_eq!(pure_json(&detail.mapping.to_pure()), target);
}

#[test]
fn test_do_not_delete_retention() {
    let (_temp, _path, mut conn) = setup_imported_db();
    let service = MappingService::default();
    let mut audit = MemoryAudit::new();

    let mut protected = change_json("create", "x86_64", "bash", "i686", Some(false));
    protected["do_not_delete"] = json!(true);
    let unprotected = change_json("create", "x86_64", "bash", "ppc64le", Some(false));
    service
        .patch(&mut conn, request("bash"), &json!([protected, unprotected]), &mut audit)
        .unwrap();

    let release = Release::get(&conn, RELEASE).unwrap();
    assert_eq!(OverrideRule::list_for_release(&conn, &release, Some("bash")).unwrap().len(), 2);

    // Reads without cleanup leave storage alone
    let read_only = MappingService::new(false);
    read_only.get(&conn, request("bash"), false).unwrap();
    assert_eq!(OverrideRule::list_for_release(&conn, &release, Some("bash")).unwrap().len(), 2);

    let detail = service.detail(&conn, request("bash"), false).unwrap();
    assert_eq!(detail.useless_overrides.len(), 1);
    assert_eq!(detail.useless_overrides[0].rpm_arch, "i686");

    let remaining = OverrideRule::list_for_release(&conn, &release, Some("bash")).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].rpm_arch, "i686");
    assert!(remaining[0].do_not_delete);

    let exported = serde_json::to_value(&detail).unwrap();
    assert_eq!(exported["useless_overrides"][0]["rpm_arch"], "i686");
}

#[test]
fn test_reinclude_after_delete_override() {
    let (_temp, _path, mut conn) = setup_imported_db();
    let service = MappingService::default();
    let mut audit = MemoryAudit::new();

    let suppressed = json!({"Server": {"x86_64": {"sendmail": ["src"]}}});
    service
        .put(&mut conn, request("sendmail"), &suppressed, true, &mut audit)
        .unwrap();

    let original = json!({"Server": {"x86_64": {"sendmail": ["src", "x86_64"]}}});
    let changes = service
        .put(&mut conn, request("sendmail"), &original, true, &mut audit)
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].action, ChangeAction::Delete);
    assert_eq!(changes[0].include, Some(false));

    let release = Release::get(&conn, RELEASE).unwrap();
    assert!(OverrideRule::list_for_release(&conn, &release, None).unwrap().is_empty());
    let detail = service.detail(&conn, request("sendmail"), false).unwrap();
    assert!(detail.mapping.iter().all(|(_, p)| p == Provenance::Original));
}

#[test]
fn test_put_rejects_undeclared_variant_arch() {
    let (_temp, _path, mut conn) = setup_imported_db();
    let service = MappingService::default();
    let mut audit = MemoryAudit::new();

    let target = json!({"Server": {"aarch64": {"bash": ["aarch64"]}}});
    let err = service
        .put(&mut conn, request("bash"), &target, true, &mut audit)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownReferenceError(_)));
    assert!(err.to_string().contains("Server.aarch64"));

    let err = service
        .put(&mut conn, request("bash"), &json!({"Server": []}), true, &mut audit)
        .unwrap_err();
    assert!(matches!(err, Error::MalformedInputError(_)));
    assert!(audit.records.is_empty());
}

#[test]
fn test_put_ignores_empty_undeclared_buckets() {
    let (_temp, _path, mut conn) = setup_imported_db();
    let service = MappingService::default();
    let mut audit = MemoryAudit::new();

    let mut target = pure_json(&service.get(&conn, request("bash"), false).unwrap());
    target["Client"] = json!({"x86_64": {}});
    target["Server"]["aarch64"] = json!({"bash": []});

    let changes = service
        .put(&mut conn, request("bash"), &target, true, &mut audit)
        .unwrap();
    assert!(changes.is_empty());
    assert!(audit.records.is_empty());

    target["Client"]["x86_64"] = json!({"bash": ["x86_64"]});
    let err = service
        .put(&mut conn, request("bash"), &target, false, &mut audit)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownReferenceError(_)));
    assert!(err.to_string().contains("Client.x86_64"));
    assert!(!err.to_string().contains("Server.aarch64"));
}

#[test]
fn test_patch_validates_whole_payload_first() {
    let (_temp, _path, mut conn) = setup_imported_db();
    let service = MappingService::default();
    let mut audit = MemoryAudit::new();
    let release = Release::get(&conn, RELEASE).unwrap();

    let good = change_json("create", "x86_64", "bash-doc", "noarch", Some(true));
    let bad = change_json("create", "x86_64", "bash", "i686", None);
    let err = service
        .patch(&mut conn, request("bash"), &json!([good.clone(), bad]), &mut audit)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Client);
    assert!(OverrideRule::list_for_release(&conn, &release, None).unwrap().is_empty());

    let undeclared = change_json("create", "aarch64", "bash", "aarch64", Some(true));
    let err = service
        .patch(&mut conn, request("bash"), &json!([good, undeclared]), &mut audit)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownReferenceError(_)));
    assert!(OverrideRule::list_for_release(&conn, &release, None).unwrap().is_empty());
    assert!(audit.records.is_empty());
}

#[test]
fn test_patch_delete_with_do_not_delete_flips_rule() {
    let (_temp, _path, mut conn) = setup_imported_db();
    let service = MappingService::default();
    let mut audit = MemoryAudit::new();
    let release = Release::get(&conn, RELEASE).unwrap();

    let create = change_json("create", "x86_64", "bash-doc", "noarch", Some(true));
    service
        .patch(&mut conn, request("bash"), &json!([create]), &mut audit)
        .unwrap();

    let mut delete = change_json("delete", "x86_64", "bash-doc", "noarch", None);
    delete["do_not_delete"] = json!(true);
    delete["comment"] = json!("keep excluded");
    let applied = service
        .patch(&mut conn, request("bash"), &json!([delete]), &mut audit)
        .unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].before.as_ref().unwrap()["include"], true);
    assert_eq!(applied[0].after.as_ref().unwrap()["include"], false);

    let rules = OverrideRule::list_for_release(&conn, &release, Some("bash")).unwrap();
    assert_eq!(rules.len(), 1);
    assert!(!rules[0].include);
    assert!(rules[0].do_not_delete);
    assert_eq!(rules[0].comment, "keep excluded");

    // Excluding a package the compose never shipped has no effect; the
    // rule survives because it is protected
    let detail = service.detail(&conn, request("bash"), false).unwrap();
    assert_eq!(detail.useless_overrides.len(), 1);
}

#[test]
fn test_changes_are_audited_in_changesets() {
    let (_temp, _path, mut conn) = setup_imported_db();
    let service = MappingService::default();

    let mut recorder = ChangesetRecorder::new("releng", Some("drop sendmail".to_string()));
    let target = json!({"Server": {"x86_64": {"sendmail": ["src"]}}});
    service
        .put(&mut conn, request("sendmail"), &target, true, &mut recorder)
        .unwrap();

    let id = recorder.changeset_id().unwrap();
    let changeset = Changeset::find_by_id(&conn, id).unwrap().unwrap();
    assert_eq!(changeset.author, "releng");
    assert_eq!(changeset.comment.as_deref(), Some("drop sendmail"));

    let records = ChangeRecord::for_changeset(&conn, id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].target_class, "OverrideRPM");
    assert_eq!(records[0].old_value, "null");
    let after: Value = serde_json::from_str(&records[0].new_value).unwrap();
    assert_eq!(after["rpm_name"], "sendmail");
    assert_eq!(after["include"], false);

    // A no-op PUT opens no changeset
    let mut idle = ChangesetRecorder::new("releng", None);
    let changes = service
        .put(&mut conn, request("sendmail"), &target, true, &mut idle)
        .unwrap();
    assert!(changes.is_empty());
    assert!(idle.changeset_id().is_none());
}

#[test]
fn test_clear_overrides_respects_protection() {
    let (_temp, _path, mut conn) = setup_imported_db();
    let service = MappingService::default();
    let mut audit = MemoryAudit::new();
    let release = Release::get(&conn, RELEASE).unwrap();

    let mut protected = change_json("create", "x86_64", "bash-doc", "noarch", Some(true));
    protected["do_not_delete"] = json!(true);
    let plain = change_json("create", "s390x", "bash", "s390x", Some(false));
    service
        .patch(&mut conn, request("bash"), &json!([protected, plain]), &mut audit)
        .unwrap();

    let mut audit = MemoryAudit::new();
    let cleared = rpmmap::mapping::clear_overrides(&mut conn, &release, false, &mut audit).unwrap();
    assert_eq!(cleared.len(), 1);
    assert_eq!(cleared[0].rpm_name, "bash");
    assert!(audit.records[0].after.is_none());

    let cleared = rpmmap::mapping::clear_overrides(&mut conn, &release, true, &mut audit).unwrap();
    assert_eq!(cleared.len(), 1);
    assert!(OverrideRule::list_for_release(&conn, &release, None).unwrap().is_empty());
}
