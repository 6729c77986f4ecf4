// src/mapping/validate.rs

//! Turning client payloads into typed changes and targets
//!
//! Everything here runs before any database access. Shape problems are
//! collected per item and field and reported together as
//! [`Error::MalformedInputError`].

use super::{Change, ChangeAction, EntryKey, PureMapping, TargetMapping, VariantArchKey};
use crate::error::{Error, FieldError, FieldErrors, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Fields a change object may carry
const CHANGE_FIELDS: &[&str] = &[
    "action",
    "release_id",
    "variant",
    "arch",
    "srpm_name",
    "rpm_name",
    "rpm_arch",
    "include",
    "comment",
    "do_not_delete",
];

/// Parse a PATCH payload into changes for `release_id`
///
/// Each object needs `action`, `variant`, `arch`, `srpm_name`,
/// `rpm_name`, `rpm_arch`, `comment` and `do_not_delete`. `include` is
/// required for create and rejected for delete. An optional `release_id`
/// must name the release being patched.
pub fn parse_changes(payload: &Value, release_id: &str) -> Result<Vec<Change>> {
    let items = payload.as_array().ok_or_else(|| {
        Error::malformed(None, "Expected a list of changes")
    })?;

    let mut errors = FieldErrors::default();
    let mut changes = Vec::with_capacity(items.len());
    let mut foreign_releases = BTreeSet::new();

    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            errors.push(FieldError::new(Some(index), None, "Expected an object"));
            continue;
        };
        let mut fields = ItemFields {
            object,
            index,
            errors: &mut errors,
        };

        fields.reject_unknown();
        let action = fields.string("action", false).and_then(|action| {
            action
                .parse::<ChangeAction>()
                .map_err(|e| fields.error("action", e))
                .ok()
        });
        let variant = fields.string("variant", false);
        let arch = fields.string("arch", false);
        let srpm_name = fields.string("srpm_name", false);
        let rpm_name = fields.string("rpm_name", false);
        let rpm_arch = fields.string("rpm_arch", false);
        let comment = fields.string("comment", true);
        let do_not_delete = fields.boolean("do_not_delete");

        let include = match action {
            Some(ChangeAction::Create) => fields.boolean("include"),
            Some(ChangeAction::Delete) => {
                if object.contains_key("include") {
                    fields.error("include", "This field is not allowed for delete");
                }
                None
            }
            None => None,
        };

        if let Some(value) = object.get("release_id") {
            match value.as_str() {
                Some(other) if other != release_id => {
                    foreign_releases.insert(other.to_string());
                }
                Some(_) => {}
                None => fields.error("release_id", "Expected a string"),
            }
        }

        if let (
            Some(action),
            Some(variant),
            Some(arch),
            Some(srpm_name),
            Some(rpm_name),
            Some(rpm_arch),
            Some(comment),
            Some(do_not_delete),
        ) = (
            action,
            variant,
            arch,
            srpm_name,
            rpm_name,
            rpm_arch,
            comment,
            do_not_delete,
        ) {
            if action == ChangeAction::Create && include.is_none() {
                continue;
            }
            changes.push(Change {
                release: release_id.to_string(),
                srpm_name,
                action,
                variant,
                arch,
                rpm_name,
                rpm_arch,
                include,
                comment,
                do_not_delete,
            });
        }
    }

    if !errors.is_empty() {
        return Err(Error::MalformedInputError(errors));
    }
    if !foreign_releases.is_empty() {
        let names: Vec<String> = foreign_releases.into_iter().collect();
        return Err(Error::UnknownReferenceError(format!(
            "release {} (changes apply to {release_id})",
            names.join(", ")
        )));
    }
    Ok(changes)
}

/// Parse a PUT payload into a target mapping
///
/// The payload must be `{variant: {arch: {rpm_name: [rpm_arch]}}}` with
/// string leaves.
pub fn parse_target(payload: &Value) -> Result<TargetMapping> {
    let variants = payload.as_object().ok_or_else(|| {
        Error::malformed(None, "Expected an object of variants")
    })?;

    let mut errors = FieldErrors::default();
    let mut target = PureMapping::new();

    for (variant, arches) in variants {
        let Some(arches) = arches.as_object() else {
            errors.push(FieldError::new(None, Some(variant.as_str()), "Expected an object of arches"));
            continue;
        };
        for (arch, names) in arches {
            let path = format!("{variant}.{arch}");
            let Some(names) = names.as_object() else {
                errors.push(FieldError::new(None, Some(path.as_str()), "Expected an object of RPM names"));
                continue;
            };
            for (rpm_name, rpm_arches) in names {
                let path = format!("{variant}.{arch}.{rpm_name}");
                let Some(rpm_arches) = rpm_arches.as_array() else {
                    errors.push(FieldError::new(None, Some(path.as_str()), "Expected a list of arches"));
                    continue;
                };
                for (j, rpm_arch) in rpm_arches.iter().enumerate() {
                    match rpm_arch.as_str() {
                        Some(rpm_arch) if !rpm_arch.is_empty() => target.insert(
                            &EntryKey::new(variant, arch, rpm_name, rpm_arch),
                        ),
                        _ => errors.push(FieldError::new(
                            None,
                            Some(format!("{path}[{j}]").as_str()),
                            "Expected a non-empty string",
                        )),
                    }
                }
            }
        }
    }

    if !errors.is_empty() {
        return Err(Error::MalformedInputError(errors));
    }
    Ok(target)
}

/// Reject variant/arch pairs the release does not declare
pub fn check_references<I>(topology: &BTreeSet<VariantArchKey>, pairs: I) -> Result<()>
where
    I: IntoIterator<Item = VariantArchKey>,
{
    let unknown: BTreeSet<VariantArchKey> = pairs
        .into_iter()
        .filter(|pair| !topology.contains(pair))
        .collect();

    if unknown.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = unknown.iter().map(|p| p.to_string()).collect();
    Err(Error::UnknownReferenceError(format!(
        "variant/arch {} not in release",
        names.join(", ")
    )))
}

/// Field accessor for one change object that records problems as it goes
struct ItemFields<'a> {
    object: &'a Map<String, Value>,
    index: usize,
    errors: &'a mut FieldErrors,
}

impl ItemFields<'_> {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .push(FieldError::new(Some(self.index), Some(field), message));
    }

    fn reject_unknown(&mut self) {
        let unknown: Vec<String> = self
            .object
            .keys()
            .filter(|key| !CHANGE_FIELDS.contains(&key.as_str()))
            .cloned()
            .collect();
        for key in unknown {
            self.error(&key, "Unknown field");
        }
    }

    fn string(&mut self, field: &str, allow_blank: bool) -> Option<String> {
        match self.object.get(field) {
            None => {
                self.error(field, "This field is required");
                None
            }
            Some(Value::String(s)) if s.is_empty() && !allow_blank => {
                self.error(field, "This field may not be blank");
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.error(field, "Expected a string");
                None
            }
        }
    }

    fn boolean(&mut self, field: &str) -> Option<bool> {
        match self.object.get(field) {
            None => {
                self.error(field, "This field is required");
                None
            }
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                self.error(field, "Expected a boolean");
                None
            }
        }
    }
}
