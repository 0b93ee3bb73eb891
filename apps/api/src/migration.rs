//! Schema version migrator for persisted profile snapshots.
//!
//! Steps are pure `Value -> Value` functions registered under the version
//! they upgrade from, applied one version at a time up to
//! `CURRENT_SCHEMA_VERSION`. Downgrades are refused. The result goes
//! through the same skeleton merge as the extraction pipeline.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::errors::PipelineError;
use crate::extraction::coerce::{coerce, parse_number};
use crate::extraction::merge::merge_onto_skeleton;
use crate::extraction::skills::{partition, Level};
use crate::profile::path::FieldPath;
use crate::profile::schema::{FieldKind, SCHEMA_VERSION_KEY};
use crate::profile::{Profile, CURRENT_SCHEMA_VERSION};

/// Upgrades a document by one version. Paths whose legacy value could not
/// be carried over (in full) are pushed onto the second argument.
pub type MigrationStep = fn(Value, &mut Vec<FieldPath>) -> Value;

/// Keyed by the source version.
const STEPS: &[(u32, MigrationStep)] = &[(1, v1_to_v2), (2, v2_to_v3)];

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(.*?\d.*?)\s*(?:-|–|—|\bto\b|\bbis\b)\s*(.*\d.*?)\s*$")
        .expect("invalid salary range pattern")
});

#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub profile: Profile,
    pub from_version: u32,
    /// Legacy values a step could not carry over, then values that did not
    /// fit the current schema and were defaulted.
    pub dropped: Vec<FieldPath>,
}

/// The snapshot's declared version: an integer or numeric string.
/// Absent or unparsable means version 1.
pub fn declared_version(doc: &Value) -> u32 {
    let declared = match doc.get(SCHEMA_VERSION_KEY) {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    declared.filter(|v| *v >= 1).unwrap_or(1)
}

pub fn step_for(version: u32) -> Option<MigrationStep> {
    STEPS
        .iter()
        .find(|(from, _)| *from == version)
        .map(|(_, step)| *step)
}

/// Runs the step chain. Returns the declared version, the upgraded (not yet
/// merged) document, and the paths the steps could not carry over.
pub fn migrate_document(doc: Value) -> Result<(u32, Value, Vec<FieldPath>), PipelineError> {
    let from = declared_version(&doc);
    if from > CURRENT_SCHEMA_VERSION {
        error!("Refusing to migrate snapshot from future schema v{from}");
        return Err(PipelineError::FutureSchemaVersion {
            found: from,
            current: CURRENT_SCHEMA_VERSION,
        });
    }

    let mut doc = doc;
    let mut lost = Vec::new();
    for version in from..CURRENT_SCHEMA_VERSION {
        match step_for(version) {
            Some(step) => {
                debug!("Migrating snapshot v{version} -> v{}", version + 1);
                doc = step(doc, &mut lost);
            }
            None => debug!("No step registered for v{version}; passing through"),
        }
    }
    Ok((from, doc, lost))
}

pub fn migrate_profile(doc: Value) -> Result<MigrationOutcome, PipelineError> {
    let (from_version, migrated, mut dropped) = migrate_document(doc)?;
    let merged = merge_onto_skeleton(&migrated);
    for path in merged.dropped {
        if !dropped.contains(&path) {
            dropped.push(path);
        }
    }
    for path in &dropped {
        warn!("Dropped {path} while migrating snapshot from v{from_version}");
    }
    let profile = Profile::from_document(merged.document).map_err(|e| {
        error!("Migrated snapshot does not fit the typed profile: {e}");
        PipelineError::UnrecoverableSchema {
            issues: vec![e.to_string()],
        }
    })?;
    info!(
        "Migrated snapshot v{from_version} -> v{CURRENT_SCHEMA_VERSION} ({} value(s) dropped)",
        dropped.len()
    );
    Ok(MigrationOutcome {
        profile,
        from_version,
        dropped,
    })
}

/// v1 → v2: renamed title/city fields, list-shaped responsibilities, and
/// the organisation name split out of `company`.
fn v1_to_v2(mut doc: Value, lost: &mut Vec<FieldPath>) -> Value {
    if !doc.is_object() {
        return doc;
    }
    for (from, to) in [
        ("position.title", "position.job_title"),
        ("location.city", "location.primary_city"),
    ] {
        if !move_field(&mut doc, from, to) {
            lost.push(path(from));
        }
    }

    if let Some(list @ Value::Array(_)) = doc.get("responsibilities").cloned() {
        doc["responsibilities"] = json!({ "items": list });
    }

    let org_name = path("business_context.org_name");
    if org_name.get(&doc).map_or(true, is_blank) {
        if let Some(name) = path("company.name").get(&doc).filter(|v| !is_blank(v)).cloned() {
            org_name.set(&mut doc, name);
        }
    }

    doc[SCHEMA_VERSION_KEY] = json!(2);
    doc
}

/// v2 → v3: salary ranges split into bounds, the remote flag folded into
/// `work_policy`, stage lists counted, and the flat skill list classified.
fn v2_to_v3(mut doc: Value, lost: &mut Vec<FieldPath>) -> Value {
    if !doc.is_object() {
        return doc;
    }

    let range_path = path("compensation.salary_range");
    if let Some(range) = range_path.remove(&mut doc) {
        let bounds = salary_bounds(&range);
        let mut complete = bounds.complete;
        if let Some(min) = bounds.min {
            complete &= fill_if_blank(&mut doc, "compensation.salary_min", json!(min));
        }
        if let Some(max) = bounds.max {
            complete &= fill_if_blank(&mut doc, "compensation.salary_max", json!(max));
        }
        if !complete {
            lost.push(range_path);
        }
    }

    let remote_path = path("employment.remote");
    if let Some(remote) = remote_path.remove(&mut doc) {
        let policy = path("employment.work_policy");
        let kept = match remote {
            Value::Bool(true) => fill_if_blank(&mut doc, "employment.work_policy", json!("remote")),
            // "not remote" survives only next to a policy saying the same.
            Value::Bool(false) => policy
                .get(&doc)
                .and_then(Value::as_str)
                .is_some_and(|p| !p.trim().is_empty() && p != "remote"),
            Value::Null => true,
            _ => false,
        };
        if !kept {
            lost.push(remote_path);
        }
    }

    let stages = path("process.interview_stages");
    if let Some(list @ Value::Array(_)) = stages.get(&doc) {
        let count = coerce(&FieldKind::Count, list).unwrap_or(Value::Null);
        stages.set(&mut doc, count);
    }

    let skills = path("requirements.skills");
    if let Some(Value::Array(items)) = skills.remove(&mut doc) {
        let entries: Vec<String> = items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        if entries.len() < items.len() {
            lost.push(skills);
        }
        for (field, lines) in partition(&entries, Level::Required) {
            let target = FieldPath::root().child("requirements").child(field);
            let mut current = match target.get(&doc) {
                Some(Value::Array(current)) => current.clone(),
                _ => Vec::new(),
            };
            for line in lines {
                let line = Value::String(line);
                if !current.contains(&line) {
                    current.push(line);
                }
            }
            target.set(&mut doc, Value::Array(current));
        }
    }

    doc[SCHEMA_VERSION_KEY] = json!(3);
    doc
}

/// Bounds recovered from a legacy salary range. `complete` is false when
/// part of the legacy value could not be read.
#[derive(Debug, Default, PartialEq)]
struct SalaryBounds {
    min: Option<f64>,
    max: Option<f64>,
    complete: bool,
}

fn salary_bounds(range: &Value) -> SalaryBounds {
    match range {
        Value::Null => SalaryBounds {
            complete: true,
            ..SalaryBounds::default()
        },
        Value::Number(n) => single_bound(n.as_f64()),
        Value::String(s) => match RANGE_RE.captures(s) {
            Some(caps) => {
                let (min, max) = (parse_number(&caps[1]), parse_number(&caps[2]));
                SalaryBounds {
                    complete: min.is_some() && max.is_some(),
                    min,
                    max,
                }
            }
            None => single_bound(parse_number(s)),
        },
        Value::Object(bounds) => {
            let bound = |key: &str| match bounds.get(key) {
                Some(Value::Number(n)) => Some(n.as_f64()),
                Some(Value::String(s)) => Some(parse_number(s)),
                Some(Value::Null) | None => None,
                Some(_) => Some(None),
            };
            let (min, max) = (bound("min"), bound("max"));
            let unread = bounds.keys().any(|k| k != "min" && k != "max");
            SalaryBounds {
                complete: !unread
                    && (min.is_some() || max.is_some())
                    && min.map_or(true, |b| b.is_some())
                    && max.map_or(true, |b| b.is_some()),
                min: min.flatten(),
                max: max.flatten(),
            }
        }
        _ => SalaryBounds::default(),
    }
}

/// A single figure is both ends of the range.
fn single_bound(value: Option<f64>) -> SalaryBounds {
    SalaryBounds {
        min: value,
        max: value,
        complete: value.is_some(),
    }
}

/// Moves a renamed field. False when the new name already holds a
/// different value and the old one had to be discarded.
fn move_field(doc: &mut Value, from: &str, to: &str) -> bool {
    let Some(value) = path(from).remove(doc) else {
        return true;
    };
    if is_blank(&value) {
        return true;
    }
    fill_if_blank(doc, to, value)
}

/// Writes `value` unless the target already holds something else. True
/// when the document ends up carrying `value`.
fn fill_if_blank(doc: &mut Value, raw: &str, value: Value) -> bool {
    let target = path(raw);
    match target.get(doc) {
        Some(current) if !is_blank(current) => same_value(current, &value),
        _ => target.set(doc, value),
    }
}

/// JSON equality, except that numbers compare by value (`55000 == 55000.0`).
fn same_value(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn path(raw: &str) -> FieldPath {
    FieldPath::parse(raw).unwrap_or_default()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
