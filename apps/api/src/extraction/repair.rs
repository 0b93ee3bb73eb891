//! Schema validator & repair engine.
//!
//! `Validate → Repair → Validate → Repair → Validate → Prune → Validate`.
//! Repairs are targeted fixes keyed by violation kind (see `coerce`);
//! pruning removes whatever still fails. A final audit compares the
//! result against the pre-repair input so every change is on record.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::errors::PipelineError;
use crate::extraction::coerce::{coerce, coerce_entry};
use crate::extraction::locked::LockedFields;
use crate::extraction::recovery::truncate_snippet;
use crate::extraction::validate::{validate, ValidationIssue, ViolationKind};
use crate::profile::path::{FieldPath, Segment};
use crate::profile::schema;

pub const MAX_REPAIR_ATTEMPTS: usize = 2;

const VALUE_PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    Coerced,
    Removed,
    Pruned,
    /// A fix was needed but the path is locked.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alteration {
    pub path: FieldPath,
    pub mechanism: Mechanism,
    pub detail: String,
}

impl fmt::Display for Alteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "(root): {}", self.detail)
        } else {
            write!(f, "{}: {}", self.path, self.detail)
        }
    }
}

/// A document that passed schema validation. Only this module builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDocument(Value);

impl ValidatedDocument {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Repaired {
    pub document: ValidatedDocument,
    pub used_repair: bool,
    pub alterations: Vec<Alteration>,
}

pub fn validate_and_repair(
    doc: Value,
    locked: &LockedFields,
) -> Result<Repaired, PipelineError> {
    repair_within(doc, locked, MAX_REPAIR_ATTEMPTS)
}

fn repair_within(
    doc: Value,
    locked: &LockedFields,
    attempts: usize,
) -> Result<Repaired, PipelineError> {
    let before = doc.clone();
    let mut doc = doc;
    let mut log = Vec::new();

    for attempt in 1..=attempts {
        let Err(issues) = validate(&doc) else {
            return Ok(finish(&before, doc, log));
        };
        debug!("Repair attempt {attempt}: {} violation(s)", issues.len());
        for issue in sorted_deepest_first(issues) {
            log.push(repair_issue(&mut doc, &issue, locked));
        }
    }

    if let Err(issues) = validate(&doc) {
        warn!("Pruning {} value(s) that survived repair", issues.len());
        for issue in sorted_deepest_first(issues) {
            log.push(prune_issue(&mut doc, &issue, locked));
        }
    }

    match validate(&doc) {
        Ok(()) => Ok(finish(&before, doc, log)),
        Err(issues) => {
            let issues: Vec<String> = issues.iter().map(ToString::to_string).collect();
            error!("Schema violations survived pruning: {issues:?}");
            Err(PipelineError::UnrecoverableSchema { issues })
        }
    }
}

fn finish(before: &Value, doc: Value, mut log: Vec<Alteration>) -> Repaired {
    let audited = audit(before, &doc, &log);
    if !audited.is_empty() {
        debug!("Audit found {} unlogged change(s)", audited.len());
    }
    log.extend(audited);
    let used_repair = log.iter().any(|a| a.mechanism != Mechanism::Skipped);
    Repaired {
        document: ValidatedDocument(doc),
        used_repair,
        alterations: log,
    }
}

/// List removals shift later siblings, so higher indices go first.
fn sorted_deepest_first(mut issues: Vec<ValidationIssue>) -> Vec<ValidationIssue> {
    issues.sort_by(|a, b| b.path.cmp(&a.path));
    issues
}

fn repair_issue(doc: &mut Value, issue: &ValidationIssue, locked: &LockedFields) -> Alteration {
    let path = &issue.path;
    if locked.covers(path) {
        return skipped(path);
    }
    match issue.kind {
        ViolationKind::NotAnObject if path.is_root() => {
            *doc = Value::Object(Map::new());
            removed(path, Mechanism::Removed, &issue.message)
        }
        ViolationKind::NotAnObject | ViolationKind::UnknownField => {
            path.remove(doc);
            removed(path, Mechanism::Removed, &issue.message)
        }
        ViolationKind::WrongType
        | ViolationKind::NotInVocabulary
        | ViolationKind::OutOfRange
        | ViolationKind::InvalidEmail => {
            let Some(spec) = schema::lookup(path) else {
                path.remove(doc);
                return removed(path, Mechanism::Removed, &issue.message);
            };
            let Some(current) = path.get(doc).cloned() else {
                return removed(path, Mechanism::Removed, &issue.message);
            };
            let is_entry = matches!(path.segments().last(), Some(Segment::Index(_)));
            let fixed = if is_entry {
                coerce_entry(&spec.kind, &current)
            } else {
                coerce(&spec.kind, &current)
            };
            match fixed {
                Some(value) if path.set(doc, value.clone()) => Alteration {
                    path: path.clone(),
                    mechanism: Mechanism::Coerced,
                    detail: format!("coerced {} to {}", preview(&current), preview(&value)),
                },
                _ => {
                    path.remove(doc);
                    removed(path, Mechanism::Removed, &issue.message)
                }
            }
        }
    }
}

fn prune_issue(doc: &mut Value, issue: &ValidationIssue, locked: &LockedFields) -> Alteration {
    let path = &issue.path;
    if locked.covers(path) {
        return skipped(path);
    }
    if path.is_root() {
        *doc = Value::Object(Map::new());
    } else {
        path.remove(doc);
    }
    removed(path, Mechanism::Pruned, &issue.message)
}

fn removed(path: &FieldPath, mechanism: Mechanism, reason: &str) -> Alteration {
    Alteration {
        path: path.clone(),
        mechanism,
        detail: format!("removed invalid value ({reason})"),
    }
}

fn skipped(path: &FieldPath) -> Alteration {
    debug!("Not repairing locked path {path}");
    Alteration {
        path: path.clone(),
        mechanism: Mechanism::Skipped,
        detail: "repair skipped for locked field (no-op)".to_string(),
    }
}

/// Reports declared fields whose value differs between the pre-repair
/// input and the validated result but that no logged repair accounts for.
fn audit(before: &Value, after: &Value, log: &[Alteration]) -> Vec<Alteration> {
    let mut found = Vec::new();
    for (path, _) in schema::declared_paths() {
        let old = path.get(before).filter(|v| !v.is_null());
        let new = path.get(after).filter(|v| !v.is_null());
        if old == new {
            continue;
        }
        let accounted = log
            .iter()
            .any(|a| a.path.declared_field() == path || path.starts_with(&a.path));
        if accounted {
            continue;
        }
        found.push(match new {
            Some(value) => Alteration {
                path,
                mechanism: Mechanism::Coerced,
                detail: format!("changed during repair to {}", preview(value)),
            },
            None => Alteration {
                path,
                mechanism: Mechanism::Removed,
                detail: "removed invalid value (dropped during repair)".to_string(),
            },
        });
    }
    found
}

fn preview(value: &Value) -> String {
    truncate_snippet(&value.to_string(), VALUE_PREVIEW_CHARS)
}
