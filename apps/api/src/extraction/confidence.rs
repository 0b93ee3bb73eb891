//! Confidence/provenance annotation.
//!
//! Produces a side-channel metadata document keyed by `section.field`.
//! Fields never observed get no entry at all, which is distinct from an
//! entry with a low score.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::extraction::recovery::RecoveryStatus;
use crate::extraction::repair::{Alteration, Mechanism};
use crate::profile::path::FieldPath;
use crate::profile::schema::{self, CRITICAL_FIELDS};

/// Process-lifetime record of omission warnings already logged.
/// Shared between requests; losing an insert race only costs a duplicate
/// log line.
#[derive(Debug, Default)]
pub struct OmissionLog {
    seen: Mutex<HashSet<String>>,
}

impl OmissionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `key` is offered.
    pub fn first_time(&self, key: &str) -> bool {
        self.seen.lock().insert(key.to_string())
    }

    pub fn reset(&self) {
        self.seen.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    ModelOutput,
    Repaired,
    Heuristic,
    Hint,
    Locked,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceEntry {
    pub tier: ConfidenceTier,
    pub source: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileMetadata {
    pub recovery_status: RecoveryStatus,
    pub fields: BTreeMap<String, ConfidenceEntry>,
    pub issues: Vec<String>,
    pub annotated_at: DateTime<Utc>,
}

/// Everything the pipeline did to the profile, by path.
#[derive(Debug, Default)]
pub struct Provenance<'a> {
    /// The validated model document, before the skeleton merge.
    pub observed: Option<&'a Value>,
    pub alterations: &'a [Alteration],
    pub heuristic: &'a [FieldPath],
    pub hinted: &'a [FieldPath],
    pub locked: Vec<FieldPath>,
    pub derived: Vec<FieldPath>,
}

pub fn annotate(
    status: RecoveryStatus,
    provenance: &Provenance<'_>,
    issues: Vec<String>,
    omissions: &OmissionLog,
) -> ProfileMetadata {
    let mut fields: BTreeMap<String, ConfidenceEntry> = BTreeMap::new();

    if let Some(observed) = provenance.observed {
        let (tier, score, note) = match status {
            RecoveryStatus::Clean => (ConfidenceTier::High, 0.95, None),
            _ => (ConfidenceTier::Medium, 0.6, Some("invalid_json_recovery")),
        };
        for (path, _) in schema::declared_paths() {
            if path.get(observed).is_some_and(|v| !is_blank(v)) {
                record(&mut fields, &path, tier, SourceKind::ModelOutput, score, note);
            }
        }
        warn_omissions(observed, omissions);
    }

    for alteration in provenance.alterations {
        let note = match alteration.mechanism {
            Mechanism::Coerced => "schema_repair",
            Mechanism::Removed => "removed",
            Mechanism::Pruned => "pruned",
            Mechanism::Skipped => continue,
        };
        let path = alteration.path.declared_field();
        if path.segments().len() == 2 {
            record(
                &mut fields,
                &path,
                ConfidenceTier::Low,
                SourceKind::Repaired,
                0.4,
                Some(note),
            );
        }
    }
    for path in provenance.heuristic {
        record(
            &mut fields,
            path,
            ConfidenceTier::Low,
            SourceKind::Heuristic,
            0.35,
            Some("heuristic_fill"),
        );
    }
    for path in provenance.hinted {
        record(
            &mut fields,
            path,
            ConfidenceTier::Medium,
            SourceKind::Hint,
            0.7,
            Some("caller_hint"),
        );
    }
    for path in &provenance.derived {
        record(
            &mut fields,
            path,
            ConfidenceTier::Medium,
            SourceKind::Derived,
            0.5,
            Some("derived"),
        );
    }
    for path in &provenance.locked {
        record(
            &mut fields,
            path,
            ConfidenceTier::High,
            SourceKind::Locked,
            1.0,
            Some("locked"),
        );
    }

    ProfileMetadata {
        recovery_status: status,
        fields,
        issues: dedup_issues(issues),
        annotated_at: Utc::now(),
    }
}

/// Creates the entry on first touch; later touches update it in place.
/// The tier and score only go down, except that a locked value is
/// authoritative.
fn record(
    fields: &mut BTreeMap<String, ConfidenceEntry>,
    path: &FieldPath,
    tier: ConfidenceTier,
    source: SourceKind,
    score: f32,
    note: Option<&str>,
) {
    let authoritative = source == SourceKind::Locked;
    fields
        .entry(path.to_string())
        .and_modify(|entry| {
            entry.source = source;
            if authoritative || tier < entry.tier {
                entry.tier = tier;
            }
            entry.score = Some(match entry.score {
                Some(current) if !authoritative => current.min(score),
                _ => score,
            });
            if let Some(note) = note {
                let notes = entry.note.get_or_insert_with(String::new);
                if !notes.split(", ").any(|n| n == note) {
                    if !notes.is_empty() {
                        notes.push_str(", ");
                    }
                    notes.push_str(note);
                }
            }
        })
        .or_insert_with(|| ConfidenceEntry {
            tier,
            source,
            score: Some(score),
            note: note.map(str::to_string),
        });
}

/// Warns once per process when a section came back with content but
/// without one of its critical fields.
fn warn_omissions(observed: &Value, omissions: &OmissionLog) {
    for raw in CRITICAL_FIELDS {
        let Some(path) = FieldPath::parse(raw) else {
            continue;
        };
        let Some(section) = path.section() else {
            continue;
        };
        let section_has_content = observed
            .get(section)
            .and_then(Value::as_object)
            .is_some_and(|fields| fields.values().any(|v| !is_blank(v)));
        let missing = path.get(observed).map_or(true, is_blank);
        if section_has_content && missing {
            let message = format!("model omitted {path} despite other {section} fields present");
            if omissions.first_time(&message) {
                warn!("{message}");
            }
        }
    }
}

/// Order-preserving de-duplication.
pub fn dedup_issues(issues: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    issues
        .into_iter()
        .filter(|issue| seen.insert(issue.clone()))
        .collect()
}

pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
