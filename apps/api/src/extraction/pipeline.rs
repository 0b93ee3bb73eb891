//! Extraction pipeline orchestration.
//!
//! Raw model output → recovery → canonicalisation → locked overlay →
//! validation & repair → skeleton merge → hints → heuristic backfill →
//! skill entries → annotation. Synchronous and side-effect free apart from
//! logging and the shared omission log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::errors::PipelineError;
use crate::extraction::backfill::backfill;
use crate::extraction::canonical::canonicalize;
use crate::extraction::confidence::{annotate, is_blank, OmissionLog, ProfileMetadata, Provenance};
use crate::extraction::locked::LockedFields;
use crate::extraction::merge::merge_onto_skeleton;
use crate::extraction::recovery::{recover_document, truncate_snippet, RecoveryStatus};
use crate::extraction::repair::{validate_and_repair, Mechanism};
use crate::extraction::skills::derive_skill_entries;
use crate::profile::path::FieldPath;
use crate::profile::schema::CRITICAL_FIELDS;
use crate::profile::Profile;

/// Tunables derived from `Config`. The pipeline never reads the environment.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub min_heuristic_bullets: usize,
    pub issue_snippet_chars: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            min_heuristic_bullets: 3,
            issue_snippet_chars: 160,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionRequest {
    pub raw_output: String,
    #[serde(default)]
    pub source_text: Option<String>,
    #[serde(default)]
    pub title_hint: Option<String>,
    #[serde(default)]
    pub company_hint: Option<String>,
    #[serde(default)]
    pub url_hint: Option<String>,
    #[serde(default)]
    pub locked_fields: BTreeMap<String, Value>,
}

impl ExtractionRequest {
    pub fn new(raw_output: impl Into<String>) -> Self {
        Self {
            raw_output: raw_output.into(),
            ..Self::default()
        }
    }

    /// Bytes of caller-supplied text, checked against the payload limit.
    pub fn text_len(&self) -> usize {
        self.raw_output.len() + self.source_text.as_ref().map_or(0, String::len)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    pub profile: Profile,
    /// Any repair, pruning or heuristic fill happened.
    pub recovered: bool,
    pub issues: Vec<String>,
    pub metadata: ProfileMetadata,
}

pub fn extract_profile(
    request: &ExtractionRequest,
    options: &PipelineOptions,
    omissions: &OmissionLog,
) -> Result<ExtractionOutcome, PipelineError> {
    let mut issues = Vec::new();

    // Phase 1: recovery
    let recovery = recover_document(&request.raw_output, options.issue_snippet_chars);
    issues.extend(recovery.issues);
    let Some(document) = recovery.document else {
        return Err(PipelineError::UnparsablePayload {
            snippet: truncate_snippet(&request.raw_output, options.issue_snippet_chars),
        });
    };

    // Phase 2: canonicalisation
    let canonical = canonicalize(document);
    issues.extend(canonical.notes);

    // Phase 3: locked overlay, validation & repair
    let (locked, refused) = LockedFields::new(&request.locked_fields);
    issues.extend(refused);
    let mut document = canonical.document;
    let mut alterations = locked.overlay(&mut document);
    let repaired = validate_and_repair(document, &locked)?;
    alterations.extend(repaired.alterations.iter().cloned());
    issues.extend(alterations.iter().map(ToString::to_string));
    debug!("Validated document ({} alteration(s))", alterations.len());

    // Phase 4: merge, hints, backfill
    let merged = merge_onto_skeleton(repaired.document.as_value());
    let mut document = merged.document;
    let hinted = apply_hints(&mut document, request, &locked, &mut issues);
    let mut profile = Profile::from_document(document).map_err(|e| {
        error!("Merged document does not fit the typed profile: {e}");
        PipelineError::UnrecoverableSchema {
            issues: vec![e.to_string()],
        }
    })?;

    let filled = match request.source_text.as_deref() {
        Some(text) if !text.trim().is_empty() => {
            let result = backfill(&mut profile, text, &locked, options.min_heuristic_bullets);
            issues.extend(result.issues);
            result.filled
        }
        _ => Vec::new(),
    };

    let mappings = FieldPath::root().child("requirements").child("skill_mappings");
    let mut derived = Vec::new();
    if !locked.covers(&mappings) {
        profile.requirements.skill_mappings = derive_skill_entries(&profile.requirements);
        if !profile.requirements.skill_mappings.is_empty() {
            derived.push(mappings);
        }
    }

    issues.extend(missing_values(&profile));

    // Phase 5: annotation
    let recovered = recovery.status == RecoveryStatus::Repaired
        || repaired.used_repair
        || alterations.iter().any(|a| a.mechanism == Mechanism::Pruned)
        || !filled.is_empty();
    let provenance = Provenance {
        observed: Some(repaired.document.as_value()),
        alterations: &alterations,
        heuristic: &filled,
        hinted: &hinted,
        locked: locked.paths().cloned().collect(),
        derived,
    };
    let metadata = annotate(recovery.status, &provenance, issues, omissions);
    info!(
        "Extracted profile: recovered={recovered}, {} issue(s), {} annotated field(s)",
        metadata.issues.len(),
        metadata.fields.len()
    );

    Ok(ExtractionOutcome {
        profile,
        recovered,
        issues: metadata.issues.clone(),
        metadata,
    })
}

/// Fills still-empty fields from caller hints.
fn apply_hints(
    document: &mut Value,
    request: &ExtractionRequest,
    locked: &LockedFields,
    issues: &mut Vec<String>,
) -> Vec<FieldPath> {
    let hints = [
        ("position.job_title", request.title_hint.as_deref()),
        ("company.name", request.company_hint.as_deref()),
        ("company.website", request.url_hint.as_deref()),
    ];
    let mut hinted = Vec::new();
    for (raw, hint) in hints {
        let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        let Some(path) = FieldPath::parse(raw) else {
            continue;
        };
        if !path.get(document).map_or(true, is_blank) {
            continue;
        }
        if locked.covers(&path) {
            issues.push(format!("{path}: caller hint skipped for locked field (no-op)"));
            continue;
        }
        if path.set(document, Value::String(hint.to_string())) {
            issues.push(format!("{path}: filled from caller hint"));
            hinted.push(path);
        }
    }
    hinted
}

fn missing_values(profile: &Profile) -> Vec<String> {
    let document = profile.to_document();
    CRITICAL_FIELDS
        .iter()
        .filter(|raw| {
            FieldPath::parse(raw)
                .and_then(|p| p.get(&document).cloned())
                .map_or(true, |v| is_blank(&v))
        })
        .map(|raw| format!("{raw}: missing value"))
        .collect()
}
