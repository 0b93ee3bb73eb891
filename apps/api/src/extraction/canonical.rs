//! Canonicalizer: rewrites alias/legacy keys onto current field paths and
//! splits undifferentiated skill lists into typed requirement buckets.
//!
//! Never fails. Keys it does not recognise pass through untouched so the
//! validator can flag them.

use serde_json::{Map, Value};
use tracing::debug;

use crate::extraction::skills::{partition, Level};
use crate::profile::path::FieldPath;
use crate::profile::schema;

/// Deprecated or alternate key → canonical path.
const ALIASES: &[(&str, &str)] = &[
    ("role.title", "position.job_title"),
    ("position.title", "position.job_title"),
    ("job_title", "position.job_title"),
    ("title", "position.job_title"),
    ("company_name", "company.name"),
    ("company.company_name", "company.name"),
    ("company.email", "company.contact_email"),
    ("contact.email", "company.contact_email"),
    ("contact.name", "company.contact_name"),
    ("contact.phone", "company.contact_phone"),
    ("location.city", "location.primary_city"),
    ("city", "location.primary_city"),
    ("location.remote_policy", "employment.work_policy"),
    ("employment.remote_policy", "employment.work_policy"),
    ("skills.must_have", "requirements.hard_skills_required"),
    ("skills.nice_to_have", "requirements.hard_skills_optional"),
    ("requirements.tools", "requirements.tools_and_technologies"),
    ("requirements.certifications", "requirements.certificates"),
    ("requirements.languages", "requirements.languages_required"),
    ("tasks", "responsibilities.items"),
    ("responsibilities.tasks", "responsibilities.items"),
    ("benefits", "compensation.benefits"),
    ("salary.min", "compensation.salary_min"),
    ("salary.max", "compensation.salary_max"),
    ("salary.currency", "compensation.currency"),
    ("compensation.salary_currency", "compensation.currency"),
    ("process.stages", "process.interview_stages"),
    ("process.hiring_process", "process.process_notes"),
    ("business_context.organisation", "business_context.org_name"),
    ("meta.start_date", "meta.target_start_date"),
];

/// Keys holding a mixed list of skills, languages and certificates.
const AMBIGUOUS_LISTS: &[(&str, Level)] = &[
    ("skills", Level::Required),
    ("qualifications", Level::Required),
    ("requirements.skills", Level::Required),
    ("requirements.qualifications", Level::Required),
    ("requirements.must_have", Level::Required),
    ("nice_to_have", Level::Optional),
    ("requirements.nice_to_have", Level::Optional),
];

#[derive(Debug, Clone)]
pub struct Canonicalized {
    pub document: Value,
    pub notes: Vec<String>,
}

pub fn canonicalize(mut doc: Value) -> Canonicalized {
    let mut notes = Vec::new();
    let unwrapped = match &mut doc {
        Value::Array(items) => items
            .iter()
            .position(Value::is_object)
            .map(|pos| items.swap_remove(pos)),
        _ => None,
    };
    if let Some(first) = unwrapped {
        doc = first;
        notes.push("document root was a list; using its first object".to_string());
    }
    if !doc.is_object() {
        return Canonicalized {
            document: doc,
            notes,
        };
    }

    wrap_list_sections(&mut doc, &mut notes);

    for (from, to) in ALIASES {
        if let (Some(from), Some(to)) = (FieldPath::parse(from), FieldPath::parse(to)) {
            rewrite_alias(&mut doc, &from, &to, &mut notes);
        }
    }

    for (key, level) in AMBIGUOUS_LISTS {
        if let Some(path) = FieldPath::parse(key) {
            classify_list(&mut doc, &path, *level, &mut notes);
        }
    }

    Canonicalized {
        document: doc,
        notes,
    }
}

/// `"responsibilities": [...]` → `{"items": [...]}`; a bare list under
/// `requirements` is treated as an ambiguous skill list.
fn wrap_list_sections(doc: &mut Value, notes: &mut Vec<String>) {
    let Some(root) = doc.as_object_mut() else {
        return;
    };
    if let Some(list @ Value::Array(_)) = root.get("responsibilities").cloned() {
        let mut section = Map::new();
        section.insert("items".to_string(), list);
        root.insert("responsibilities".to_string(), Value::Object(section));
        debug!("Wrapped bare responsibilities list into responsibilities.items");
    }
    if let Some(list @ Value::Array(_)) = root.get("requirements").cloned() {
        let mut section = Map::new();
        section.insert("skills".to_string(), list);
        root.insert("requirements".to_string(), Value::Object(section));
        notes.push("requirements: bare list treated as an unclassified skill list".to_string());
    }
}

fn rewrite_alias(doc: &mut Value, from: &FieldPath, to: &FieldPath, notes: &mut Vec<String>) {
    let Some(value) = from.remove(doc) else {
        return;
    };
    drop_empty_parent(doc, from);
    if value.is_null() {
        return;
    }

    let existing = to.get(doc).cloned();
    match existing {
        Some(existing) if !is_blank(&existing) => match (existing, value) {
            (Value::Array(mut current), Value::Array(extra)) => {
                for item in extra {
                    if !current.contains(&item) {
                        current.push(item);
                    }
                }
                to.set(doc, Value::Array(current));
                debug!("Merged alias {from} into {to}");
            }
            (existing, value) => {
                if value != existing {
                    notes.push(format!("{from}: alias ignored because {to} is already set"));
                }
            }
        },
        _ => {
            if to.set(doc, value.clone()) {
                debug!("Rewrote alias {from} -> {to}");
            } else {
                // Target section has the wrong shape; leave the alias for the validator.
                from.set(doc, value);
            }
        }
    }
}

fn classify_list(doc: &mut Value, path: &FieldPath, level: Level, notes: &mut Vec<String>) {
    let entries: Vec<String> = match path.get(doc) {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(s)) => s
            .lines()
            .map(|l| l.trim_start_matches(['-', '*', '•']).trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        _ => return,
    };
    if !doc
        .get("requirements")
        .map_or(true, |r| r.is_object() || r.is_null())
    {
        return;
    }
    path.remove(doc);
    drop_empty_parent(doc, path);

    let total = entries.len();
    for (field, items) in partition(&entries, level) {
        let target = FieldPath::root().child("requirements").child(field);
        let mut current = match target.get(doc) {
            Some(Value::Array(current)) => current.clone(),
            _ => Vec::new(),
        };
        for item in items {
            let exists = current.iter().any(|c| {
                c.as_str()
                    .is_some_and(|c| c.eq_ignore_ascii_case(&item))
            });
            if !exists {
                current.push(Value::String(item));
            }
        }
        target.set(doc, Value::Array(current));
    }
    notes.push(format!(
        "{path}: classified {total} entries into typed requirement buckets"
    ));
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Removes an emptied undeclared container such as `skills` or `salary`.
fn drop_empty_parent(doc: &mut Value, path: &FieldPath) {
    let Some(section) = path.section() else {
        return;
    };
    if path.segments().len() < 2 || schema::section(section).is_some() {
        return;
    }
    let parent = FieldPath::root().child(section);
    if parent
        .get(doc)
        .and_then(Value::as_object)
        .is_some_and(Map::is_empty)
    {
        parent.remove(doc);
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alias_rewrites_to_canonical_path() {
        let out = canonicalize(json!({
            "role": {"title": "Data Engineer"},
            "company": {"email": "jobs@acme.io"}
        }));
        assert_eq!(out.document["position"]["job_title"], json!("Data Engineer"));
        assert_eq!(out.document["company"]["contact_email"], json!("jobs@acme.io"));
        assert!(out.document.get("role").is_none());
        assert!(out.document["company"].get("email").is_none());
    }

    #[test]
    fn test_alias_does_not_override_canonical_value() {
        let out = canonicalize(json!({
            "title": "Alias Title",
            "position": {"job_title": "Real Title"}
        }));
        assert_eq!(out.document["position"]["job_title"], json!("Real Title"));
        assert!(out.notes.iter().any(|n| n.contains("alias ignored")));
    }

    #[test]
    fn test_alias_lists_merge_without_duplicates() {
        let out = canonicalize(json!({
            "skills": {"must_have": ["Rust", "SQL"]},
            "requirements": {"hard_skills_required": ["Rust"]}
        }));
        assert_eq!(
            out.document["requirements"]["hard_skills_required"],
            json!(["Rust", "SQL"])
        );
        assert!(out.document.get("skills").is_none());
    }

    #[test]
    fn test_ambiguous_skill_list_is_classified() {
        let out = canonicalize(json!({
            "skills": ["Python", "English C1", "Teamwork", "PMP certification", "Docker"]
        }));
        let req = &out.document["requirements"];
        assert_eq!(req["hard_skills_required"], json!(["Python"]));
        assert_eq!(req["languages_required"], json!(["English C1"]));
        assert_eq!(req["soft_skills_required"], json!(["Teamwork"]));
        assert_eq!(req["certificates"], json!(["PMP certification"]));
        assert_eq!(req["tools_and_technologies"], json!(["Docker"]));
        assert!(out.document.get("skills").is_none());
        assert!(out.notes[0].contains("classified 5 entries"));
    }

    #[test]
    fn test_nice_to_have_goes_to_optional_buckets() {
        let out = canonicalize(json!({
            "requirements": {"nice_to_have": ["Kotlin", "French B1"]}
        }));
        let req = &out.document["requirements"];
        assert_eq!(req["hard_skills_optional"], json!(["Kotlin"]));
        assert_eq!(req["languages_optional"], json!(["French B1"]));
        assert!(req.get("nice_to_have").is_none());
    }

    #[test]
    fn test_bare_sections_are_wrapped() {
        let out = canonicalize(json!({
            "responsibilities": ["Build APIs", "Review code"],
            "requirements": ["Go", "Communication"]
        }));
        assert_eq!(
            out.document["responsibilities"]["items"],
            json!(["Build APIs", "Review code"])
        );
        assert_eq!(
            out.document["requirements"]["hard_skills_required"],
            json!(["Go"])
        );
        assert_eq!(
            out.document["requirements"]["soft_skills_required"],
            json!(["Communication"])
        );
    }

    #[test]
    fn test_list_root_is_unwrapped() {
        let out = canonicalize(json!([1, {"company": {"name": "ACME"}}, {"other": 1}]));
        assert_eq!(out.document, json!({"company": {"name": "ACME"}}));
        assert_eq!(out.notes.len(), 1);
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let doc = json!({"company": {"name": "ACME", "stock_ticker": "ACM"}, "mystery": 1});
        let out = canonicalize(doc.clone());
        assert_eq!(out.document, doc);
        assert!(out.notes.is_empty());
    }

    #[test]
    fn test_alias_into_malformed_section_is_left_in_place() {
        let out = canonicalize(json!({"company": "ACME", "company_name": "ACME GmbH"}));
        assert_eq!(out.document["company_name"], json!("ACME GmbH"));
    }
}
