//! Caller-locked fields.
//!
//! A locked value is written over the canonical document before validation
//! and must come out of the pipeline unchanged. Repair, pruning, backfill
//! and hints consult `covers` and record a no-op instead of touching it.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::extraction::repair::{Alteration, Mechanism};
use crate::extraction::validate::conforms;
use crate::profile::path::{FieldPath, Segment};
use crate::profile::schema;

#[derive(Debug, Clone, Default)]
pub struct LockedFields {
    values: BTreeMap<FieldPath, Value>,
}

impl LockedFields {
    /// Accepts declared `section.field` paths holding a conforming,
    /// non-null value. Everything else is refused with an issue string.
    pub fn new(raw: &BTreeMap<String, Value>) -> (Self, Vec<String>) {
        let mut values = BTreeMap::new();
        let mut issues = Vec::new();
        for (key, value) in raw {
            match accept(key, value) {
                Some(path) => {
                    values.insert(path, value.clone());
                }
                None => {
                    warn!("Refusing locked value for {key}");
                    issues.push(format!("ignored locked value for {key}"));
                }
            }
        }
        (Self { values }, issues)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.values.keys()
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        self.values.get(path)
    }

    /// True when writing at `path` could alter a locked value: the path is
    /// locked itself, lies inside a locked value, or contains one.
    pub fn covers(&self, path: &FieldPath) -> bool {
        self.values
            .keys()
            .any(|locked| path.starts_with(locked) || locked.starts_with(path))
    }

    /// Writes every locked value into `doc`. A non-object root or section
    /// standing in the way is replaced by an empty object; each replacement
    /// is returned as a pruning alteration.
    pub fn overlay(&self, doc: &mut Value) -> Vec<Alteration> {
        let mut pruned = Vec::new();
        if self.values.is_empty() {
            return pruned;
        }
        if !doc.is_object() {
            warn!("Replacing non-object document to apply locked fields");
            *doc = Value::Object(Map::new());
            pruned.push(Alteration {
                path: FieldPath::root(),
                mechanism: Mechanism::Pruned,
                detail: "replaced non-object document to apply locked fields".to_string(),
            });
        }
        for (path, value) in &self.values {
            if let Some(section) = path.section() {
                let section_path = FieldPath::root().child(section);
                let malformed = section_path
                    .get(doc)
                    .is_some_and(|s| !s.is_object() && !s.is_null());
                if malformed {
                    warn!("Replacing malformed section {section} to apply locked fields");
                    section_path.set(doc, Value::Object(Map::new()));
                    pruned.push(Alteration {
                        path: section_path,
                        mechanism: Mechanism::Pruned,
                        detail: "replaced malformed section to apply locked fields".to_string(),
                    });
                }
            }
            path.set(doc, value.clone());
        }
        pruned
    }
}

fn accept(key: &str, value: &Value) -> Option<FieldPath> {
    let path = FieldPath::parse(key)?;
    let is_field = path.segments().len() == 2
        && path.segments().iter().all(|s| matches!(s, Segment::Key(_)));
    if !is_field || value.is_null() {
        return None;
    }
    let spec = schema::lookup(&path)?;
    conforms(&spec.kind, value).then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn locked(pairs: &[(&str, Value)]) -> (LockedFields, Vec<String>) {
        let raw: BTreeMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        LockedFields::new(&raw)
    }

    #[test]
    fn test_accepts_declared_conforming_values() {
        let (fields, issues) = locked(&[
            ("company.name", json!("ACME")),
            ("process.interview_stages", json!(3)),
        ]);
        assert!(issues.is_empty());
        assert_eq!(fields.paths().count(), 2);
    }

    #[test]
    fn test_refuses_undeclared_or_invalid_values() {
        let (fields, issues) = locked(&[
            ("company.ticker", json!("ACM")),
            ("process.interview_stages", json!("three")),
            ("company", json!({"name": "ACME"})),
            ("process.stakeholders[0].name", json!("Ada")),
            ("company.name", Value::Null),
        ]);
        assert!(fields.is_empty());
        assert_eq!(issues.len(), 5);
        assert!(issues.contains(&"ignored locked value for company.ticker".to_string()));
    }

    #[test]
    fn test_covers_ancestors_and_descendants() {
        let (fields, _) = locked(&[("process.stakeholders", json!([{"name": "Ada"}]))]);
        let check = |raw: &str| fields.covers(&FieldPath::parse(raw).unwrap());
        assert!(check("process.stakeholders"));
        assert!(check("process.stakeholders[0].name"));
        assert!(check("process"));
        assert!(check(""));
        assert!(!check("process.phases"));
        assert!(!check("company.name"));
    }

    #[test]
    fn test_overlay_writes_values_and_fixes_sections() {
        let (fields, _) = locked(&[
            ("company.name", json!("Locked GmbH")),
            ("location.primary_city", json!("Berlin")),
        ]);
        let mut doc = json!({"company": {"name": "Model Inc", "size": "50"}, "location": "Berlin"});
        let pruned = fields.overlay(&mut doc);
        assert_eq!(doc["company"], json!({"name": "Locked GmbH", "size": "50"}));
        assert_eq!(doc["location"], json!({"primary_city": "Berlin"}));
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].mechanism, Mechanism::Pruned);
        assert_eq!(
            pruned[0].to_string(),
            "location: replaced malformed section to apply locked fields"
        );
    }

    #[test]
    fn test_overlay_replaces_non_object_root() {
        let (fields, _) = locked(&[("position.job_title", json!("Engineer"))]);
        let mut doc = json!([1, 2]);
        let pruned = fields.overlay(&mut doc);
        assert_eq!(doc, json!({"position": {"job_title": "Engineer"}}));
        assert!(pruned[0].path.is_root());
        assert_eq!(
            pruned[0].to_string(),
            "(root): replaced non-object document to apply locked fields"
        );
    }
}
