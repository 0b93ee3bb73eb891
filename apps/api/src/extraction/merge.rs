//! Defaults merge: lays a document over a freshly built skeleton.
//!
//! Walks the declared schema, not the input, so the output has exactly the
//! declared sections and fields. Shared by the extraction pipeline and the
//! schema migrator.

use serde_json::{Map, Value};
use tracing::debug;

use crate::extraction::validate::conforms;
use crate::profile::path::FieldPath;
use crate::profile::schema::{FieldKind, FieldSpec, SCHEMA, SCHEMA_VERSION_KEY};
use crate::profile::CURRENT_SCHEMA_VERSION;

#[derive(Debug, Clone)]
pub struct Merged {
    pub document: Value,
    /// Input values that were not carried over: undeclared keys, and
    /// values that do not fit their declared kind.
    pub dropped: Vec<FieldPath>,
}

/// For each declared field the input value wins when present, non-null and
/// conforming; otherwise the kind's default is used. Stamps the current
/// schema version.
pub fn merge_onto_skeleton(doc: &Value) -> Merged {
    let mut dropped = Vec::new();
    let source = doc.as_object();
    let mut root = Map::new();
    root.insert(
        SCHEMA_VERSION_KEY.to_string(),
        Value::from(CURRENT_SCHEMA_VERSION),
    );

    for section in SCHEMA {
        let path = FieldPath::root().child(section.name);
        let fields = match source.and_then(|s| s.get(section.name)) {
            None | Some(Value::Null) => None,
            Some(Value::Object(fields)) => Some(fields),
            Some(_) => {
                dropped.push(path.clone());
                None
            }
        };
        root.insert(
            section.name.to_string(),
            merge_fields(&path, section.fields, fields, &mut dropped),
        );
    }

    if let Some(source) = source {
        for key in source.keys() {
            let declared = key == SCHEMA_VERSION_KEY || SCHEMA.iter().any(|s| s.name == key);
            if !declared {
                dropped.push(FieldPath::root().child(key));
            }
        }
    }

    if !dropped.is_empty() {
        debug!("Merge replaced {} value(s) with defaults", dropped.len());
    }
    Merged {
        document: Value::Object(root),
        dropped,
    }
}

fn merge_fields(
    base: &FieldPath,
    specs: &[FieldSpec],
    source: Option<&Map<String, Value>>,
    dropped: &mut Vec<FieldPath>,
) -> Value {
    let mut out = Map::new();
    for spec in specs {
        let path = base.child(spec.name);
        let value = match source.and_then(|s| s.get(spec.name)) {
            None | Some(Value::Null) => spec.kind.default_value(),
            Some(value) => merge_value(&path, &spec.kind, value, dropped),
        };
        out.insert(spec.name.to_string(), value);
    }
    if let Some(source) = source {
        for key in source.keys() {
            if !specs.iter().any(|s| s.name == key) {
                dropped.push(base.child(key));
            }
        }
    }
    Value::Object(out)
}

fn merge_value(
    path: &FieldPath,
    kind: &FieldKind,
    value: &Value,
    dropped: &mut Vec<FieldPath>,
) -> Value {
    if let FieldKind::Records(fields) = kind {
        let Some(items) = value.as_array() else {
            dropped.push(path.clone());
            return kind.default_value();
        };
        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_object() {
                Some(record) => {
                    records.push(merge_fields(&path.index(i), fields, Some(record), dropped))
                }
                None => dropped.push(path.index(i)),
            }
        }
        return Value::Array(records);
    }
    if conforms(kind, value) {
        value.clone()
    } else {
        dropped.push(path.clone());
        kind.default_value()
    }
}
