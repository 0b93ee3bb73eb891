//! Schema validator: walks a document against `profile::schema::SCHEMA` and
//! reports every violated constraint with its field path.
//!
//! `null` is accepted everywhere and means "absent"; the skeleton merge
//! supplies the default.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::profile::path::FieldPath;
use crate::profile::schema::{self, FieldKind, FieldSpec, SCHEMA_VERSION_KEY};

pub(crate) static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}")
        .expect("invalid email pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    NotAnObject,
    UnknownField,
    WrongType,
    NotInVocabulary,
    OutOfRange,
    InvalidEmail,
}

/// One violated constraint. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub path: FieldPath,
    pub kind: ViolationKind,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: FieldPath, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

pub fn validate(doc: &Value) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let Some(root) = doc.as_object() else {
        issues.push(ValidationIssue::new(
            FieldPath::root(),
            ViolationKind::NotAnObject,
            format!("document root must be an object, found {}", type_name(doc)),
        ));
        return Err(issues);
    };

    for (key, value) in root {
        let path = FieldPath::root().child(key);
        if key == SCHEMA_VERSION_KEY {
            if !value.is_null() && value.as_u64().is_none() {
                issues.push(ValidationIssue::new(
                    path,
                    ViolationKind::WrongType,
                    format!("expected integer schema version, found {}", type_name(value)),
                ));
            }
            continue;
        }
        let Some(section) = schema::section(key) else {
            issues.push(ValidationIssue::new(
                path,
                ViolationKind::UnknownField,
                "unknown section",
            ));
            continue;
        };
        match value {
            Value::Null => {}
            Value::Object(fields) => check_fields(&path, section.fields, fields, &mut issues),
            other => issues.push(ValidationIssue::new(
                path,
                ViolationKind::NotAnObject,
                format!("section must be an object, found {}", type_name(other)),
            )),
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// True when `value` satisfies `kind` with no violations.
pub fn conforms(kind: &FieldKind, value: &Value) -> bool {
    let mut issues = Vec::new();
    check_value(&FieldPath::root(), kind, value, &mut issues);
    issues.is_empty()
}

fn check_fields(
    base: &FieldPath,
    specs: &[FieldSpec],
    fields: &serde_json::Map<String, Value>,
    issues: &mut Vec<ValidationIssue>,
) {
    for (name, value) in fields {
        let path = base.child(name);
        match specs.iter().find(|s| s.name == name) {
            Some(spec) => check_value(&path, &spec.kind, value, issues),
            None => issues.push(ValidationIssue::new(
                path,
                ViolationKind::UnknownField,
                "unknown field",
            )),
        }
    }
}

pub(crate) fn check_value(
    path: &FieldPath,
    kind: &FieldKind,
    value: &Value,
    issues: &mut Vec<ValidationIssue>,
) {
    if value.is_null() {
        return;
    }
    let wrong_type = || {
        ValidationIssue::new(
            path.clone(),
            ViolationKind::WrongType,
            format!("expected {}, found {}", kind.describe(), type_name(value)),
        )
    };

    match kind {
        FieldKind::Text | FieldKind::OptText => {
            if !value.is_string() {
                issues.push(wrong_type());
            }
        }
        FieldKind::Email => match value.as_str() {
            Some(s) if s.is_empty() || is_email(s) => {}
            Some(_) => issues.push(ValidationIssue::new(
                path.clone(),
                ViolationKind::InvalidEmail,
                "not a valid e-mail address",
            )),
            None => issues.push(wrong_type()),
        },
        FieldKind::Count => match value.as_u64() {
            Some(n) if n <= u64::from(u32::MAX) => {}
            Some(_) => issues.push(ValidationIssue::new(
                path.clone(),
                ViolationKind::OutOfRange,
                "count is too large",
            )),
            None if value.as_i64().is_some() => issues.push(ValidationIssue::new(
                path.clone(),
                ViolationKind::OutOfRange,
                "count must not be negative",
            )),
            None => issues.push(wrong_type()),
        },
        FieldKind::Percent => match value.as_u64() {
            Some(n) if n <= 100 => {}
            Some(_) => issues.push(ValidationIssue::new(
                path.clone(),
                ViolationKind::OutOfRange,
                "percentage must be between 0 and 100",
            )),
            None if value.as_i64().is_some() => issues.push(ValidationIssue::new(
                path.clone(),
                ViolationKind::OutOfRange,
                "percentage must be between 0 and 100",
            )),
            None => issues.push(wrong_type()),
        },
        FieldKind::Amount => match value.as_f64() {
            Some(n) if n.is_finite() && n >= 0.0 => {}
            Some(_) => issues.push(ValidationIssue::new(
                path.clone(),
                ViolationKind::OutOfRange,
                "amount must be a non-negative number",
            )),
            None => issues.push(wrong_type()),
        },
        FieldKind::Flag => {
            if !value.is_boolean() {
                issues.push(wrong_type());
            }
        }
        FieldKind::Choice(values) => match value.as_str() {
            Some(s) if values.contains(&s) => {}
            Some(s) => issues.push(ValidationIssue::new(
                path.clone(),
                ViolationKind::NotInVocabulary,
                format!("'{s}' is not one of {}", values.join(", ")),
            )),
            None => issues.push(wrong_type()),
        },
        FieldKind::TextList => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        issues.push(ValidationIssue::new(
                            path.index(i),
                            ViolationKind::WrongType,
                            format!("expected string list entry, found {}", type_name(item)),
                        ));
                    }
                }
            }
            None => issues.push(wrong_type()),
        },
        FieldKind::Records(fields) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    match item.as_object() {
                        Some(record) => check_fields(&path.index(i), fields, record, issues),
                        None => issues.push(ValidationIssue::new(
                            path.index(i),
                            ViolationKind::WrongType,
                            format!("expected object entry, found {}", type_name(item)),
                        )),
                    }
                }
            }
            None => issues.push(wrong_type()),
        },
    }
}

pub(crate) fn is_email(s: &str) -> bool {
    EMAIL_RE
        .find(s)
        .is_some_and(|m| m.start() == 0 && m.end() == s.len())
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
