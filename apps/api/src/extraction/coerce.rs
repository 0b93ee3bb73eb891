//! Targeted value fixes, keyed by the declared field kind.
//!
//! Every function returns a value that conforms to its kind, or `None`
//! when no fix applies and the value has to be removed.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::extraction::validate::EMAIL_RE;
use crate::profile::schema::{FieldKind, FieldSpec};

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-)?\s*(\d[\d.,']*)\s*([kK]\b)?").expect("invalid number pattern")
});

static COUNT_ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s*(?:stages?|rounds?|steps?|interviews?|runden)?\s*$")
        .expect("invalid count entry pattern")
});

pub(crate) static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•·–▪●◦]|\d+[.)])\s+(.+)$").expect("invalid bullet pattern")
});

const WORD_NUMBERS: &[(&str, u64)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eins", 1),
    ("zwei", 2),
    ("drei", 3),
    ("vier", 4),
    ("fünf", 5),
];

const FLAG_WORDS: &[(&str, bool)] = &[
    ("true", true),
    ("yes", true),
    ("y", true),
    ("ja", true),
    ("oui", true),
    ("1", true),
    ("false", false),
    ("no", false),
    ("n", false),
    ("nein", false),
    ("non", false),
    ("0", false),
];

/// Normalised spelling → vocabulary value. Only applied when the target is
/// in the field's vocabulary.
const CHOICE_SYNONYMS: &[(&str, &str)] = &[
    ("fulltime", "full_time"),
    ("vollzeit", "full_time"),
    ("permanent", "full_time"),
    ("parttime", "part_time"),
    ("teilzeit", "part_time"),
    ("contractor", "contract"),
    ("fixed_term", "temporary"),
    ("befristet", "temporary"),
    ("intern", "internship"),
    ("praktikum", "internship"),
    ("freelancer", "freelance"),
    ("on_site", "onsite"),
    ("office", "onsite"),
    ("in_office", "onsite"),
    ("vor_ort", "onsite"),
    ("fully_remote", "remote"),
    ("home_office", "remote"),
    ("wfh", "remote"),
    ("entry", "junior"),
    ("entry_level", "junior"),
    ("graduate", "junior"),
    ("jr", "junior"),
    ("medior", "mid"),
    ("intermediate", "mid"),
    ("mid_level", "mid"),
    ("sr", "senior"),
    ("staff", "principal"),
    ("head", "director"),
    ("vp", "executive"),
    ("c_level", "executive"),
    ("hourly", "hour"),
    ("per_hour", "hour"),
    ("daily", "day"),
    ("monthly", "month"),
    ("yearly", "year"),
    ("annual", "year"),
    ("annually", "year"),
    ("per_year", "year"),
    ("mother_tongue", "native"),
    ("muttersprache", "native"),
];

/// Returns a conforming replacement for `value` under `kind`.
/// A `Some(Value::Null)` result means "treat as absent".
pub fn coerce(kind: &FieldKind, value: &Value) -> Option<Value> {
    match kind {
        FieldKind::Text | FieldKind::OptText => coerce_text(value),
        FieldKind::Email => value
            .as_str()
            .and_then(|s| EMAIL_RE.find(s))
            .map(|m| Value::String(m.as_str().to_string())),
        FieldKind::Count => coerce_count(value),
        FieldKind::Percent => {
            let n = number_of(value)?;
            Some(Value::from(n.round().clamp(0.0, 100.0) as u64))
        }
        FieldKind::Amount => {
            let n = number_of(value)?;
            (n >= 0.0).then(|| Value::from(n))
        }
        FieldKind::Flag => coerce_flag(value),
        FieldKind::Choice(values) => value
            .as_str()
            .and_then(|s| nearest_choice(s, values))
            .map(|v| Value::String(v.to_string())),
        FieldKind::TextList => match value {
            Value::String(s) => Some(Value::Array(
                split_lines(s).into_iter().map(Value::String).collect(),
            )),
            Value::Number(_) | Value::Bool(_) => Some(Value::Array(vec![coerce_text(value)?])),
            _ => None,
        },
        FieldKind::Records(_) => match value {
            Value::Object(_) => Some(Value::Array(vec![value.clone()])),
            _ => None,
        },
    }
}

/// Fixes a single list entry that has the wrong type.
pub fn coerce_entry(kind: &FieldKind, entry: &Value) -> Option<Value> {
    match (kind, entry) {
        (FieldKind::TextList, Value::Number(_) | Value::Bool(_)) => coerce_text(entry),
        (FieldKind::Records(fields), Value::String(s)) if !s.trim().is_empty() => {
            let first = first_text_field(fields)?;
            let mut record = Map::new();
            record.insert(first.to_string(), Value::String(s.trim().to_string()));
            Some(Value::Object(record))
        }
        _ => None,
    }
}

fn first_text_field(fields: &[FieldSpec]) -> Option<&'static str> {
    fields
        .iter()
        .find(|f| f.kind == FieldKind::Text)
        .map(|f| f.name)
}

fn coerce_text(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        Value::Array(items) if !items.is_empty() => {
            let parts: Option<Vec<String>> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect();
            parts.map(|p| Value::String(p.join(", ")))
        }
        _ => None,
    }
}

/// Empty list → null; a list whose first entry reads as a count → that
/// count; any other list → its length.
fn coerce_count(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => {
            let f = n.as_f64()?;
            (f >= 0.0 && f <= f64::from(u32::MAX)).then(|| Value::from(f.round() as u64))
        }
        Value::String(s) => parse_count(s).map(Value::from),
        Value::Array(items) if items.is_empty() => Some(Value::Null),
        Value::Array(items) => {
            let stated = items.iter().find_map(|item| match item {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => COUNT_ENTRY_RE
                    .captures(s)
                    .and_then(|c| c[1].parse::<u64>().ok()),
                _ => None,
            });
            Some(Value::from(stated.unwrap_or(items.len() as u64)))
        }
        _ => None,
    }
}

fn parse_count(s: &str) -> Option<u64> {
    if let Some(n) = NUMBER_RE
        .captures(s)
        .filter(|c| c.get(1).is_none())
        .and_then(|c| c[2].trim_end_matches(['.', ',']).parse::<u64>().ok())
    {
        return Some(n);
    }
    let lower = s.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .find_map(|word| WORD_NUMBERS.iter().find(|(w, _)| *w == word))
        .map(|(_, n)| *n)
}

fn coerce_flag(value: &Value) -> Option<Value> {
    let word = match value {
        Value::String(s) => s.trim().to_lowercase(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    FLAG_WORDS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, b)| Value::Bool(*b))
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Reads the first number in free text: `"€85,000"`, `"85.000 EUR"`,
/// `"72k"`, `"12,5 %"`, `"-300"`.
pub fn parse_number(s: &str) -> Option<f64> {
    let caps = NUMBER_RE.captures(s)?;
    let digits = caps[2]
        .trim_end_matches(['.', ',', '\''])
        .replace('\'', "");
    let mut n = normalize_separators(&digits).parse::<f64>().ok()?;
    if caps.get(3).is_some() {
        n *= 1000.0;
    }
    if caps.get(1).is_some() {
        n = -n;
    }
    Some(n)
}

fn normalize_separators(digits: &str) -> String {
    let commas = digits.matches(',').count();
    let dots = digits.matches('.').count();
    match (commas, dots) {
        (0, 0) => digits.to_string(),
        (_, 0) => {
            let after = digits.rsplit(',').next().unwrap_or_default();
            if commas == 1 && after.len() != 3 {
                digits.replace(',', ".")
            } else {
                digits.replace(',', "")
            }
        }
        (0, _) => {
            let (int_part, after) = digits.rsplit_once('.').unwrap_or((digits, ""));
            if dots > 1 || (after.len() == 3 && int_part != "0") {
                digits.replace('.', "")
            } else {
                digits.to_string()
            }
        }
        _ => {
            // Both present: the last one is the decimal separator.
            let last_comma = digits.rfind(',').unwrap_or(0);
            let last_dot = digits.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                digits.replace('.', "").replace(',', ".")
            } else {
                digits.replace(',', "")
            }
        }
    }
}

/// Splits a multi-line string into list entries, stripping bullet marks.
pub fn split_lines(s: &str) -> Vec<String> {
    s.lines()
        .map(|line| match BULLET_RE.captures(line) {
            Some(c) => c[1].trim().to_string(),
            None => line.trim().to_string(),
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn normalize_choice(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, ' ' | '-' | '/') { '_' } else { c })
        .collect();
    mapped
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Exact normalised match, then synonym, then unique token containment,
/// then a unique edit-distance neighbour (≤ 2 and under half its length).
pub fn nearest_choice(raw: &str, values: &[&'static str]) -> Option<&'static str> {
    let normalized = normalize_choice(raw);
    if normalized.is_empty() {
        return None;
    }
    if let Some(v) = values.iter().copied().find(|v| *v == normalized) {
        return Some(v);
    }
    let synonym_target = |key: &str| {
        CHOICE_SYNONYMS
            .iter()
            .find(|(from, to)| *from == key && values.contains(to))
            .map(|(_, to)| *to)
    };
    if let Some(to) = synonym_target(normalized.as_str()) {
        return Some(to);
    }

    let padded = format!("_{normalized}_");
    let mut contained: Vec<&'static str> = values
        .iter()
        .copied()
        .filter(|v| padded.contains(&format!("_{v}_")))
        .collect();
    if contained.is_empty() {
        contained = normalized.split('_').filter_map(synonym_target).collect();
    }
    contained.dedup();
    if let [only] = contained.as_slice() {
        return Some(*only);
    }
    if !contained.is_empty() {
        return None;
    }

    let mut best: Option<(usize, &'static str)> = None;
    let mut tied = false;
    for &v in values {
        let d = levenshtein(&normalized, v);
        if d > 2 || d * 2 >= v.len() {
            continue;
        }
        match best {
            Some((bd, _)) if d > bd => {}
            Some((bd, _)) if d == bd => tied = true,
            _ => {
                best = Some((d, v));
                tied = false;
            }
        }
    }
    if tied {
        None
    } else {
        best.map(|(_, v)| v)
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        prev = cur;
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::model::{JobType, SeniorityLevel, WorkPolicy};
    use serde_json::json;

    #[test]
    fn test_count_from_lists() {
        assert_eq!(coerce(&FieldKind::Count, &json!([])), Some(Value::Null));
        assert_eq!(coerce(&FieldKind::Count, &json!(["Phone", "Onsite"])), Some(json!(2)));
        assert_eq!(coerce(&FieldKind::Count, &json!(["4 rounds", "x"])), Some(json!(4)));
        assert_eq!(coerce(&FieldKind::Count, &json!([3])), Some(json!(3)));
        assert_eq!(
            coerce(&FieldKind::Count, &json!(["Interview process", "3 rounds"])),
            Some(json!(3))
        );
    }

    #[test]
    fn test_count_from_strings_and_numbers() {
        assert_eq!(coerce(&FieldKind::Count, &json!("3 stages")), Some(json!(3)));
        assert_eq!(coerce(&FieldKind::Count, &json!("three rounds")), Some(json!(3)));
        assert_eq!(coerce(&FieldKind::Count, &json!(2.6)), Some(json!(3)));
        assert_eq!(coerce(&FieldKind::Count, &json!(-2)), None);
        assert_eq!(coerce(&FieldKind::Count, &json!("several")), None);
    }

    #[test]
    fn test_parse_number_formats() {
        assert_eq!(parse_number("€85,000"), Some(85000.0));
        assert_eq!(parse_number("85.000 EUR"), Some(85000.0));
        assert_eq!(parse_number("1.234,50"), Some(1234.5));
        assert_eq!(parse_number("72k"), Some(72000.0));
        assert_eq!(parse_number("12,5 %"), Some(12.5));
        assert_eq!(parse_number("2.5"), Some(2.5));
        assert_eq!(parse_number("-300"), Some(-300.0));
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn test_percent_is_clamped_and_amount_rejects_negative() {
        assert_eq!(coerce(&FieldKind::Percent, &json!(140)), Some(json!(100)));
        assert_eq!(coerce(&FieldKind::Percent, &json!("60%")), Some(json!(60)));
        assert_eq!(coerce(&FieldKind::Amount, &json!("65k")), Some(json!(65000.0)));
        assert_eq!(coerce(&FieldKind::Amount, &json!(-5)), None);
    }

    #[test]
    fn test_flags() {
        assert_eq!(coerce(&FieldKind::Flag, &json!("Ja")), Some(json!(true)));
        assert_eq!(coerce(&FieldKind::Flag, &json!(0)), Some(json!(false)));
        assert_eq!(coerce(&FieldKind::Flag, &json!("maybe")), None);
    }

    #[test]
    fn test_nearest_choice() {
        assert_eq!(nearest_choice("Full-time", JobType::VALUES), Some("full_time"));
        assert_eq!(nearest_choice("Vollzeit", JobType::VALUES), Some("full_time"));
        assert_eq!(nearest_choice("Senior Engineer", SeniorityLevel::VALUES), Some("senior"));
        assert_eq!(nearest_choice("Remot", WorkPolicy::VALUES), Some("remote"));
        assert_eq!(nearest_choice("hybrid / remote", WorkPolicy::VALUES), None);
        assert_eq!(nearest_choice("banana", WorkPolicy::VALUES), None);
    }

    #[test]
    fn test_text_and_lists() {
        assert_eq!(coerce(&FieldKind::Text, &json!(42)), Some(json!("42")));
        assert_eq!(
            coerce(&FieldKind::Text, &json!(["Berlin", "Munich"])),
            Some(json!("Berlin, Munich"))
        );
        assert_eq!(
            coerce(&FieldKind::TextList, &json!("- Build APIs\n- Review code")),
            Some(json!(["Build APIs", "Review code"]))
        );
        assert_eq!(coerce(&FieldKind::TextList, &json!({"a": 1})), None);
    }

    #[test]
    fn test_email_extraction() {
        assert_eq!(
            coerce(&FieldKind::Email, &json!("Mail: jobs@acme.io (HR)")),
            Some(json!("jobs@acme.io"))
        );
        assert_eq!(coerce(&FieldKind::Email, &json!("nobody")), None);
    }

    #[test]
    fn test_entry_coercion() {
        const PEOPLE: &[FieldSpec] = &[FieldSpec {
            name: "name",
            kind: FieldKind::Text,
        }];
        assert_eq!(coerce_entry(&FieldKind::TextList, &json!(5)), Some(json!("5")));
        assert_eq!(
            coerce_entry(&FieldKind::Records(PEOPLE), &json!("Ada")),
            Some(json!({"name": "Ada"}))
        );
        assert_eq!(coerce_entry(&FieldKind::TextList, &json!({"x": 1})), None);
    }
}
