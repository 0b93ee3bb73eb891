//! Recovery parser: pulls a JSON document out of raw model output.
//!
//! Strict parse first. On failure every candidate region is collected
//! (markdown fences, outermost balanced brace regions, an unterminated
//! trailing region) and retried as-is and after light syntax repair; the
//! longest candidate that parses into an object wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("invalid fence pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Clean,
    Repaired,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    pub document: Option<Value>,
    pub status: RecoveryStatus,
    pub issues: Vec<String>,
}

#[derive(Debug)]
struct Candidate {
    text: String,
    origin: &'static str,
}

/// Extracts a candidate document from raw model output.
/// `snippet_chars` bounds how much of the raw payload a failure issue quotes.
pub fn recover_document(raw: &str, snippet_chars: usize) -> RecoveryOutcome {
    let trimmed = raw.trim();
    if let Ok(doc) = serde_json::from_str::<Value>(trimmed) {
        if doc.is_object() || doc.is_array() {
            debug!("Model output parsed cleanly ({} bytes)", raw.len());
            return RecoveryOutcome {
                document: Some(doc),
                status: RecoveryStatus::Clean,
                issues: vec![],
            };
        }
    }

    let mut best: Option<(usize, Value, &'static str, bool)> = None;
    for candidate in collect_candidates(trimmed) {
        let parsed = match serde_json::from_str::<Value>(&candidate.text) {
            Ok(doc) => Some((doc, false)),
            Err(_) => serde_json::from_str::<Value>(&repair_syntax(&candidate.text))
                .ok()
                .map(|doc| (doc, true)),
        };
        let Some((doc, syntax_fixed)) = parsed else {
            continue;
        };
        if !doc.is_object() {
            continue;
        }
        let len = candidate.text.len();
        if best.as_ref().map_or(true, |(best_len, ..)| len > *best_len) {
            best = Some((len, doc, candidate.origin, syntax_fixed));
        }
    }

    match best {
        Some((len, doc, origin, syntax_fixed)) => {
            let mut issues = vec![format!(
                "invalid JSON recovered: extracted a {len}-byte object from {origin}"
            )];
            if syntax_fixed {
                issues.push("invalid JSON recovered: repaired JSON syntax".to_string());
            }
            warn!("Recovered model output from {origin} ({len} bytes, syntax_fixed={syntax_fixed})");
            RecoveryOutcome {
                document: Some(doc),
                status: RecoveryStatus::Repaired,
                issues,
            }
        }
        None => {
            let snippet = truncate_snippet(trimmed, snippet_chars);
            warn!("No parsable JSON object in model output: {snippet}");
            RecoveryOutcome {
                document: None,
                status: RecoveryStatus::Failed,
                issues: vec![format!("no JSON object found in model output: {snippet}")],
            }
        }
    }
}

fn collect_candidates(text: &str) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = FENCE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| Candidate {
            text: m.as_str().trim().to_string(),
            origin: "a markdown fence",
        })
        .collect();

    let (regions, unterminated) = brace_regions(text);
    candidates.extend(regions.into_iter().map(|r| Candidate {
        text: r.to_string(),
        origin: "surrounding prose",
    }));
    if let Some(tail) = unterminated {
        candidates.push(Candidate {
            text: close_truncated(tail),
            origin: "a truncated payload",
        });
    }
    candidates
}

/// Outermost balanced `{...}` regions, ignoring braces inside strings.
/// Also returns the unterminated trailing region, if the text ends mid-object.
fn brace_regions(text: &str) -> (Vec<&str>, Option<&str>) {
    let mut regions = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    regions.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    let unterminated = (depth > 0).then(|| &text[start..]);
    (regions, unterminated)
}

/// Appends whatever closers a truncated object needs.
fn close_truncated(tail: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in tail.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = tail.trim_end().to_string();
    if in_string {
        out.push('"');
    }
    let trimmed_len = out.trim_end_matches(|c: char| c == ',' || c.is_whitespace()).len();
    out.truncate(trimmed_len);
    if out.ends_with(':') {
        out.push_str("null");
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Fixes common model-side syntax damage outside string literals:
/// smart quotes, single-quoted strings, Python literals, `//` comments,
/// trailing commas and raw newlines inside strings.
pub(crate) fn repair_syntax(text: &str) -> String {
    let text = text
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' | '\'' => {
                let (literal, next) = read_string(&chars, i);
                out.push_str(&literal);
                i = next;
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            ',' => {
                let next_significant = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next_significant, Some('}') | Some(']')) {
                    i += 1;
                    continue;
                }
            }
            c if c.is_ascii_alphabetic() => {
                let word: String = chars[i..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                    .collect();
                let replacement = match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                };
                out.push_str(replacement);
                i += word.chars().count();
                continue;
            }
            _ => {}
        }
        out.push(ch);
        i += 1;
    }
    out
}

/// Reads a string literal starting at `start` (either quote style) and
/// re-emits it as a valid double-quoted JSON string.
fn read_string(chars: &[char], start: usize) -> (String, usize) {
    let quote = chars[start];
    let mut out = String::from('"');
    let mut i = start + 1;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '\\' => {
                out.push(ch);
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
                continue;
            }
            c if c == quote => {
                out.push('"');
                return (out, i + 1);
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
        i += 1;
    }
    out.push('"');
    (out, i)
}

/// Collapses whitespace and cuts to `max_chars`, so diagnostics never carry
/// the full payload.
pub fn truncate_snippet(raw: &str, max_chars: usize) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let cut: String = collapsed.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}
