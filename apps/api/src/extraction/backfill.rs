//! Heuristic backfill of list fields from the original source text.
//!
//! Only `responsibilities.items` and the requirement buckets are filled,
//! only when empty and unlocked, and only from bullet lines sitting under a
//! recognised heading. A block counts as evidence when its heading is a
//! short formal heading, or when it carries at least `min_bullets` bullets.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::extraction::coerce::BULLET_RE;
use crate::extraction::locked::LockedFields;
use crate::extraction::skills::{partition, Level};
use crate::profile::model::Requirements;
use crate::profile::path::FieldPath;
use crate::profile::Profile;

const RESPONSIBILITY_CUES: &[&str] = &[
    "responsibilities",
    "your tasks",
    "what you'll do",
    "what you will do",
    "what you’ll do",
    "your role",
    "duties",
    "aufgaben",
    "tätigkeiten",
    "vos missions",
    "missions",
];

const REQUIRED_CUES: &[&str] = &[
    "requirements",
    "must have",
    "must-have",
    "qualifications",
    "your profile",
    "what you bring",
    "what we're looking for",
    "what we are looking for",
    "anforderungen",
    "ihr profil",
    "dein profil",
    "was du mitbringst",
    "votre profil",
    "profil recherché",
];

const OPTIONAL_CUES: &[&str] = &[
    "nice to have",
    "nice-to-have",
    "bonus",
    "preferred",
    "wünschenswert",
    "von vorteil",
    "atouts",
];

/// Headings that end a list section without being a backfill target.
const STOP_CUES: &[&str] = &[
    "benefits",
    "we offer",
    "perks",
    "about us",
    "about the company",
    "how to apply",
    "wir bieten",
    "über uns",
    "nous offrons",
];

/// A requirement line carrying one of these phrases goes to the optional level.
static INLINE_OPTIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:nice[ -]to[ -]have|(?:is )?a plus|ideally|preferred|von vorteil|wünschenswert)\b")
        .expect("invalid optional marker pattern")
});

/// Formal headings have at most this many words.
const MAX_HEADING_WORDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    Responsibilities,
    Required,
    Optional,
    Other,
}

#[derive(Debug)]
struct Block {
    topic: Topic,
    formal: bool,
    open: bool,
    bullets: Vec<String>,
}

impl Block {
    fn is_evidence(&self, min_bullets: usize) -> bool {
        !self.bullets.is_empty() && (self.formal || self.bullets.len() >= min_bullets)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Backfill {
    pub filled: Vec<FieldPath>,
    pub issues: Vec<String>,
}

pub fn backfill(
    profile: &mut Profile,
    source_text: &str,
    locked: &LockedFields,
    min_bullets: usize,
) -> Backfill {
    let mut out = Backfill::default();
    let blocks: Vec<Block> = segment(source_text)
        .into_iter()
        .filter(|b| b.topic != Topic::Other && b.is_evidence(min_bullets))
        .collect();
    if blocks.is_empty() {
        return out;
    }

    let responsibilities = collect(&blocks, |t| t == Topic::Responsibilities);
    let items = FieldPath::root().child("responsibilities").child("items");
    fill(&mut profile.responsibilities.items, responsibilities, &items, locked, &mut out);

    let mut required = Vec::new();
    let mut optional = collect(&blocks, |t| t == Topic::Optional);
    for line in collect(&blocks, |t| t == Topic::Required) {
        if INLINE_OPTIONAL_RE.is_match(&line) {
            optional.push(line);
        } else {
            required.push(line);
        }
    }

    let mut buckets = partition(&required, Level::Required);
    for (field, lines) in partition(&optional, Level::Optional) {
        buckets.entry(field).or_default().extend(lines);
    }
    for (field, lines) in buckets {
        let path = FieldPath::root().child("requirements").child(field);
        if let Some(slot) = bucket_mut(&mut profile.requirements, field) {
            fill(slot, lines, &path, locked, &mut out);
        }
    }

    if !out.filled.is_empty() {
        debug!("Backfilled {} field(s) from source text", out.filled.len());
    }
    out
}

fn fill(
    slot: &mut Vec<String>,
    lines: Vec<String>,
    path: &FieldPath,
    locked: &LockedFields,
    out: &mut Backfill,
) {
    if lines.is_empty() || !slot.is_empty() {
        return;
    }
    if locked.covers(path) {
        out.issues
            .push(format!("{path}: heuristic fill skipped for locked field (no-op)"));
        return;
    }
    *slot = lines;
    out.issues.push(format!("{path}: filled via heuristics"));
    out.filled.push(path.clone());
}

fn collect(blocks: &[Block], wanted: impl Fn(Topic) -> bool) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for block in blocks.iter().filter(|b| wanted(b.topic)) {
        for bullet in &block.bullets {
            if !lines.iter().any(|l| l.eq_ignore_ascii_case(bullet)) {
                lines.push(bullet.clone());
            }
        }
    }
    lines
}

fn segment(text: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = BULLET_RE.captures(line) {
            if let Some(block) = blocks.last_mut().filter(|b| b.open) {
                let item = caps[1].trim().trim_end_matches(';').trim();
                if !item.is_empty() {
                    block.bullets.push(item.to_string());
                }
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if let Some((topic, formal)) = heading(line) {
            blocks.push(Block {
                topic,
                formal,
                open: true,
                bullets: Vec::new(),
            });
            continue;
        }
        // Prose after a list closes it; prose between heading and list does not.
        if let Some(block) = blocks.last_mut() {
            if !block.bullets.is_empty() {
                block.open = false;
            }
        }
    }
    blocks
}

/// Recognises a heading line. Returns its topic and whether it is formal
/// (short enough to be a section title rather than a lead-in sentence).
fn heading(line: &str) -> Option<(Topic, bool)> {
    let cleaned = line.trim().trim_start_matches('#').trim().trim_matches('*').trim();
    let ends_with_colon = cleaned.ends_with(':');
    let text = cleaned
        .trim_end_matches(':')
        .trim_end_matches('*')
        .trim()
        .to_lowercase();
    let short = text.split_whitespace().count() <= MAX_HEADING_WORDS;
    if text.is_empty() || (!short && !ends_with_colon) {
        return None;
    }
    let has = |cues: &[&str]| cues.iter().any(|c| text.contains(c));
    let topic = if has(STOP_CUES) {
        Topic::Other
    } else if has(OPTIONAL_CUES) {
        Topic::Optional
    } else if has(RESPONSIBILITY_CUES) {
        Topic::Responsibilities
    } else if has(REQUIRED_CUES) {
        Topic::Required
    } else {
        return None;
    };
    Some((topic, short))
}

fn bucket_mut<'a>(requirements: &'a mut Requirements, field: &str) -> Option<&'a mut Vec<String>> {
    match field {
        "hard_skills_required" => Some(&mut requirements.hard_skills_required),
        "hard_skills_optional" => Some(&mut requirements.hard_skills_optional),
        "soft_skills_required" => Some(&mut requirements.soft_skills_required),
        "soft_skills_optional" => Some(&mut requirements.soft_skills_optional),
        "tools_and_technologies" => Some(&mut requirements.tools_and_technologies),
        "languages_required" => Some(&mut requirements.languages_required),
        "languages_optional" => Some(&mut requirements.languages_optional),
        "certificates" => Some(&mut requirements.certificates),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    const POSTING: &str = "\
We are a logistics start-up in Hamburg.

Responsibilities:
- Design and build data pipelines
- Own our event schema
- Mentor two junior engineers

Requirements:
- Python
- Strong communication skills
- English C1
- Docker
- Kotlin is a plus

Nice to have:
- AWS Certified Solutions Architect

What we offer:
- Free lunch
- 30 days of vacation
- Bike leasing
";

    fn run(text: &str, profile: &mut Profile) -> Backfill {
        backfill(profile, text, &LockedFields::default(), 3)
    }

    #[test]
    fn test_fills_responsibilities_under_heading() {
        let mut profile = Profile::default();
        let out = run(POSTING, &mut profile);
        assert_eq!(
            profile.responsibilities.items,
            vec![
                "Design and build data pipelines",
                "Own our event schema",
                "Mentor two junior engineers"
            ]
        );
        assert!(out
            .issues
            .contains(&"responsibilities.items: filled via heuristics".to_string()));
    }

    #[test]
    fn test_requirements_are_split_by_level_and_bucket() {
        let mut profile = Profile::default();
        run(POSTING, &mut profile);
        let req = &profile.requirements;
        assert_eq!(req.hard_skills_required, vec!["Python"]);
        assert_eq!(req.soft_skills_required, vec!["Strong communication skills"]);
        assert_eq!(req.languages_required, vec!["English C1"]);
        assert_eq!(req.tools_and_technologies, vec!["Docker"]);
        assert_eq!(req.hard_skills_optional, vec!["Kotlin is a plus"]);
        assert_eq!(req.certificates, vec!["AWS Certified Solutions Architect"]);
        assert!(profile.compensation.benefits.is_empty());
    }

    #[test]
    fn test_existing_values_are_kept() {
        let mut profile = Profile::default();
        profile.responsibilities.items = vec!["From the model".to_string()];
        let out = run(POSTING, &mut profile);
        assert_eq!(profile.responsibilities.items, vec!["From the model"]);
        assert!(!out.filled.iter().any(|p| p.to_string() == "responsibilities.items"));
    }

    #[test]
    fn test_prose_without_bullets_fills_nothing() {
        let mut profile = Profile::default();
        let out = run(
            "Your responsibilities include building APIs. Requirements are Rust and SQL.",
            &mut profile,
        );
        assert!(out.filled.is_empty());
        assert_eq!(profile, Profile::default());
    }

    #[test]
    fn test_lead_in_sentence_needs_enough_bullets() {
        let text = "In this role your responsibilities will include the following:\n- Build APIs\n- Review code\n";
        let mut profile = Profile::default();
        assert!(run(text, &mut profile).filled.is_empty());

        let text = "In this role your responsibilities will include the following:\n- Build APIs\n- Review code\n- Run on-call\n";
        let mut profile = Profile::default();
        run(text, &mut profile);
        assert_eq!(profile.responsibilities.items.len(), 3);
    }

    #[test]
    fn test_bullets_outside_any_heading_are_ignored() {
        let text = "- One\n- Two\n- Three\n- Four\n";
        let mut profile = Profile::default();
        assert!(run(text, &mut profile).filled.is_empty());
    }

    #[test]
    fn test_german_headings() {
        let text = "## Ihre Aufgaben\n• Betreuung von Kunden\n• Angebotserstellung\n\nIhr Profil\n• Teamfähigkeit\n";
        let mut profile = Profile::default();
        run(text, &mut profile);
        assert_eq!(profile.responsibilities.items.len(), 2);
        assert_eq!(profile.requirements.soft_skills_required, vec!["Teamfähigkeit"]);
    }

    #[test]
    fn test_locked_field_is_skipped() {
        let mut raw = BTreeMap::new();
        raw.insert("responsibilities.items".to_string(), json!([]));
        let (locked, _) = LockedFields::new(&raw);
        let mut profile = Profile::default();
        let out = backfill(&mut profile, POSTING, &locked, 3);
        assert!(profile.responsibilities.items.is_empty());
        assert!(out.issues.contains(
            &"responsibilities.items: heuristic fill skipped for locked field (no-op)".to_string()
        ));
    }

    #[test]
    fn test_optional_markers_match_whole_words() {
        let text = "Requirements:\n- Data plus analytics\n- SQL ideally\n- Go is a plus\n";
        let mut profile = Profile::default();
        run(text, &mut profile);
        let req = &profile.requirements;
        assert_eq!(req.hard_skills_required, vec!["Data plus analytics"]);
        assert_eq!(req.hard_skills_optional, vec!["SQL ideally", "Go is a plus"]);
    }
}
