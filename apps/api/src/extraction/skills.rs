//! Lexical skill classification and derived skill entries.
//!
//! Rules are ordered and the first match wins:
//! language + level → certification → soft skill → tool → hard skill.
//! This is a heuristic; substring keyword matches can misfire on
//! ambiguous phrases and that behavior is kept as-is.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::profile::model::{Requirements, SkillEntry};

static LANGUAGE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(english|englisch|german|deutsch|french|französisch|francais|français|spanish|spanisch|italian|italienisch|dutch|niederländisch|polish|polnisch|portuguese|chinese|mandarin|japanese|russian|arabic|turkish|swedish|danish|norwegian|czech)\b",
    )
    .expect("invalid language pattern")
});

static LANGUAGE_LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(a1|a2|b1|b2|c1|c2|native|fluent|fluency|business|mother tongue|muttersprache|fließend|verhandlungssicher|proficient|basic|grundkenntnisse)\b",
    )
    .expect("invalid language level pattern")
});

static CERTIFICATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(certified|certificate|certification|zertifikat|zertifiziert|zertifizierung)\b")
        .expect("invalid certification pattern")
});

static ACRONYM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Z0-9+]{1,}\b").expect("invalid acronym pattern"));

const SOFT_SKILL_KEYWORDS: &[&str] = &[
    "communication",
    "teamwork",
    "team player",
    "leadership",
    "collaboration",
    "problem solving",
    "problem-solving",
    "adaptability",
    "empathy",
    "creativity",
    "time management",
    "critical thinking",
    "organizational",
    "organisational",
    "presentation",
    "negotiation",
    "self-motivated",
    "proactive",
    "attention to detail",
    "kommunikation",
    "teamfähigkeit",
    "belastbarkeit",
    "eigeninitiative",
    "zuverlässigkeit",
];

const TOOL_KEYWORDS: &[&str] = &[
    "git", "jira", "confluence", "docker", "kubernetes", "k8s", "terraform", "jenkins", "excel",
    "figma", "sap", "salesforce", "aws", "azure", "gcp", "tableau", "power bi", "slack", "linux",
    "postgresql", "mysql", "kafka",
];

/// Synonyms folded during skill-name normalisation.
const SKILL_SYNONYMS: &[(&str, &str)] = &[
    ("k8s", "kubernetes"),
    ("js", "javascript"),
    ("ts", "typescript"),
    ("postgres", "postgresql"),
    ("golang", "go"),
    ("ml", "machine learning"),
    ("gcp", "google cloud platform"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillBucket {
    Language,
    Certification,
    Soft,
    Tool,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Required,
    Optional,
}

impl SkillBucket {
    /// The requirements field this bucket lands in at the given level.
    pub fn field(&self, level: Level) -> &'static str {
        match (self, level) {
            (SkillBucket::Language, Level::Required) => "languages_required",
            (SkillBucket::Language, Level::Optional) => "languages_optional",
            (SkillBucket::Certification, _) => "certificates",
            (SkillBucket::Soft, Level::Required) => "soft_skills_required",
            (SkillBucket::Soft, Level::Optional) => "soft_skills_optional",
            (SkillBucket::Tool, _) => "tools_and_technologies",
            (SkillBucket::Hard, Level::Required) => "hard_skills_required",
            (SkillBucket::Hard, Level::Optional) => "hard_skills_optional",
        }
    }
}

/// Classifies one entry. Deterministic; the first matching rule wins.
pub fn classify(entry: &str) -> SkillBucket {
    if LANGUAGE_NAME_RE.is_match(entry) && LANGUAGE_LEVEL_RE.is_match(entry) {
        return SkillBucket::Language;
    }
    if ACRONYM_RE.is_match(entry) && CERTIFICATION_RE.is_match(entry) {
        return SkillBucket::Certification;
    }
    let lower = entry.to_lowercase();
    if SOFT_SKILL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return SkillBucket::Soft;
    }
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .filter(|w| !w.is_empty())
        .collect();
    let is_tool = TOOL_KEYWORDS.iter().any(|tool| {
        if tool.contains(' ') {
            lower.contains(tool)
        } else {
            words.contains(tool)
        }
    });
    if is_tool {
        SkillBucket::Tool
    } else {
        SkillBucket::Hard
    }
}

/// Groups entries by requirements field, preserving input order within each
/// field and dropping blanks.
pub fn partition(entries: &[String], level: Level) -> BTreeMap<&'static str, Vec<String>> {
    let mut buckets: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    for entry in entries {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        buckets
            .entry(classify(entry).field(level))
            .or_default()
            .push(entry.to_string());
    }
    buckets
}

/// Lower-cases, collapses whitespace, trims punctuation and folds synonyms.
pub fn normalize_skill_name(raw: &str) -> String {
    let collapsed = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let trimmed = collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation() && c != '+' && c != '#')
        .to_string();
    SKILL_SYNONYMS
        .iter()
        .find(|(from, _)| *from == trimmed)
        .map(|(_, to)| to.to_string())
        .unwrap_or(trimmed)
}

/// Regenerates `skill_mappings` from the hard-skill and tool lists.
/// Taxonomy URIs already present for the same normalised name are carried
/// over; none are invented.
pub fn derive_skill_entries(requirements: &Requirements) -> Vec<SkillEntry> {
    let known_uris: BTreeMap<String, String> = requirements
        .skill_mappings
        .iter()
        .filter_map(|entry| {
            let uri = entry.taxonomy_uri.as_ref().filter(|u| !u.trim().is_empty())?;
            Some((normalize_skill_name(&entry.raw_name), uri.clone()))
        })
        .collect();

    let sources: [(&[String], f64); 3] = [
        (&requirements.hard_skills_required, 1.0),
        (&requirements.tools_and_technologies, 0.8),
        (&requirements.hard_skills_optional, 0.5),
    ];

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for (list, weight) in sources {
        for raw in list {
            let normalized_name = normalize_skill_name(raw);
            if normalized_name.is_empty() || !seen.insert(normalized_name.clone()) {
                continue;
            }
            entries.push(SkillEntry {
                raw_name: raw.trim().to_string(),
                taxonomy_uri: known_uris.get(&normalized_name).cloned(),
                normalized_name,
                weight: Some(weight),
            });
        }
    }
    entries
}
