//! Declarative shape of the current profile schema.
//!
//! Validation, repair, the skeleton merge and confidence annotation all
//! walk this table rather than the raw document, so only declared
//! sections and fields are ever visited.

use serde_json::{json, Map, Value};

use crate::profile::model::{JobType, LanguageLevel, SalaryPeriod, SeniorityLevel, WorkPolicy};
use crate::profile::path::{FieldPath, Segment};

/// Top-level key reserved for persisted snapshots.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// String, defaults to `""`.
    Text,
    /// String or null, defaults to null.
    OptText,
    /// String holding an e-mail address (or empty), defaults to `""`.
    Email,
    /// Non-negative whole number, defaults to null.
    Count,
    /// Whole number 0–100, defaults to null.
    Percent,
    /// Non-negative decimal, defaults to null.
    Amount,
    /// Boolean, defaults to null.
    Flag,
    /// One of a fixed vocabulary, defaults to null.
    Choice(&'static [&'static str]),
    /// List of strings, defaults to `[]`.
    TextList,
    /// List of objects with declared fields, defaults to `[]`.
    Records(&'static [FieldSpec]),
}

impl FieldKind {
    pub fn default_value(&self) -> Value {
        match self {
            FieldKind::Text | FieldKind::Email => Value::String(String::new()),
            FieldKind::TextList | FieldKind::Records(_) => Value::Array(Vec::new()),
            _ => Value::Null,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::OptText => "string",
            FieldKind::Email => "e-mail address",
            FieldKind::Count => "non-negative integer",
            FieldKind::Percent => "integer between 0 and 100",
            FieldKind::Amount => "non-negative number",
            FieldKind::Flag => "boolean",
            FieldKind::Choice(_) => "enumerated value",
            FieldKind::TextList => "list of strings",
            FieldKind::Records(_) => "list of objects",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

use FieldKind::*;

const STAKEHOLDER_FIELDS: &[FieldSpec] = &[
    field("name", Text),
    field("role", Text),
    field("email", Email),
    field("primary", Flag),
];

const PHASE_FIELDS: &[FieldSpec] = &[
    field("name", Text),
    field("interview_format", Text),
    field("participants", TextList),
    field("timeframe", Text),
];

const SKILL_ENTRY_FIELDS: &[FieldSpec] = &[
    field("raw_name", Text),
    field("normalized_name", Text),
    field("taxonomy_uri", OptText),
    field("weight", Amount),
];

pub static SCHEMA: &[SectionSpec] = &[
    SectionSpec {
        name: "company",
        fields: &[
            field("name", OptText),
            field("brand_name", Text),
            field("industry", Text),
            field("hq_location", Text),
            field("size", Text),
            field("website", Text),
            field("mission", Text),
            field("culture", Text),
            field("contact_name", Text),
            field("contact_email", Email),
            field("contact_phone", Text),
        ],
    },
    SectionSpec {
        name: "position",
        fields: &[
            field("job_title", Text),
            field("seniority_level", Choice(SeniorityLevel::VALUES)),
            field("department", Text),
            field("team_structure", Text),
            field("reporting_line", Text),
            field("reporting_manager_name", Text),
            field("role_summary", Text),
            field("occupation_label", Text),
            field("occupation_uri", Text),
            field("supervises", Count),
            field("team_size", Count),
            field("key_projects", TextList),
            field("customer_contact_required", Flag),
        ],
    },
    SectionSpec {
        name: "location",
        fields: &[
            field("primary_city", Text),
            field("country", Text),
            field("onsite_ratio", Text),
        ],
    },
    SectionSpec {
        name: "responsibilities",
        fields: &[field("items", TextList)],
    },
    SectionSpec {
        name: "requirements",
        fields: &[
            field("hard_skills_required", TextList),
            field("hard_skills_optional", TextList),
            field("soft_skills_required", TextList),
            field("soft_skills_optional", TextList),
            field("tools_and_technologies", TextList),
            field("languages_required", TextList),
            field("languages_optional", TextList),
            field("certificates", TextList),
            field("language_level_english", Choice(LanguageLevel::VALUES)),
            field("skill_mappings", Records(SKILL_ENTRY_FIELDS)),
        ],
    },
    SectionSpec {
        name: "employment",
        fields: &[
            field("job_type", Choice(JobType::VALUES)),
            field("work_policy", Choice(WorkPolicy::VALUES)),
            field("contract_type", Text),
            field("work_schedule", Text),
            field("remote_percentage", Percent),
            field("contract_end", Text),
            field("travel_required", Flag),
            field("relocation_support", Flag),
            field("visa_sponsorship", Flag),
            field("overtime_expected", Flag),
        ],
    },
    SectionSpec {
        name: "compensation",
        fields: &[
            field("salary_provided", Flag),
            field("salary_min", Amount),
            field("salary_max", Amount),
            field("currency", Text),
            field("period", Choice(SalaryPeriod::VALUES)),
            field("variable_pay", Flag),
            field("bonus_percentage", Amount),
            field("equity_offered", Flag),
            field("benefits", TextList),
        ],
    },
    SectionSpec {
        name: "process",
        fields: &[
            field("interview_stages", Count),
            field("stakeholders", Records(STAKEHOLDER_FIELDS)),
            field("phases", Records(PHASE_FIELDS)),
            field("recruitment_timeline", Text),
            field("process_notes", Text),
            field("application_instructions", Text),
            field("onboarding_process", Text),
            field("hiring_manager_name", Text),
            field("hiring_manager_role", Text),
        ],
    },
    SectionSpec {
        name: "business_context",
        fields: &[
            field("domain", Text),
            field("org_name", Text),
            field("org_unit", Text),
            field("industry_codes", TextList),
            field("funding_source", Text),
            field("regulatory_use", Text),
        ],
    },
    SectionSpec {
        name: "meta",
        fields: &[
            field("target_start_date", Text),
            field("application_deadline", Text),
            field("followups_answered", TextList),
        ],
    },
];

/// Fields whose emptiness is reported as "missing value".
pub const CRITICAL_FIELDS: &[&str] = &[
    "company.name",
    "company.contact_email",
    "location.primary_city",
    "position.job_title",
];

pub fn section(name: &str) -> Option<&'static SectionSpec> {
    SCHEMA.iter().find(|s| s.name == name)
}

/// Resolves any path (including record sub-fields such as
/// `process.stakeholders[0].email`) to its declared field spec.
pub fn lookup(path: &FieldPath) -> Option<&'static FieldSpec> {
    let mut keys = path.segments().iter().filter_map(|s| match s {
        Segment::Key(k) => Some(k.as_str()),
        Segment::Index(_) => None,
    });
    let section = section(keys.next()?)?;
    let name = keys.next()?;
    let mut spec = section.fields.iter().find(|f| f.name == name)?;
    for key in keys {
        let FieldKind::Records(fields) = spec.kind else {
            return None;
        };
        spec = fields.iter().find(|f| f.name == key)?;
    }
    Some(spec)
}

/// Every declared `section.field` path in schema order.
pub fn declared_paths() -> impl Iterator<Item = (FieldPath, &'static FieldSpec)> {
    SCHEMA.iter().flat_map(|section| {
        let base = FieldPath::root().child(section.name);
        section
            .fields
            .iter()
            .map(move |f| (base.child(f.name), f))
    })
}

/// A freshly built, default-valued current-version document.
pub fn skeleton() -> Value {
    let mut root = Map::new();
    root.insert(SCHEMA_VERSION_KEY.to_string(), json!(crate::profile::CURRENT_SCHEMA_VERSION));
    for section in SCHEMA {
        root.insert(section.name.to_string(), section_skeleton(section.fields));
    }
    Value::Object(root)
}

pub fn section_skeleton(fields: &[FieldSpec]) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|f| (f.name.to_string(), f.kind.default_value()))
            .collect(),
    )
}
