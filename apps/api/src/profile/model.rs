//! The typed vacancy profile.
//!
//! Every struct is `#[serde(default)]` so a document merged onto the
//! schema skeleton always deserializes; the field layout here must stay in
//! lockstep with `schema::SCHEMA` (enforced by tests in that module).

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CURRENT_SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeniorityLevel {
    Intern,
    Junior,
    Mid,
    Senior,
    Lead,
    Principal,
    Director,
    Executive,
}

impl SeniorityLevel {
    pub const VALUES: &'static [&'static str] = &[
        "intern",
        "junior",
        "mid",
        "senior",
        "lead",
        "principal",
        "director",
        "executive",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Internship,
    Freelance,
}

impl JobType {
    pub const VALUES: &'static [&'static str] = &[
        "full_time",
        "part_time",
        "contract",
        "temporary",
        "internship",
        "freelance",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkPolicy {
    Onsite,
    Hybrid,
    Remote,
}

impl WorkPolicy {
    pub const VALUES: &'static [&'static str] = &["onsite", "hybrid", "remote"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalaryPeriod {
    Hour,
    Day,
    Month,
    Year,
}

impl SalaryPeriod {
    pub const VALUES: &'static [&'static str] = &["hour", "day", "month", "year"];
}

/// CEFR proficiency, plus native speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
    Native,
}

impl LanguageLevel {
    pub const VALUES: &'static [&'static str] = &["a1", "a2", "b1", "b2", "c1", "c2", "native"];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Company {
    pub name: Option<String>,
    pub brand_name: String,
    pub industry: String,
    pub hq_location: String,
    pub size: String,
    pub website: String,
    pub mission: String,
    pub culture: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub job_title: String,
    pub seniority_level: Option<SeniorityLevel>,
    pub department: String,
    pub team_structure: String,
    pub reporting_line: String,
    pub reporting_manager_name: String,
    pub role_summary: String,
    pub occupation_label: String,
    pub occupation_uri: String,
    pub supervises: Option<u32>,
    pub team_size: Option<u32>,
    pub key_projects: Vec<String>,
    pub customer_contact_required: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub primary_city: String,
    pub country: String,
    pub onsite_ratio: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Responsibilities {
    pub items: Vec<String>,
}

/// Derived enrichment of a requirement entry. Regenerated on every run,
/// never hand-edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillEntry {
    pub raw_name: String,
    pub normalized_name: String,
    pub taxonomy_uri: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirements {
    pub hard_skills_required: Vec<String>,
    pub hard_skills_optional: Vec<String>,
    pub soft_skills_required: Vec<String>,
    pub soft_skills_optional: Vec<String>,
    pub tools_and_technologies: Vec<String>,
    pub languages_required: Vec<String>,
    pub languages_optional: Vec<String>,
    pub certificates: Vec<String>,
    pub language_level_english: Option<LanguageLevel>,
    pub skill_mappings: Vec<SkillEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Employment {
    pub job_type: Option<JobType>,
    pub work_policy: Option<WorkPolicy>,
    pub contract_type: String,
    pub work_schedule: String,
    pub remote_percentage: Option<u8>,
    pub contract_end: String,
    pub travel_required: Option<bool>,
    pub relocation_support: Option<bool>,
    pub visa_sponsorship: Option<bool>,
    pub overtime_expected: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Compensation {
    pub salary_provided: Option<bool>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub currency: String,
    pub period: Option<SalaryPeriod>,
    pub variable_pay: Option<bool>,
    pub bonus_percentage: Option<f64>,
    pub equity_offered: Option<bool>,
    pub benefits: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stakeholder {
    pub name: String,
    pub role: String,
    pub email: String,
    pub primary: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessPhase {
    pub name: String,
    pub interview_format: String,
    pub participants: Vec<String>,
    pub timeframe: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Process {
    pub interview_stages: Option<u32>,
    pub stakeholders: Vec<Stakeholder>,
    pub phases: Vec<ProcessPhase>,
    pub recruitment_timeline: String,
    pub process_notes: String,
    pub application_instructions: String,
    pub onboarding_process: String,
    pub hiring_manager_name: String,
    pub hiring_manager_role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessContext {
    pub domain: String,
    pub org_name: String,
    pub org_unit: String,
    pub industry_codes: Vec<String>,
    pub funding_source: String,
    pub regulatory_use: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub target_start_date: String,
    pub application_deadline: String,
    pub followups_answered: Vec<String>,
}

/// The canonical vacancy record. Always reflects `CURRENT_SCHEMA_VERSION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub schema_version: u32,
    pub company: Company,
    pub position: Position,
    pub location: Location,
    pub responsibilities: Responsibilities,
    pub requirements: Requirements,
    pub employment: Employment,
    pub compensation: Compensation,
    pub process: Process,
    pub business_context: BusinessContext,
    pub meta: Meta,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            company: Company::default(),
            position: Position::default(),
            location: Location::default(),
            responsibilities: Responsibilities::default(),
            requirements: Requirements::default(),
            employment: Employment::default(),
            compensation: Compensation::default(),
            process: Process::default(),
            business_context: BusinessContext::default(),
            meta: Meta::default(),
        }
    }
}

impl Profile {
    /// Converts a schema-conforming document into the typed record. Only
    /// the validator/merge boundary should call this.
    pub fn from_document(doc: Value) -> Result<Self, serde_json::Error> {
        let mut profile: Profile = serde_json::from_value(doc)?;
        profile.schema_version = CURRENT_SCHEMA_VERSION;
        Ok(profile)
    }

    pub fn to_document(&self) -> Value {
        // Every field is a plain string, number, bool, list or map, so this cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
