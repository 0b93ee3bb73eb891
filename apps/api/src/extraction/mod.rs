// Extraction pipeline: turns raw model output into a schema-conformant vacancy profile.
// Stages run in order: recovery, canonical, locked overlay, validate/repair,
// merge, hints, backfill, confidence. Everything here is synchronous.

pub mod backfill;
pub mod canonical;
pub mod coerce;
pub mod confidence;
pub mod handlers;
pub mod locked;
pub mod merge;
pub mod pipeline;
pub mod recovery;
pub mod repair;
pub mod skills;
pub mod validate;

pub use confidence::{OmissionLog, ProfileMetadata};
pub use pipeline::{extract_profile, ExtractionOutcome, ExtractionRequest, PipelineOptions};
pub use recovery::RecoveryStatus;
