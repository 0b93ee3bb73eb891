// Profile data model: typed record, declarative schema table, dotted field paths.

pub mod model;
pub mod path;
pub mod schema;

pub use model::{Profile, SkillEntry, CURRENT_SCHEMA_VERSION};
pub use path::FieldPath;
pub use schema::{FieldKind, FieldSpec};
