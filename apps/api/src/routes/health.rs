use axum::Json;
use serde_json::{json, Value};

use crate::profile::CURRENT_SCHEMA_VERSION;

/// GET /health
/// Returns a simple status object with service and schema version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "vacancy-api",
        "schema_version": CURRENT_SCHEMA_VERSION
    }))
}
