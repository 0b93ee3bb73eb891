//! Axum route handlers for the Profiles API.

use anyhow::Context;
use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::pipeline::{extract_profile, ExtractionOutcome, ExtractionRequest};
use crate::migration::{migrate_profile, MigrationOutcome};
use crate::profile::Profile;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub outcome: ExtractionOutcome,
}

#[derive(Debug, Serialize)]
pub struct MigrateResponse {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub outcome: MigrationOutcome,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/profiles/extract
///
/// Runs the extraction pipeline over raw model output. The pipeline is
/// CPU-bound, so it runs on the blocking pool.
pub async fn handle_extract(
    State(state): State<AppState>,
    Json(request): Json<ExtractionRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    let limit = state.config.max_payload_bytes;
    let size = request.text_len();
    if size > limit {
        warn!("Rejecting extraction payload of {size} bytes (limit {limit})");
        return Err(AppError::PayloadTooLarge { size, limit });
    }

    let request_id = Uuid::new_v4();
    let span = info_span!("extract", %request_id);
    let options = state.options;
    let omissions = state.omissions.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        extract_profile(&request, &options, &omissions)
    })
    .await
    .context("extraction task panicked")??;

    info!(%request_id, recovered = outcome.recovered, "Extraction finished");
    Ok(Json(ExtractResponse {
        request_id,
        outcome,
    }))
}

/// POST /api/v1/profiles/migrate
///
/// Upgrades a persisted profile snapshot to the current schema version.
pub async fn handle_migrate(
    State(state): State<AppState>,
    Json(snapshot): Json<Value>,
) -> Result<Json<MigrateResponse>, AppError> {
    let size = snapshot.to_string().len();
    let limit = state.config.max_payload_bytes;
    if size > limit {
        return Err(AppError::PayloadTooLarge { size, limit });
    }

    let request_id = Uuid::new_v4();
    let span = info_span!("migrate", %request_id);
    let outcome = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        migrate_profile(snapshot)
    })
    .await
    .context("migration task panicked")??;

    Ok(Json(MigrateResponse {
        request_id,
        outcome,
    }))
}

/// GET /api/v1/profiles/skeleton
///
/// An empty profile at the current schema version, every field defaulted.
pub async fn handle_skeleton() -> Json<Profile> {
    Json(Profile::default())
}
