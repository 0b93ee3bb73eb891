use std::sync::Arc;

use crate::config::Config;
use crate::extraction::{OmissionLog, PipelineOptions};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub options: PipelineOptions,
    /// Omission warnings already logged by this process.
    pub omissions: Arc<OmissionLog>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let options = config.pipeline_options();
        Self {
            config: Arc::new(config),
            options,
            omissions: Arc::new(OmissionLog::new()),
        }
    }
}
