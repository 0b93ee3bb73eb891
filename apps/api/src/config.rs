use anyhow::{Context, Result};

use crate::extraction::PipelineOptions;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Upper bound on caller-supplied text per request, in bytes.
    pub max_payload_bytes: usize,
    /// Bullets an informal heading needs before backfill trusts it.
    pub min_heuristic_bullets: usize,
    /// Characters of raw output quoted in parse issues.
    pub issue_snippet_chars: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_payload_bytes: parse_env("MAX_PAYLOAD_BYTES", 262_144)?,
            min_heuristic_bullets: parse_env("MIN_HEURISTIC_BULLETS", 3)?,
            issue_snippet_chars: parse_env("ISSUE_SNIPPET_CHARS", 160)?,
        })
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            min_heuristic_bullets: self.min_heuristic_bullets,
            issue_snippet_chars: self.issue_snippet_chars,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let options = PipelineOptions::default();
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            max_payload_bytes: 262_144,
            min_heuristic_bullets: options.min_heuristic_bullets,
            issue_snippet_chars: options.issue_snippet_chars,
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
