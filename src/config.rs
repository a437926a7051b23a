//! Engine configuration from environment variables

use crate::memory::ContextConfig;
use std::env;
use tracing::warn;

/// Integration-level settings for the context engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Feature flag: hand the context summary to the orchestrator for
    /// prompt injection. Tracking runs either way.
    pub inject_context_summary: bool,
    pub context: ContextConfig,
    /// Postgres connection string; in-memory storage when absent
    pub database_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inject_context_summary: true,
            context: ContextConfig::default(),
            database_url: None,
        }
    }
}

impl EngineConfig {
    /// Read `CONTEXT_SUMMARY_ENABLED`, `CONTEXT_RECENCY_WINDOW` and
    /// `POSTGRES_URL` / `DATABASE_URL`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let inject_context_summary = match lookup("CONTEXT_SUMMARY_ENABLED") {
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                warn!("Ignoring invalid CONTEXT_SUMMARY_ENABLED value: {}", raw);
                defaults.inject_context_summary
            }),
            None => defaults.inject_context_summary,
        };

        let recency_window = match lookup("CONTEXT_RECENCY_WINDOW") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring invalid CONTEXT_RECENCY_WINDOW value: {}", raw);
                defaults.context.recency_window
            }),
            None => defaults.context.recency_window,
        };

        let database_url = lookup("POSTGRES_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .filter(|url| !url.trim().is_empty());

        Self {
            inject_context_summary,
            context: ContextConfig {
                recency_window,
                ..defaults.context
            },
            database_url,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
