//! Validator configuration.
//!
//! [`ValidatorConfig`] is plain data with serde defaults, so it can be embedded
//! in whatever configuration file the surrounding service reads. For simple
//! deployments [`ValidatorConfig::from_env`] starts from the defaults and
//! applies `MRRV_*` environment overrides.

use crate::matching::MatchOptions;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Environment variable disabling/enabling the ownership guard.
pub const ENV_VALIDATE_OWNER_CHANGES: &str = "MRRV_VALIDATE_OWNER_CHANGES";
/// Environment variable for [`MatchOptions::stop_when_found`].
pub const ENV_STOP_WHEN_FOUND: &str = "MRRV_STOP_WHEN_FOUND";
/// Environment variable for [`MatchOptions::accept_zero_with_max_candidates`].
pub const ENV_ACCEPT_ZERO_WITH_MAX_CANDIDATES: &str = "MRRV_ACCEPT_ZERO_WITH_MAX_CANDIDATES";
/// Environment variable holding the import-source mapping as a JSON object.
pub const ENV_IMPORT_SOURCES: &str = "MRRV_IMPORT_SOURCES";

/// Configuration of a [`Validator`](crate::pipeline::Validator).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorConfig {
    /// Run the ownership (`LOW` tag) authorization guard
    #[serde(default = "default_true")]
    pub validate_owner_changes: bool,

    /// Import-process cataloger ids mapped to the conversion name they write in `884 $a`
    #[serde(default)]
    pub import_sources: IndexMap<String, String>,

    /// Matcher iteration options
    #[serde(default)]
    pub match_options: MatchOptions,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            validate_owner_changes: default_true(),
            import_sources: IndexMap::new(),
            match_options: MatchOptions::default(),
        }
    }
}

impl ValidatorConfig {
    /// Defaults with `MRRV_*` environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a key lookup. Invalid values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup_bool(&lookup, ENV_VALIDATE_OWNER_CHANGES) {
            self.validate_owner_changes = value;
        }
        if let Some(value) = lookup_bool(&lookup, ENV_STOP_WHEN_FOUND) {
            self.match_options.stop_when_found = value;
        }
        if let Some(value) = lookup_bool(&lookup, ENV_ACCEPT_ZERO_WITH_MAX_CANDIDATES) {
            self.match_options.accept_zero_with_max_candidates = value;
        }

        if let Some(raw) = lookup(ENV_IMPORT_SOURCES) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                match serde_json::from_str::<IndexMap<String, String>>(trimmed) {
                    Ok(sources) => self.import_sources = sources,
                    Err(err) => {
                        tracing::warn!("invalid {ENV_IMPORT_SOURCES}, ignoring: {err}");
                    },
                }
            }
        }
    }
}

fn lookup_bool<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        "" => None,
        other => {
            tracing::warn!("invalid {key} value '{other}', ignoring");
            None
        },
    }
}

fn default_true() -> bool {
    true
}
