// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine_core::constants::{config as env_names, defaults};
use crate::engine_core::errors::PipelineError;
use crate::engine_core::models::EnforcementMode;

/// Configuration the core reads; loading and persistence belong to the
/// embedding layer. Resolution order: defaults, then a YAML file if
/// `TOOLGATE_CONFIG_YAML_PATH` points at one, then env var overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub mode: EnforcementMode,
    pub require_member_verification: bool,
    pub extra_whitelist: HashSet<String>,
    pub cache_ttl_hours: u64,
    pub max_cache_entries: usize,
    pub max_lookup_concurrency: usize,
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    pub fn from_env() -> Result<Self, PipelineError> {
        let mut config = match env::var(env_names::ENV_CONFIG_YAML_PATH) {
            Ok(path) => Self::from_yaml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(v) = env::var(env_names::ENV_ENABLED) {
            config.enabled = parse_bool(&v);
        }
        if let Ok(v) = env::var(env_names::ENV_MODE) {
            config.mode = EnforcementMode::parse_safe(&v);
        }
        if let Ok(v) = env::var(env_names::ENV_REQUIRE_MEMBERS) {
            config.require_member_verification = parse_bool(&v);
        }
        if let Ok(v) = env::var(env_names::ENV_EXTRA_WHITELIST) {
            config.extra_whitelist = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var(env_names::ENV_CACHE_TTL_HOURS) {
            if let Ok(hours) = v.parse() {
                config.cache_ttl_hours = hours;
            }
        }
        if let Ok(v) = env::var(env_names::ENV_MAX_CACHE_ENTRIES) {
            if let Ok(n) = v.parse() {
                config.max_cache_entries = n;
            }
        }
        if let Ok(v) = env::var(env_names::ENV_LOG_LEVEL) {
            config.log_level = v;
        }
        if let Ok(v) = env::var(env_names::ENV_LOG_FORMAT) {
            config.log_format = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "cannot read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_yaml_ng::from_str(&raw).map_err(|e| {
            PipelineError::Configuration(format!(
                "invalid config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Reject values no deployment can mean. Runs before any invocation.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.cache_ttl_hours == 0 {
            return Err(PipelineError::Configuration(
                "cache_ttl_hours must be positive".to_string(),
            ));
        }
        if self.max_cache_entries == 0 {
            return Err(PipelineError::Configuration(
                "max_cache_entries must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: EnforcementMode::Warning,
            require_member_verification: false,
            extra_whitelist: HashSet::new(),
            cache_ttl_hours: defaults::CACHE_TTL_HOURS,
            max_cache_entries: defaults::MAX_CACHE_ENTRIES,
            max_lookup_concurrency: defaults::MAX_LOOKUP_CONCURRENCY,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane_and_valid() {
        let config = Config::default();
        assert!(config.enabled);
        assert_eq!(config.mode, EnforcementMode::Warning);
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_ttl(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn validation_rejects_zero_knobs() {
        let config = Config {
            cache_ttl_hours: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));

        let config = Config {
            max_cache_entries: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_overlay_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "mode: strict\nrequire_member_verification: true\ncache_ttl_hours: 6\nextra_whitelist: [Widget, Gadget]"
        )
        .unwrap();

        let config = Config::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.mode, EnforcementMode::Strict);
        assert!(config.require_member_verification);
        assert_eq!(config.cache_ttl_hours, 6);
        assert!(config.extra_whitelist.contains("Widget"));
        // Unspecified fields keep defaults.
        assert_eq!(config.max_cache_entries, defaults::MAX_CACHE_ENTRIES);
    }

    #[test]
    fn missing_yaml_file_is_a_configuration_error() {
        let err = Config::from_yaml_file(Path::new("/nonexistent/toolgate.yaml")).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn bool_parsing_is_lenient() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("YES"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("junk"));
    }
}
