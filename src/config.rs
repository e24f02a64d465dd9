//! TOML configuration for the FieldDispatch daemon.
//!
//! Layered configuration model with compiled-in defaults, environment
//! variable override for the config file path, and a standard filesystem
//! location.  Ranking weights live here rather than in the engine so that
//! deployments and tests can tune them without code changes.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ranking::UrgencyLevel;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the dispatch daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DispatchConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded dispatch configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path specified by the `FIELDDISPATCH_CONFIG` environment variable.
    /// 2. `/etc/fielddispatch/fielddispatch.toml`.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("FIELDDISPATCH_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "FIELDDISPATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new("/etc/fielddispatch/fielddispatch.toml");
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP listener and storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port for the API listener.
    pub bind: String,
    /// Path to the SQLite database holding rules and the dispatch log.
    pub db_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            db_path: "data/fielddispatch.db".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Weights and bonuses feeding the ranking calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Base score weight per urgency level.
    pub low_weight: i64,
    pub medium_weight: i64,
    pub high_weight: i64,
    pub critical_weight: i64,
    /// Flat bonus for jobs entering at high or critical urgency.
    pub urgency_bonus: i64,
    /// Flat bonus for premium vehicle makes.
    pub premium_make_bonus: i64,
    /// Vehicle makes that collect the premium bonus (case-sensitive).
    pub premium_makes: Vec<String>,
}

impl RankingConfig {
    /// The base score a job starts with, by input urgency.
    pub fn base_weight(&self, urgency: UrgencyLevel) -> i64 {
        match urgency {
            UrgencyLevel::Low => self.low_weight,
            UrgencyLevel::Medium => self.medium_weight,
            UrgencyLevel::High => self.high_weight,
            UrgencyLevel::Critical => self.critical_weight,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            low_weight: 1,
            medium_weight: 5,
            high_weight: 10,
            critical_weight: 20,
            urgency_bonus: 10,
            premium_make_bonus: 8,
            premium_makes: vec![
                "Audi".to_string(),
                "BMW".to_string(),
                "Mercedes-Benz".to_string(),
                "Porsche".to_string(),
                "Lexus".to_string(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = DispatchConfig::default();

        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.server.db_path, "data/fielddispatch.db");

        assert_eq!(cfg.ranking.base_weight(UrgencyLevel::Low), 1);
        assert_eq!(cfg.ranking.base_weight(UrgencyLevel::Medium), 5);
        assert_eq!(cfg.ranking.base_weight(UrgencyLevel::High), 10);
        assert_eq!(cfg.ranking.base_weight(UrgencyLevel::Critical), 20);
        assert_eq!(cfg.ranking.urgency_bonus, 10);
        assert_eq!(cfg.ranking.premium_make_bonus, 8);
        assert_eq!(cfg.ranking.premium_makes.len(), 5);
        assert!(cfg.ranking.premium_makes.contains(&"Audi".to_string()));

        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_parse_example_toml() {
        let toml_str = r#"
[server]
bind = "127.0.0.1:9090"
db_path = "/var/lib/fielddispatch/dispatch.db"

[ranking]
critical_weight = 40
urgency_bonus = 15
premium_makes = ["Bentley", "Rolls-Royce"]

[logging]
level = "debug"
"#;

        let cfg: DispatchConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.server.bind, "127.0.0.1:9090");
        assert_eq!(cfg.server.db_path, "/var/lib/fielddispatch/dispatch.db");
        assert_eq!(cfg.ranking.base_weight(UrgencyLevel::Critical), 40);
        assert_eq!(cfg.ranking.urgency_bonus, 15);
        assert_eq!(
            cfg.ranking.premium_makes,
            vec!["Bentley".to_string(), "Rolls-Royce".to_string()]
        );
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[server]
bind = "10.0.0.1:8080"
"#;

        let cfg: DispatchConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.server.bind, "10.0.0.1:8080");
        // Everything else should be defaults.
        assert_eq!(cfg.server.db_path, "data/fielddispatch.db");
        assert_eq!(cfg.ranking.base_weight(UrgencyLevel::Medium), 5);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let cfg: DispatchConfig = toml::from_str("").unwrap();
        let defaults = DispatchConfig::default();

        assert_eq!(cfg.server.bind, defaults.server.bind);
        assert_eq!(cfg.ranking.premium_makes, defaults.ranking.premium_makes);
        assert_eq!(cfg.logging.level, defaults.logging.level);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fielddispatch.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "0.0.0.0:9999"
"#,
        )
        .unwrap();

        let cfg = DispatchConfig::load(&path).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:9999");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = DispatchConfig::load(Path::new("/nonexistent/path/fielddispatch.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = DispatchConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let roundtripped: DispatchConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(cfg.server.bind, roundtripped.server.bind);
        assert_eq!(cfg.ranking.premium_makes, roundtripped.ranking.premium_makes);
        assert_eq!(cfg.ranking.urgency_bonus, roundtripped.ranking.urgency_bonus);
    }
}
