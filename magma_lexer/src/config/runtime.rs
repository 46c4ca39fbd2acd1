// RUNTIME PREFERENCES (User Experience)
//
// Defaults come from MAGMA_* environment variables; a TOML file passed with
// `--config` overrides individual fields.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProcessorPreferences {
    /// Reject files that are not `.m` / `.mag`
    pub require_magma_extension: bool,

    /// Whether to log load timings
    pub enable_performance_logging: bool,
}

impl Default for FileProcessorPreferences {
    fn default() -> Self {
        Self {
            require_magma_extension: env_flag(env_vars::REQUIRE_MAGMA_EXTENSION, false),
            enable_performance_logging: env_flag(env_vars::ENABLE_PERFORMANCE_LOGGING, true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalPreferences {
    /// State the tokenizer starts in
    pub start_state: String,

    /// Whether to collect per-category counts and stack depth
    pub collect_detailed_metrics: bool,

    /// Whether to emit a warning event when fallback Error tokens were produced
    pub warn_on_unrecognized: bool,
}

impl Default for LexicalPreferences {
    fn default() -> Self {
        Self {
            start_state: env::var(env_vars::LEXICAL_START_STATE)
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "root".to_string()),
            collect_detailed_metrics: env_flag(env_vars::LEXICAL_DETAILED_METRICS, true),
            warn_on_unrecognized: env_flag(env_vars::LEXICAL_WARN_UNRECOGNIZED, true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingPreferences {
    /// Whether to use structured JSON logging
    pub use_structured_logging: bool,

    /// Minimum level written by the global logger
    pub min_log_level: LogLevel,

    /// Whether to attach durations to completion events
    pub log_performance_events: bool,
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            use_structured_logging: env_flag(env_vars::LOGGING_USE_STRUCTURED, false),
            min_log_level: env::var(env_vars::LOGGING_MIN_LEVEL)
                .ok()
                .and_then(|v| parse_log_level(&v))
                .unwrap_or(LogLevel::Warning),
            log_performance_events: env_flag(env_vars::LOGGING_LOG_PERFORMANCE, true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    #[serde(alias = "warn")]
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Convert to events::LogLevel for compatibility
    pub fn to_events_log_level(&self) -> crate::logging::events::LogLevel {
        match self {
            LogLevel::Error => crate::logging::events::LogLevel::Error,
            LogLevel::Warning => crate::logging::events::LogLevel::Warning,
            LogLevel::Info => crate::logging::events::LogLevel::Info,
            LogLevel::Debug => crate::logging::events::LogLevel::Debug,
        }
    }
}

/// Parse log level from string (used for environment variables and CLI flags)
pub fn parse_log_level(level: &str) -> Option<LogLevel> {
    match level.to_lowercase().as_str() {
        "error" | "0" => Some(LogLevel::Error),
        "warning" | "warn" | "1" => Some(LogLevel::Warning),
        "info" | "2" => Some(LogLevel::Info),
        "debug" | "3" => Some(LogLevel::Debug),
        _ => None,
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Error loading a user configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn error_code(&self) -> crate::logging::Code {
        crate::logging::codes::system::CONFIGURATION_ERROR
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub file_processor: FileProcessorPreferences,
    pub lexical: LexicalPreferences,
    pub logging: LoggingPreferences,
}

impl RuntimeConfig {
    /// Parse a TOML document; missing sections and fields keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

/// Environment variable names for configuration
pub mod env_vars {
    // File Processor
    pub const REQUIRE_MAGMA_EXTENSION: &str = "MAGMA_REQUIRE_MAGMA_EXTENSION";
    pub const ENABLE_PERFORMANCE_LOGGING: &str = "MAGMA_ENABLE_PERFORMANCE_LOGGING";

    // Lexical
    pub const LEXICAL_START_STATE: &str = "MAGMA_LEXICAL_START_STATE";
    pub const LEXICAL_DETAILED_METRICS: &str = "MAGMA_LEXICAL_DETAILED_METRICS";
    pub const LEXICAL_WARN_UNRECOGNIZED: &str = "MAGMA_LEXICAL_WARN_UNRECOGNIZED";

    // Logging
    pub const LOGGING_USE_STRUCTURED: &str = "MAGMA_LOGGING_USE_STRUCTURED";
    pub const LOGGING_MIN_LEVEL: &str = "MAGMA_LOGGING_MIN_LEVEL";
    pub const LOGGING_LOG_PERFORMANCE: &str = "MAGMA_LOGGING_LOG_PERFORMANCE";
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("error"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("ERROR"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("0"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("warn"), Some(LogLevel::Warning));
        assert_eq!(parse_log_level("warning"), Some(LogLevel::Warning));
        assert_eq!(parse_log_level("info"), Some(LogLevel::Info));
        assert_eq!(parse_log_level("debug"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level("3"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level("invalid"), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [lexical]
            start_state = "string"

            [logging]
            min_log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.lexical.start_state, "string");
        assert_eq!(config.logging.min_log_level, LogLevel::Debug);
        assert_eq!(
            config.file_processor.enable_performance_logging,
            FileProcessorPreferences::default().enable_performance_logging
        );
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let result = RuntimeConfig::from_toml_str("[logging]\nmin_log_level = \"loud\"\n");
        assert_matches!(result, Err(ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[file_processor]\nrequire_magma_extension = true").unwrap();

        let config = RuntimeConfig::load(file.path()).unwrap();
        assert!(config.file_processor.require_magma_extension);
    }

    #[test]
    fn test_load_missing_file() {
        let err = RuntimeConfig::load(Path::new("/nonexistent/magma.toml")).unwrap_err();
        assert_matches!(&err, ConfigError::Io { .. });
        assert_eq!(
            err.error_code(),
            crate::logging::codes::system::CONFIGURATION_ERROR
        );
    }
}
