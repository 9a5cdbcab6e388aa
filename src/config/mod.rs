//! Configuration for ke-reasoner
//!
//! Provides a layered configuration system supporting:
//! - TOML configuration files
//! - Environment variable overrides
//! - Named reasoning profiles (built-in and user-defined)
//!
//! # Configuration File Locations
//!
//! Configuration files are searched in order (first found wins):
//! 1. `./ke-reasoner.toml` - Project-local configuration
//! 2. `~/.config/ke-reasoner/config.toml` - User configuration (XDG)
//! 3. `~/.ke-reasoner/config.toml` - User configuration (legacy)
//! 4. `/etc/ke-reasoner/config.toml` - System-wide configuration
//!
//! # Environment Variables
//!
//! - `KE_REASONER_PROFILE` - Reasoning profile (default, strict, exhaustive, debug)
//! - `KE_REASONER_MATCH_STRATEGY` - Match strategy (all, biggest, full)
//! - `KE_REASONER_TASK_BOARD` - Dispatch handlers through the task board (true/false)
//! - `KE_REASONER_LARGE_BINDING_SET_WARNING` - Warn above this many combined bindings
//! - `KE_REASONER_LOG_LEVEL` - Logging verbosity (quiet, normal, verbose, debug)
//! - `KE_REASONER_FORMAT` - Output format (text, json)
//!
//! # Example Configuration
//!
//! ```toml
//! [general]
//! format = "text"
//! log_level = "normal"
//!
//! [reasoning]
//! profile = "default"
//! match_strategy = "biggest"
//! use_task_board = true
//! large_binding_set_warning = 300000
//!
//! [prefixes]
//! ex = "http://example.org/"
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::binding::DEFAULT_LARGE_BINDING_SET_WARNING;
use crate::error::{ErrorCode, ReasonerError};
use crate::matching::MatchStrategy;
use crate::parser::ParserState;
use crate::reasoner::PlanOptions;

// ============================================================================
// Configuration Schema
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReasonerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Reasoning settings
    pub reasoning: ReasoningConfig,
    /// Extra prefixes for patterns, bindings and rule files
    pub prefixes: BTreeMap<String, String>,
    /// User-defined profiles
    pub profiles: BTreeMap<String, ProfileConfig>,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Output format for results
    pub format: OutputFormat,
    /// Logging level
    pub log_level: LogLevel,
}

/// Reasoning configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Profile the settings below were derived from
    pub profile: ReasoningProfile,
    /// How rule patterns are matched against each other
    pub match_strategy: MatchStrategy,
    /// Queue handler calls; `false` runs them inline
    pub use_task_board: bool,
    /// Warn when combining binding sets produces more than this many bindings
    pub large_binding_set_warning: usize,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            profile: ReasoningProfile::Default,
            match_strategy: MatchStrategy::FindOnlyBiggestMatches,
            use_task_board: true,
            large_binding_set_warning: DEFAULT_LARGE_BINDING_SET_WARNING,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProfileConfig {
    pub match_strategy: Option<MatchStrategy>,
    pub use_task_board: Option<bool>,
    pub large_binding_set_warning: Option<usize>,
    pub log_level: Option<LogLevel>,
    /// Additional prefixes for this profile
    pub prefixes: BTreeMap<String, String>,
    /// Description of the profile
    pub description: Option<String>,
}

// ============================================================================
// Enums
// ============================================================================

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "plain" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Log level options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiet" | "q" | "0" => Some(LogLevel::Quiet),
            "normal" | "n" | "1" => Some(LogLevel::Normal),
            "verbose" | "v" | "2" => Some(LogLevel::Verbose),
            "debug" | "d" | "3" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    /// The `tracing` filter directive for this level
    pub fn filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "error",
            LogLevel::Normal => "warn",
            LogLevel::Verbose => "info",
            LogLevel::Debug => "debug",
        }
    }
}

/// Reasoning profile presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningProfile {
    /// Biggest matches, task board dispatch
    #[default]
    Default,
    /// Only rules whose patterns line up completely
    Strict,
    /// Every partial match, maximal or not
    Exhaustive,
    /// Inline handlers and debug logging
    Debug,
    /// Custom profile (use profiles section)
    Custom,
}

impl ReasoningProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningProfile::Default => "default",
            ReasoningProfile::Strict => "strict",
            ReasoningProfile::Exhaustive => "exhaustive",
            ReasoningProfile::Debug => "debug",
            ReasoningProfile::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "default" | "" => Some(ReasoningProfile::Default),
            "strict" | "full" => Some(ReasoningProfile::Strict),
            "exhaustive" | "all" => Some(ReasoningProfile::Exhaustive),
            "debug" => Some(ReasoningProfile::Debug),
            "custom" => Some(ReasoningProfile::Custom),
            _ => None,
        }
    }

    /// The match strategy this profile selects
    pub fn match_strategy(&self) -> MatchStrategy {
        match self {
            ReasoningProfile::Strict => MatchStrategy::FindOnlyFullMatches,
            ReasoningProfile::Exhaustive => MatchStrategy::FindAllMatches,
            _ => MatchStrategy::FindOnlyBiggestMatches,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ReasoningProfile::Default => "Biggest matches, handlers dispatched through the task board",
            ReasoningProfile::Strict => "Only chain rules whose patterns match completely",
            ReasoningProfile::Exhaustive => "Chain over every partial match",
            ReasoningProfile::Debug => "Inline handler calls with debug logging",
            ReasoningProfile::Custom => "User-defined profile",
        }
    }
}

// ============================================================================
// Configuration Loading
// ============================================================================

impl ReasonerConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the first existing config file, then apply
    /// environment variable overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for path in Self::config_paths() {
            if path.exists() {
                config = Self::load_from_file(&path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.clone(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(path.clone(), e.to_string()))
    }

    /// Load configuration from a TOML string
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(PathBuf::from("<string>"), e.to_string()))
    }

    /// Get the list of config file search paths
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./ke-reasoner.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("ke-reasoner").join("config.toml"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".ke-reasoner").join("config.toml"));
        }

        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/ke-reasoner/config.toml"));

        paths
    }

    /// Apply `KE_REASONER_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // the profile goes first so the individual settings can refine it
        if let Ok(val) = env::var("KE_REASONER_PROFILE") {
            self.apply_profile(&val)?;
        }

        if let Ok(val) = env::var("KE_REASONER_MATCH_STRATEGY") {
            self.reasoning.match_strategy = MatchStrategy::from_str(&val)
                .ok_or_else(|| ConfigError::InvalidValue("KE_REASONER_MATCH_STRATEGY".to_string(), val))?;
        }

        if let Ok(val) = env::var("KE_REASONER_TASK_BOARD") {
            self.reasoning.use_task_board = val == "true" || val == "1" || val == "yes";
        }

        if let Ok(val) = env::var("KE_REASONER_LARGE_BINDING_SET_WARNING") {
            self.reasoning.large_binding_set_warning = val.parse::<usize>().map_err(|_| {
                ConfigError::InvalidValue("KE_REASONER_LARGE_BINDING_SET_WARNING".to_string(), val)
            })?;
        }

        if let Ok(val) = env::var("KE_REASONER_LOG_LEVEL") {
            if let Some(level) = LogLevel::from_str(&val) {
                self.general.log_level = level;
            }
        }

        if let Ok(val) = env::var("KE_REASONER_FORMAT") {
            if let Some(format) = OutputFormat::from_str(&val) {
                self.general.format = format;
            }
        }

        Ok(())
    }

    /// Apply a named profile's settings
    pub fn apply_profile(&mut self, name: &str) -> Result<(), ConfigError> {
        if let Some(profile) = ReasoningProfile::from_str(name) {
            if profile != ReasoningProfile::Custom {
                self.reasoning.profile = profile;
                self.reasoning.match_strategy = profile.match_strategy();
                self.reasoning.use_task_board = profile != ReasoningProfile::Debug;
                if profile == ReasoningProfile::Debug {
                    self.general.log_level = LogLevel::Debug;
                }
                return Ok(());
            }
        }

        if let Some(custom) = self.profiles.get(name).cloned() {
            self.reasoning.profile = ReasoningProfile::Custom;
            if let Some(strategy) = custom.match_strategy {
                self.reasoning.match_strategy = strategy;
            }
            if let Some(use_task_board) = custom.use_task_board {
                self.reasoning.use_task_board = use_task_board;
            }
            if let Some(threshold) = custom.large_binding_set_warning {
                self.reasoning.large_binding_set_warning = threshold;
            }
            if let Some(level) = custom.log_level {
                self.general.log_level = level;
            }
            self.prefixes.extend(custom.prefixes);
            return Ok(());
        }

        Err(ConfigError::UnknownProfile(name.to_string()))
    }

    /// Plan options derived from the reasoning section
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            strategy: self.reasoning.match_strategy,
            use_task_board: self.reasoning.use_task_board,
            large_binding_set_warning: self.reasoning.large_binding_set_warning,
        }
    }

    /// Parser state with the standard prefixes plus the configured ones
    pub fn parser_state(&self) -> ParserState {
        ParserState::with_prefixes(self.prefixes.iter())
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Write configuration to a file
    pub fn save_to_file(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        fs::write(path, content).map_err(|e| ConfigError::IoError(path.clone(), e.to_string()))
    }

    /// Generate a default configuration file content
    pub fn default_config_content() -> &'static str {
        r#"# ke-reasoner configuration file

[general]
# Result output format: text, json
format = "text"
# Logging level: quiet, normal, verbose, debug
log_level = "normal"

[reasoning]
# Profile: default, strict, exhaustive, debug
profile = "default"
# Match strategy: all, biggest, full
match_strategy = "biggest"
# Dispatch handlers through the task board (false calls them inline)
use_task_board = true
# Warn when combining binding sets produces more bindings than this
large_binding_set_warning = 300000

[prefixes]
# ex = "http://example.org/"
# saref = "https://saref.etsi.org/core/"

# Custom profiles can be defined like this:
# [profiles.sensors]
# match_strategy = "full"
# use_task_board = false
# description = "Sensor rules only chain on complete matches"
# [profiles.sensors.prefixes]
# s = "http://example.org/sensors#"
"#
    }

    /// List all available profiles
    pub fn available_profiles(&self) -> Vec<(&str, &str)> {
        let mut profiles = vec![
            ("default", ReasoningProfile::Default.description()),
            ("strict", ReasoningProfile::Strict.description()),
            ("exhaustive", ReasoningProfile::Exhaustive.description()),
            ("debug", ReasoningProfile::Debug.description()),
        ];

        for (name, config) in &self.profiles {
            let desc = config.description.as_deref().unwrap_or("Custom profile");
            profiles.push((name.as_str(), desc));
        }

        profiles
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// IO error reading/writing config file
    IoError(PathBuf, String),
    /// Parse error in config file
    ParseError(PathBuf, String),
    /// Serialization error
    SerializeError(String),
    /// Unknown profile name
    UnknownProfile(String),
    /// A setting that could not be interpreted
    InvalidValue(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, msg) => {
                write!(f, "IO error reading {}: {}", path.display(), msg)
            }
            ConfigError::ParseError(path, msg) => {
                write!(f, "Parse error in {}: {}", path.display(), msg)
            }
            ConfigError::SerializeError(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            ConfigError::UnknownProfile(name) => {
                write!(f, "Unknown profile: {}", name)
            }
            ConfigError::InvalidValue(key, value) => {
                write!(f, "Invalid value for {}: {}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for ReasonerError {
    fn from(err: ConfigError) -> Self {
        let code = match &err {
            ConfigError::IoError(..) => ErrorCode::ConfigNotFound,
            ConfigError::ParseError(..) | ConfigError::SerializeError(_) => ErrorCode::InvalidConfigSyntax,
            ConfigError::UnknownProfile(_) => ErrorCode::UnknownProfile,
            ConfigError::InvalidValue(..) => ErrorCode::InvalidConfigValue,
        };
        let mut error = ReasonerError::config(err.to_string()).with_code(code);
        if let ConfigError::IoError(path, _) | ConfigError::ParseError(path, _) = &err {
            error = error.with_context("path", path.display().to_string());
        }
        error
    }
}

// ============================================================================
// Tests
// ============================================================================
