//! Structured error handling for the reasoner
//!
//! Provides a single error type with:
//! - Error codes for programmatic handling
//! - JSON serialisation for the CLI's machine-readable output
//! - Context preservation through error chains
//! - Process exit code mapping
//!
//! # Error Categories
//!
//! - Parse errors (1xxx) - graph patterns, binding sets, rule files
//! - Rule errors (2xxx) - invalid rule construction, unknown rules
//! - Plan errors (3xxx) - querying a plan in the wrong state
//! - Handler errors (4xxx) - binding-set handler failures
//! - Validation errors (5xxx) - bad input to public operations
//! - Config errors (7xxx)
//! - Internal errors (9xxx)
//!
//! # Example
//!
//! ```rust,ignore
//! use ke_reasoner::error::{ReasonerError, ErrorCode};
//!
//! fn check_goal(goal: &str) -> Result<(), ReasonerError> {
//!     if goal.is_empty() {
//!         return Err(ReasonerError::empty_input("goal")
//!             .with_hint("Pass a graph pattern such as '?s <type> <Sensor>'"));
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::ParseError;

// ============================================================================
// Error Codes
// ============================================================================

/// Unique error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Parse errors (1xxx)
    /// Generic parse error
    ParseError = 1000,
    /// Invalid graph pattern syntax
    InvalidPattern = 1001,
    /// Invalid binding set syntax
    InvalidBindingSet = 1002,
    /// Invalid rule file
    InvalidRuleFile = 1003,
    /// Prefix used without a declaration
    UndefinedPrefix = 1004,
    /// Unexpected end of input
    UnexpectedEof = 1005,

    // Rule errors (2xxx)
    /// Generic rule error
    RuleError = 2000,
    /// Antecedent and consequent both empty
    EmptyRule = 2001,
    /// No handler suitable for the rule's shape
    MissingHandler = 2002,
    /// Rule id not present in the store
    UnknownRule = 2003,

    // Plan errors (3xxx)
    /// Generic plan error
    PlanError = 3000,
    /// Results requested from a forward plan
    NotBackwardPlan = 3001,
    /// Results requested before the start node is available
    PlanNotFinished = 3002,
    /// A handler failed and its node will never complete
    PlanStalled = 3003,

    // Handler errors (4xxx)
    /// Generic handler error
    HandlerError = 4000,
    /// Consequent variable not bound by the antecedent
    MissingVariable = 4001,
    /// Malformed handler table
    InvalidTable = 4002,

    // Validation errors (5xxx)
    /// Generic validation error
    ValidationError = 5000,
    /// Empty input
    EmptyInput = 5001,
    /// Invalid value
    InvalidValue = 5002,
    /// Invalid format
    InvalidFormat = 5003,

    // Config errors (7xxx)
    /// Generic config error
    ConfigError = 7000,
    /// Config file not found
    ConfigNotFound = 7001,
    /// Invalid config syntax
    InvalidConfigSyntax = 7002,
    /// Unknown profile
    UnknownProfile = 7003,
    /// Invalid config value
    InvalidConfigValue = 7004,

    // Internal errors (9xxx)
    /// Internal error
    InternalError = 9000,
    /// Unexpected state
    UnexpectedState = 9001,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a short description of the error code
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidPattern => "Invalid graph pattern",
            ErrorCode::InvalidBindingSet => "Invalid binding set",
            ErrorCode::InvalidRuleFile => "Invalid rule file",
            ErrorCode::UndefinedPrefix => "Undefined prefix",
            ErrorCode::UnexpectedEof => "Unexpected end of input",

            ErrorCode::RuleError => "Rule error",
            ErrorCode::EmptyRule => "Rule has no antecedent and no consequent",
            ErrorCode::MissingHandler => "Missing binding set handler",
            ErrorCode::UnknownRule => "Unknown rule",

            ErrorCode::PlanError => "Plan error",
            ErrorCode::NotBackwardPlan => "Plan is not a backward plan",
            ErrorCode::PlanNotFinished => "Plan has not finished",
            ErrorCode::PlanStalled => "Plan stalled on a failed handler",

            ErrorCode::HandlerError => "Handler error",
            ErrorCode::MissingVariable => "Variable not available to handler",
            ErrorCode::InvalidTable => "Invalid handler table",

            ErrorCode::ValidationError => "Validation error",
            ErrorCode::EmptyInput => "Empty input",
            ErrorCode::InvalidValue => "Invalid value",
            ErrorCode::InvalidFormat => "Invalid format",

            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::ConfigNotFound => "Configuration file not found",
            ErrorCode::InvalidConfigSyntax => "Invalid configuration syntax",
            ErrorCode::UnknownProfile => "Unknown profile",
            ErrorCode::InvalidConfigValue => "Invalid configuration value",

            ErrorCode::InternalError => "Internal error",
            ErrorCode::UnexpectedState => "Unexpected state",
        }
    }

    /// Category name derived from the code group
    pub fn category(&self) -> &'static str {
        match self.code() / 1000 {
            1 => "parse",
            2 => "rule",
            3 => "plan",
            4 => "handler",
            5 => "validation",
            7 => "config",
            _ => "internal",
        }
    }

    /// Process exit code used by the command line tool
    pub fn exit_code(&self) -> i32 {
        match self.code() / 1000 {
            1 | 5 => 2,
            2 | 7 => 3,
            3 | 4 => 4,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// Error Context
// ============================================================================

/// Additional context information for an error
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Key-value pairs of context information
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    /// Source location (file:line)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Stack of error causes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type of the reasoner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerError {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
    /// Hint for resolving the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ReasonerError {
    /// Create a new error with a code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
        }
    }

    // ========================================================================
    // Factory methods for common error types
    // ========================================================================

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    pub fn rule(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RuleError, message)
    }

    /// A rule with neither antecedent nor consequent
    pub fn empty_rule() -> Self {
        Self::new(
            ErrorCode::EmptyRule,
            "The antecedent and consequent of a rule cannot both be empty",
        )
    }

    pub fn unknown_rule(id: usize) -> Self {
        Self::new(ErrorCode::UnknownRule, format!("No rule with id {} in the store", id))
    }

    pub fn plan(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PlanError, message)
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::HandlerError, message)
    }

    /// A consequent variable the trivial handler cannot fill in
    pub fn missing_variable(variable: &str) -> Self {
        Self::new(
            ErrorCode::MissingVariable,
            "Not all variables in the consequent are available in the antecedent of the rule. \
             This type of rule should use a custom handler",
        )
        .with_context("variable", variable)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn empty_input(field: &str) -> Self {
        Self::new(ErrorCode::EmptyInput, format!("{} cannot be empty", field))
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Set the error code
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::new);
        ctx.fields.insert(key.into(), value.into());
        self
    }

    /// Add a cause to the error chain
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::new);
        ctx.causes.push(cause.into());
        self
    }

    /// Add source location
    pub fn at(mut self, location: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::new);
        ctx.location = Some(location.into());
        self
    }

    /// Add a hint for resolving the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }

    /// Look up a context field
    pub fn context_field(&self, key: &str) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(|c| c.fields.get(key))
            .map(String::as_str)
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":"INTERNAL_ERROR","message":"{}"}}"#, self.message)
        })
    }

    /// Convert to pretty JSON string
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

impl fmt::Display for ReasonerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)?;

        if let Some(ref ctx) = self.context {
            if let Some(ref loc) = ctx.location {
                write!(f, " at {}", loc)?;
            }
            if !ctx.causes.is_empty() {
                write!(f, "\nCaused by:")?;
                for cause in &ctx.causes {
                    write!(f, "\n  - {}", cause)?;
                }
            }
        }

        if let Some(ref hint) = self.hint {
            write!(f, "\nHint: {}", hint)?;
        }

        Ok(())
    }
}

impl std::error::Error for ReasonerError {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<ParseError> for ReasonerError {
    fn from(err: ParseError) -> Self {
        let code = match &err {
            ParseError::Syntax { .. } => ErrorCode::InvalidPattern,
            ParseError::UndefinedPrefix { .. } => ErrorCode::UndefinedPrefix,
            ParseError::InvalidRule { .. } => ErrorCode::InvalidRuleFile,
            ParseError::UnexpectedEof => ErrorCode::UnexpectedEof,
        };
        ReasonerError::new(code, err.to_string())
    }
}

impl From<std::io::Error> for ReasonerError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let code = match err.kind() {
            ErrorKind::NotFound => ErrorCode::ConfigNotFound,
            ErrorKind::InvalidData | ErrorKind::InvalidInput => ErrorCode::InvalidFormat,
            _ => ErrorCode::InternalError,
        };
        ReasonerError::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for ReasonerError {
    fn from(err: serde_json::Error) -> Self {
        ReasonerError::parse(err.to_string())
            .with_code(ErrorCode::InvalidFormat)
            .with_context("format", "JSON")
    }
}

impl From<toml::de::Error> for ReasonerError {
    fn from(err: toml::de::Error) -> Self {
        ReasonerError::config(err.to_string()).with_code(ErrorCode::InvalidConfigSyntax)
    }
}

// ============================================================================
// Result type alias
// ============================================================================

/// A Result type using ReasonerError
pub type ReasonerResult<T> = Result<T, ReasonerError>;

// ============================================================================
// Macros for convenient error creation
// ============================================================================

/// Create a ReasonerError with context from the current location
#[macro_export]
macro_rules! reasoner_error {
    ($code:expr, $msg:expr) => {
        $crate::error::ReasonerError::new($code, $msg)
            .at(format!("{}:{}", file!(), line!()))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::ReasonerError::new($code, format!($fmt, $($arg)*))
            .at(format!("{}:{}", file!(), line!()))
    };
}

/// Bail out early with an error
#[macro_export]
macro_rules! reasoner_bail {
    ($code:expr, $msg:expr) => {
        return Err($crate::reasoner_error!($code, $msg))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::reasoner_error!($code, $fmt, $($arg)*))
    };
}

/// Ensure a condition holds, or return an error
#[macro_export]
macro_rules! reasoner_ensure {
    ($cond:expr, $code:expr, $msg:expr) => {
        if !$cond {
            $crate::reasoner_bail!($code, $msg);
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::reasoner_bail!($code, $fmt, $($arg)*);
        }
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ReasonerError::validation("test error");
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "test error");
    }

    #[test]
    fn test_error_with_context() {
        let err = ReasonerError::parse("syntax error")
            .with_context("line", "42")
            .with_context("column", "10");

        assert_eq!(err.context_field("line"), Some("42"));
        assert_eq!(err.context_field("column"), Some("10"));
        assert_eq!(err.context_field("missing"), None);
    }

    #[test]
    fn test_error_with_cause_and_hint() {
        let err = ReasonerError::handler("remote peer failed")
            .with_cause("connection reset")
            .with_hint("Retry the query");

        let ctx = err.context.as_ref().unwrap();
        assert_eq!(ctx.causes.len(), 1);
        assert_eq!(err.hint.as_deref(), Some("Retry the query"));
    }

    #[test]
    fn test_error_display() {
        let err = ReasonerError::parse("syntax error")
            .at("rules.txt:3")
            .with_cause("unexpected token")
            .with_hint("Check your syntax");

        let display = err.to_string();
        assert!(display.starts_with("[1000] syntax error at rules.txt:3"));
        assert!(display.contains("Caused by:\n  - unexpected token"));
        assert!(display.ends_with("Hint: Check your syntax"));
    }

    #[test]
    fn test_error_to_json() {
        let err = ReasonerError::empty_rule();
        let json = err.to_json();
        assert!(json.contains("EMPTY_RULE"));
        assert!(json.contains("cannot both be empty"));
    }

    #[test]
    fn test_categories_and_exit_codes() {
        assert_eq!(ErrorCode::InvalidPattern.category(), "parse");
        assert_eq!(ErrorCode::PlanStalled.category(), "plan");
        assert_eq!(ErrorCode::UnexpectedState.category(), "internal");
        assert_eq!(ErrorCode::InvalidPattern.exit_code(), 2);
        assert_eq!(ErrorCode::EmptyRule.exit_code(), 3);
        assert_eq!(ErrorCode::MissingVariable.exit_code(), 4);
    }

    #[test]
    fn test_missing_variable_names_the_variable() {
        let err = ReasonerError::missing_variable("z");
        assert_eq!(err.code, ErrorCode::MissingVariable);
        assert_eq!(err.context_field("variable"), Some("z"));
        assert!(err.message.contains("custom handler"));
    }

    #[test]
    fn test_from_parse_error() {
        let err: ReasonerError = ParseError::UndefinedPrefix { prefix: "ex".to_string() }.into();
        assert_eq!(err.code, ErrorCode::UndefinedPrefix);
    }

    #[test]
    fn test_macros_record_location() {
        fn fails() -> ReasonerResult<()> {
            reasoner_ensure!(1 + 1 == 3, ErrorCode::InvalidValue, "math is {}", "broken");
            Ok(())
        }
        let err = fails().unwrap_err();
        assert_eq!(err.message, "math is broken");
        let location = err.context.and_then(|c| c.location).unwrap();
        assert!(location.contains("error.rs"));
    }
}
