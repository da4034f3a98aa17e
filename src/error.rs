//! Error types for agent-warden
//!
//! This module defines the error types used throughout the crate.
//! We use `thiserror` for library-style errors that are part of the API.
//! Authorization outcomes are never errors: a denial is an
//! [`AccessDecision`](crate::access_control::AccessDecision), and only
//! configuration faults surface as `Err`. Pattern and rule errors fold into
//! [`ConfigError`] when they come from a configuration file.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Errors raised while constructing an access pattern
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("glob pattern must not be empty")]
    EmptyGlob,

    #[error("glob '{glob}' could not be compiled: {reason}")]
    InvalidGlob { glob: String, reason: String },

    #[error("pattern id must not be empty")]
    MissingId,

    #[error("pattern '{id}' needs at least one glob")]
    NoGlobs { id: String },

    #[error("pattern '{id}' needs at least one child")]
    NoChildren { id: String },

    #[error("hour window {start}..{end} is out of range (start 0-23, end 0-24)")]
    InvalidWindow { start: u32, end: u32 },

    #[error("unknown weekday '{value}'")]
    InvalidWeekday { value: String },

    #[error("UTC offset of {minutes} minutes is out of range")]
    InvalidOffset { minutes: i32 },
}

impl From<PatternError> for ConfigError {
    fn from(err: PatternError) -> Self {
        ConfigError::Invalid {
            message: err.to_string(),
        }
    }
}

/// Rejections raised by `RuleRegistry::add`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleValidationError {
    #[error("rule id must not be empty")]
    MissingId,

    #[error("rule '{rule}' must name an agent id or '*'")]
    MissingAgent { rule: String },

    #[error("rule '{rule}' must have a resource pattern")]
    MissingResource { rule: String },

    #[error("rule '{rule}' must list at least one operation")]
    NoOperations { rule: String },

    #[error("rule '{rule}' has an invalid resource pattern: {source}")]
    InvalidResource {
        rule: String,
        #[source]
        source: PatternError,
    },

    #[error("rule '{rule}' restricts to an empty tool set and can never match")]
    EmptyTools { rule: String },

    #[error("rule '{rule}' names unknown tool kind '{tool}'")]
    UnknownTool { rule: String, tool: String },

    #[error("rule '{rule}' names unknown operation '{operation}'")]
    UnknownOperation { rule: String, operation: String },
}

impl From<RuleValidationError> for ConfigError {
    fn from(err: RuleValidationError) -> Self {
        ConfigError::Invalid {
            message: err.to_string(),
        }
    }
}

/// Failure of a caller-supplied predicate
///
/// Never returned to evaluator callers; the evaluator logs it and falls back
/// to the capability check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredicateError {
    #[error("predicate of pattern '{pattern}' failed: {message}")]
    Failed { pattern: String, message: String },

    #[error("predicate of pattern '{pattern}' timed out after {timeout_ms} ms")]
    TimedOut { pattern: String, timeout_ms: u64 },
}

impl PredicateError {
    pub fn failed(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}

/// Denial surfaced as an error by `PermissionEvaluator::require`
#[derive(Error, Debug, Clone)]
#[error("Access denied for agent '{agent}' ({operation} on {resource}): {reason}")]
pub struct AccessDeniedError {
    pub agent: String,
    pub operation: String,
    pub resource: String,
    pub reason: String,
}

impl AccessDeniedError {
    pub fn new(
        agent: impl Into<String>,
        operation: impl Into<String>,
        resource: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            agent: agent.into(),
            operation: operation.into(),
            resource: resource.unwrap_or("<capability>").to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for pattern validation
pub type PredicateResult<T> = std::result::Result<T, PredicateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_error_converts_to_config_error() {
        let err: ConfigError = RuleValidationError::NoOperations {
            rule: "r1".into(),
        }
        .into();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("r1"));
    }

    #[test]
    fn test_pattern_error_converts_to_config_error() {
        let err: ConfigError = PatternError::NoGlobs { id: "docs".into() }.into();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("docs"));
    }

    #[test]
    fn test_access_denied_capability_placeholder() {
        let err = AccessDeniedError::new("docs-agent", "question", None, "no capable tool");
        assert_eq!(err.resource, "<capability>");
        assert!(err.to_string().contains("docs-agent"));
    }

    #[test]
    fn test_predicate_error_messages() {
        let err = PredicateError::failed("critical-guard", "lookup failed");
        assert!(err.to_string().contains("critical-guard"));

        let err = PredicateError::TimedOut {
            pattern: "slow".into(),
            timeout_ms: 50,
        };
        assert!(err.to_string().contains("50 ms"));
    }
}
