//! Configuration types for agent-warden
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::access_control::{Combinator, OperationKind, ToolKind};
use serde::Deserialize;
use std::collections::HashMap;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Evaluator tuning
    pub evaluator: EvaluatorConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Agents and the tools (with their access patterns) they own
    pub agents: HashMap<String, AgentConfig>,

    /// Administrative override rules loaded at startup
    pub rules: Vec<RuleConfig>,
}

/// Evaluator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Number of audit entries retained
    pub audit_capacity: usize,

    /// Upper bound on one pattern validation, in milliseconds
    pub predicate_timeout_ms: Option<u64>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            audit_capacity: crate::access_control::AUDIT_LOG_CAPACITY,
            predicate_timeout_ms: None,
        }
    }
}

/// Agent definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub tools: Vec<ToolConfig>,
}

/// Tool granted to an agent
#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    pub name: String,

    pub kind: ToolKind,

    /// Operations this tool can handle (capability check)
    #[serde(default)]
    pub operations: Vec<OperationKind>,

    /// Access patterns governing the tool's use
    #[serde(default)]
    pub patterns: Vec<PatternConfig>,
}

/// Declarative access pattern
///
/// Custom patterns are code-only and have no configuration form.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternConfig {
    FileSystem(PathPatternConfig),
    Table(PathPatternConfig),
    Endpoint(PathPatternConfig),
    Composite(CompositePatternConfig),
    TimeGated(TimeGatedPatternConfig),
}

impl PatternConfig {
    pub fn id(&self) -> &str {
        match self {
            PatternConfig::FileSystem(p) | PatternConfig::Table(p) | PatternConfig::Endpoint(p) => {
                &p.id
            }
            PatternConfig::Composite(p) => &p.id,
            PatternConfig::TimeGated(p) => &p.id,
        }
    }
}

/// Glob-based pattern (file system, table or endpoint)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathPatternConfig {
    pub id: String,
    pub description: String,
    pub priority: i32,
    pub globs: Vec<String>,
    pub allow: bool,
    /// Restrict to these operations (all when absent)
    pub operations: Option<Vec<OperationKind>>,
}

/// AND/OR combination of child patterns
#[derive(Debug, Clone, Deserialize)]
pub struct CompositePatternConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i32,
    pub combinator: Combinator,
    pub children: Vec<PatternConfig>,
}

/// Hour window wrapped around a base pattern
#[derive(Debug, Clone, Deserialize)]
pub struct TimeGatedPatternConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to the base pattern's priority
    #[serde(default)]
    pub priority: Option<i32>,
    pub start_hour: u32,
    pub end_hour: u32,
    /// Weekday names ("mon", "tuesday", ...); every day when absent
    #[serde(default)]
    pub weekdays: Option<Vec<String>>,
    /// Offset from UTC the window is evaluated in
    #[serde(default)]
    pub utc_offset_minutes: i32,
    pub base: Box<PatternConfig>,
}

/// Administrative rule
///
/// Operations and tools are kept as names here and resolved when the rule is
/// registered, so an unknown name is reported against the rule id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub id: String,
    pub description: String,
    /// Agent id or "*"
    pub agent: String,
    /// Resource glob
    pub resource: String,
    pub operations: Vec<String>,
    pub tools: Option<Vec<String>>,
    pub allow: bool,
    pub priority: i32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
