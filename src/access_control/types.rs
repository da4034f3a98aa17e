//! Access control types
//!
//! Core value types shared by patterns, rules, the evaluator and the audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Kind of operation an agent asks to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Read a resource
    Read,
    /// Modify part of an existing resource
    Edit,
    /// Create or overwrite a resource
    Write,
    /// Remove a resource
    Delete,
    /// Ask another agent a question (no resource)
    Question,
    /// Run a command or trigger an action
    Execute,
}

impl OperationKind {
    /// Get the operation name as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Edit => "edit",
            OperationKind::Write => "write",
            OperationKind::Delete => "delete",
            OperationKind::Question => "question",
            OperationKind::Execute => "execute",
        }
    }

    /// Try to parse an operation from a string
    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(OperationKind::Read),
            "edit" => Some(OperationKind::Edit),
            "write" => Some(OperationKind::Write),
            "delete" => Some(OperationKind::Delete),
            "question" => Some(OperationKind::Question),
            "execute" => Some(OperationKind::Execute),
            _ => None,
        }
    }

    /// Get all operations
    pub fn all() -> &'static [OperationKind] {
        &[
            OperationKind::Read,
            OperationKind::Edit,
            OperationKind::Write,
            OperationKind::Delete,
            OperationKind::Question,
            OperationKind::Execute,
        ]
    }

    /// Check if this operation modifies data
    pub const fn is_mutating(&self) -> bool {
        matches!(
            self,
            OperationKind::Edit | OperationKind::Write | OperationKind::Delete
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The known tool vocabulary
///
/// Rules may restrict themselves to agents owning a tool of one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    FileSystem,
    Database,
    Api,
    Shell,
    Question,
}

impl ToolKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ToolKind::FileSystem => "file_system",
            ToolKind::Database => "database",
            ToolKind::Api => "api",
            ToolKind::Shell => "shell",
            ToolKind::Question => "question",
        }
    }

    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "file_system" => Some(ToolKind::FileSystem),
            "database" => Some(ToolKind::Database),
            "api" => Some(ToolKind::Api),
            "shell" => Some(ToolKind::Shell),
            "question" => Some(ToolKind::Question),
            _ => None,
        }
    }

    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::FileSystem,
            ToolKind::Database,
            ToolKind::Api,
            ToolKind::Shell,
            ToolKind::Question,
        ]
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One authorization request
///
/// Built once with the consuming `with_*` methods, then only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessContext {
    resource: String,
    operation: OperationKind,
    requester: String,
    timestamp: DateTime<Utc>,
    metadata: HashMap<String, Value>,
}

impl AccessContext {
    /// Create a context stamped with the current time
    pub fn new(
        resource: impl Into<String>,
        operation: OperationKind,
        requester: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            operation,
            requester: requester.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Override the request time
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

/// Outcome of a pattern, a rule or a whole evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: String,
    /// Id of the pattern or rule that produced this decision
    pub source: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl AccessDecision {
    pub fn allow(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            source: source.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn deny(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            source: source.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn new(allowed: bool, source: impl Into<String>, reason: impl Into<String>) -> Self {
        if allowed {
            Self::allow(source, reason)
        } else {
            Self::deny(source, reason)
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn is_denied(&self) -> bool {
        !self.allowed
    }
}
