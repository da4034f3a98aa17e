//! Agents and the tools granted to them
//!
//! A [`Tool`] is a capability bundle: the operations it can handle plus the
//! access patterns governing its use. An [`Agent`] is an id and a set of
//! tools. The evaluator only reads them.

use crate::access_control::{AccessPattern, OperationKind, ToolKind};
use crate::config::{AgentConfig, ToolConfig};
use crate::error::PatternError;
use std::collections::BTreeSet;

/// Capability bundle granted to an agent
#[derive(Debug, Clone)]
pub struct Tool {
    name: String,
    kind: ToolKind,
    operations: BTreeSet<OperationKind>,
    patterns: Vec<AccessPattern>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        kind: ToolKind,
        operations: impl IntoIterator<Item = OperationKind>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            operations: operations.into_iter().collect(),
            patterns: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<AccessPattern>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn from_config(config: &ToolConfig) -> Result<Self, PatternError> {
        let mut tool = Self::new(config.name.clone(), config.kind, config.operations.iter().copied());
        for pattern in &config.patterns {
            tool.patterns.push(AccessPattern::from_config(pattern)?);
        }
        Ok(tool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn operations(&self) -> &BTreeSet<OperationKind> {
        &self.operations
    }

    pub fn patterns(&self) -> &[AccessPattern] {
        &self.patterns
    }

    pub fn handles(&self, operation: OperationKind) -> bool {
        self.operations.contains(&operation)
    }
}

/// An agent and its granted tools
#[derive(Debug, Clone)]
pub struct Agent {
    id: String,
    tools: Vec<Tool>,
}

impl Agent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn from_config(id: &str, config: &AgentConfig) -> Result<Self, PatternError> {
        let tools = config
            .tools
            .iter()
            .map(Tool::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: id.to_string(),
            tools,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Whether any granted tool can handle `operation`
    pub fn can_handle(&self, operation: OperationKind) -> bool {
        self.tools.iter().any(|tool| tool.handles(operation))
    }

    /// Distinct kinds of the granted tools
    pub fn tool_kinds(&self) -> Vec<ToolKind> {
        let kinds: BTreeSet<ToolKind> = self.tools.iter().map(Tool::kind).collect();
        kinds.into_iter().collect()
    }

    /// Every pattern attached to any tool, in attachment order
    pub fn patterns(&self) -> impl Iterator<Item = &AccessPattern> {
        self.tools.iter().flat_map(|tool| tool.patterns.iter())
    }
}
