//! Administrative permission rules
//!
//! Rules override pattern decisions. The registry stores them by id and
//! answers "which rules apply to this agent, operation and resource".
//!
//! Ordering among matches is priority descending, then rule id ascending,
//! so equal-priority ties always resolve the same way.

use crate::access_control::glob::Glob;
use crate::access_control::types::{AccessDecision, OperationKind, ToolKind};
use crate::config::RuleConfig;
use crate::error::RuleValidationError;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Agent id that makes a rule apply to every agent
pub const AGENT_WILDCARD: &str = "*";

/// Administrator-defined override
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionRule {
    pub id: String,
    pub description: String,
    /// Concrete agent id or [`AGENT_WILDCARD`]
    pub agent_id: String,
    /// Glob matched against the resource
    pub resource_pattern: String,
    pub operations: BTreeSet<OperationKind>,
    /// When set, the calling agent must own a tool of one of these kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_tools: Option<BTreeSet<ToolKind>>,
    pub allow: bool,
    pub priority: i32,
}

impl PermissionRule {
    /// Start building a rule that force-allows
    pub fn allow(
        id: impl Into<String>,
        agent_id: impl Into<String>,
        resource_pattern: impl Into<String>,
    ) -> Self {
        Self::new(id, agent_id, resource_pattern, true)
    }

    /// Start building a rule that force-denies
    pub fn deny(
        id: impl Into<String>,
        agent_id: impl Into<String>,
        resource_pattern: impl Into<String>,
    ) -> Self {
        Self::new(id, agent_id, resource_pattern, false)
    }

    fn new(
        id: impl Into<String>,
        agent_id: impl Into<String>,
        resource_pattern: impl Into<String>,
        allow: bool,
    ) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            agent_id: agent_id.into(),
            resource_pattern: resource_pattern.into(),
            operations: BTreeSet::new(),
            required_tools: None,
            allow,
            priority: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_operations(mut self, operations: impl IntoIterator<Item = OperationKind>) -> Self {
        self.operations.extend(operations);
        self
    }

    pub fn with_required_tools(mut self, tools: impl IntoIterator<Item = ToolKind>) -> Self {
        self.required_tools = Some(tools.into_iter().collect());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Build a rule from its configuration form, resolving names
    pub fn from_config(config: &RuleConfig) -> Result<Self, RuleValidationError> {
        let mut rule = Self::new(
            config.id.clone(),
            config.agent.clone(),
            config.resource.clone(),
            config.allow,
        )
        .with_description(config.description.clone())
        .with_priority(config.priority);

        for name in &config.operations {
            let op =
                OperationKind::try_parse(name).ok_or_else(|| RuleValidationError::UnknownOperation {
                    rule: config.id.clone(),
                    operation: name.clone(),
                })?;
            rule.operations.insert(op);
        }

        if let Some(tools) = &config.tools {
            let mut kinds = BTreeSet::new();
            for name in tools {
                let kind = ToolKind::try_parse(name).ok_or_else(|| RuleValidationError::UnknownTool {
                    rule: config.id.clone(),
                    tool: name.clone(),
                })?;
                kinds.insert(kind);
            }
            rule.required_tools = Some(kinds);
        }

        Ok(rule)
    }

    /// Check required fields and compile the resource glob
    pub fn validate(&self) -> Result<Glob, RuleValidationError> {
        if self.id.trim().is_empty() {
            return Err(RuleValidationError::MissingId);
        }
        if self.agent_id.trim().is_empty() {
            return Err(RuleValidationError::MissingAgent {
                rule: self.id.clone(),
            });
        }
        if self.resource_pattern.trim().is_empty() {
            return Err(RuleValidationError::MissingResource {
                rule: self.id.clone(),
            });
        }
        if self.operations.is_empty() {
            return Err(RuleValidationError::NoOperations {
                rule: self.id.clone(),
            });
        }
        if self.required_tools.as_ref().is_some_and(BTreeSet::is_empty) {
            return Err(RuleValidationError::EmptyTools {
                rule: self.id.clone(),
            });
        }

        Glob::new(&self.resource_pattern).map_err(|source| RuleValidationError::InvalidResource {
            rule: self.id.clone(),
            source,
        })
    }

    pub fn applies_to_agent(&self, agent_id: &str) -> bool {
        self.agent_id == AGENT_WILDCARD || self.agent_id == agent_id
    }

    fn accepts_tools(&self, tools: &[ToolKind]) -> bool {
        self.required_tools
            .as_ref()
            .is_none_or(|required| tools.iter().any(|t| required.contains(t)))
    }

    /// The decision this rule imposes when applied
    pub fn decision(&self) -> AccessDecision {
        let reason = if self.description.is_empty() {
            format!(
                "{} by rule '{}'",
                if self.allow { "Allowed" } else { "Denied" },
                self.id
            )
        } else {
            self.description.clone()
        };

        AccessDecision::new(self.allow, &self.id, reason).with_metadata("priority", self.priority)
    }
}

/// Priority descending, then id ascending
pub fn rule_order(a: &PermissionRule, b: &PermissionRule) -> Ordering {
    b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id))
}

struct StoredRule {
    rule: PermissionRule,
    resource: Glob,
}

/// Registry of administrative override rules
///
/// Writers (`add`/`remove`) take an exclusive lock; queries share a read lock.
#[derive(Default)]
pub struct RuleRegistry {
    rules: RwLock<HashMap<String, StoredRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_rules(&self) -> RwLockReadGuard<'_, HashMap<String, StoredRule>> {
        self.rules.read().unwrap_or_else(|poisoned| {
            warn!("rule registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_rules(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredRule>> {
        self.rules.write().unwrap_or_else(|poisoned| {
            warn!("rule registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Validate and store a rule, replacing any rule with the same id
    pub fn add(&self, rule: PermissionRule) -> Result<(), RuleValidationError> {
        let resource = rule.validate()?;
        info!(
            rule = %rule.id,
            agent = %rule.agent_id,
            resource = %rule.resource_pattern,
            allow = rule.allow,
            priority = rule.priority,
            "Registering permission rule"
        );

        let id = rule.id.clone();
        if self
            .write_rules()
            .insert(id.clone(), StoredRule { rule, resource })
            .is_some()
        {
            debug!(rule = %id, "Replaced existing rule");
        }
        Ok(())
    }

    /// Remove a rule; returns whether it existed
    pub fn remove(&self, id: &str) -> bool {
        let existed = self.write_rules().remove(id).is_some();
        if existed {
            info!(rule = id, "Removed permission rule");
        }
        existed
    }

    pub fn get(&self, id: &str) -> Option<PermissionRule> {
        self.read_rules().get(id).map(|stored| stored.rule.clone())
    }

    /// All rules matching the request, highest priority first
    pub fn query(
        &self,
        agent_id: &str,
        operation: OperationKind,
        resource: &str,
        tools: &[ToolKind],
    ) -> Vec<PermissionRule> {
        let mut matched: Vec<PermissionRule> = self
            .read_rules()
            .values()
            .filter(|stored| {
                let rule = &stored.rule;
                rule.applies_to_agent(agent_id)
                    && rule.operations.contains(&operation)
                    && rule.accepts_tools(tools)
                    && stored.resource.is_match(resource)
            })
            .map(|stored| stored.rule.clone())
            .collect();

        matched.sort_by(rule_order);
        matched
    }

    /// Every rule, highest priority first
    pub fn list(&self) -> Vec<PermissionRule> {
        let mut rules: Vec<PermissionRule> = self
            .read_rules()
            .values()
            .map(|stored| stored.rule.clone())
            .collect();
        rules.sort_by(rule_order);
        rules
    }

    pub fn len(&self) -> usize {
        self.read_rules().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_rules().is_empty()
    }
}
