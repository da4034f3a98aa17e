//! Permission evaluator
//!
//! Merges three signals into one decision, in this order of authority:
//! 1. The highest-priority matching administrative rule (override)
//! 2. The agent's own access patterns (baseline)
//! 3. The default decision, when neither a rule nor a pattern applies
//!
//! Requests without a resource reduce to a capability check: does the agent
//! own a tool that can handle the operation.
//!
//! If pattern evaluation fails (a custom predicate errors or times out) the
//! baseline falls back to the capability check. Rules still apply on top.

use crate::access_control::audit::{AuditEntry, AuditLog};
use crate::access_control::pattern::AccessPattern;
use crate::access_control::rules::{PermissionRule, RuleRegistry};
use crate::access_control::types::{AccessContext, AccessDecision, OperationKind};
use crate::agents::Agent;
use crate::config::AppConfig;
use crate::error::{AccessDeniedError, ConfigError, PredicateError, PredicateResult};
use chrono::Utc;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Outcome when no pattern and no rule applies to a resource request
pub const DEFAULT_DECISION_ALLOWED: bool = false;

/// Source id of the default decision
pub const DEFAULT_SOURCE: &str = "default";

/// Source id of capability-check decisions
pub const CAPABILITY_SOURCE: &str = "capability";

/// Source id of unknown-agent denials
pub const AGENT_REGISTRY_SOURCE: &str = "agent-registry";

pub const AGENT_NOT_FOUND_REASON: &str = "agent not found";

/// Orchestrates patterns, capability checks and rule overrides
///
/// Owns its rule registry and audit log; independent evaluators never share
/// state. Safe to share behind an `Arc` and evaluate from many tasks.
pub struct PermissionEvaluator {
    agents: RwLock<HashMap<String, Arc<Agent>>>,
    rules: RuleRegistry,
    audit: AuditLog,
    predicate_timeout: Option<Duration>,
}

impl PermissionEvaluator {
    pub fn new() -> Self {
        Self::with_audit_log(AuditLog::new())
    }

    pub fn with_audit_capacity(capacity: usize) -> Self {
        Self::with_audit_log(AuditLog::with_capacity(capacity))
    }

    fn with_audit_log(audit: AuditLog) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            rules: RuleRegistry::new(),
            audit,
            predicate_timeout: None,
        }
    }

    /// Bound every top-level pattern validation; expiry counts as a fault
    pub fn with_predicate_timeout(mut self, timeout: Duration) -> Self {
        self.predicate_timeout = Some(timeout);
        self
    }

    /// Build an evaluator with the configured agents and seed rules
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let mut evaluator = Self::with_audit_capacity(config.evaluator.audit_capacity);
        if let Some(ms) = config.evaluator.predicate_timeout_ms {
            evaluator = evaluator.with_predicate_timeout(Duration::from_millis(ms));
        }

        for (id, agent_config) in &config.agents {
            evaluator.register_agent(Agent::from_config(id, agent_config)?);
        }
        for rule_config in &config.rules {
            evaluator
                .rules
                .add(PermissionRule::from_config(rule_config)?)?;
        }

        debug!(
            agents = config.agents.len(),
            rules = evaluator.rules.len(),
            "Permission evaluator built from configuration"
        );
        Ok(evaluator)
    }

    fn read_agents(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Agent>>> {
        self.agents.read().unwrap_or_else(|poisoned| {
            warn!("agent table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_agents(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Agent>>> {
        self.agents.write().unwrap_or_else(|poisoned| {
            warn!("agent table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register an agent, returning the one it replaced
    pub fn register_agent(&self, agent: Agent) -> Option<Arc<Agent>> {
        self.write_agents()
            .insert(agent.id().to_string(), Arc::new(agent))
    }

    pub fn remove_agent(&self, agent_id: &str) -> bool {
        self.write_agents().remove(agent_id).is_some()
    }

    pub fn agent(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self.read_agents().get(agent_id).cloned()
    }

    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_agents().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Decide whether `agent_id` may perform `operation` on `resource`
    ///
    /// Without a resource this is a pure capability check.
    pub async fn evaluate(
        &self,
        agent_id: &str,
        operation: OperationKind,
        resource: Option<&str>,
    ) -> AccessDecision {
        if let Some(resource) = resource {
            let ctx = AccessContext::new(resource, operation, agent_id);
            return self.evaluate_context(&ctx).await;
        }

        debug!(
            agent = agent_id,
            operation = %operation,
            "Evaluating capability request"
        );

        let decision = match self.agent(agent_id) {
            Some(agent) => capability_decision(&agent, operation),
            None => agent_not_found(),
        };
        self.record(agent_id, operation, None, &decision, Vec::new());
        decision
    }

    /// Evaluate a pre-built context; its requester is the agent id
    pub async fn evaluate_context(&self, ctx: &AccessContext) -> AccessDecision {
        let agent_id = ctx.requester();
        let operation = ctx.operation();
        debug!(
            agent = agent_id,
            operation = %operation,
            resource = ctx.resource(),
            "Evaluating access"
        );

        let Some(agent) = self.agent(agent_id) else {
            trace!("Unknown agent");
            let decision = agent_not_found();
            self.record(agent_id, operation, Some(ctx.resource()), &decision, Vec::new());
            return decision;
        };

        let baseline = match self.pattern_decision(&agent, ctx).await {
            Ok(baseline) => baseline,
            Err(err) => {
                warn!(
                    agent = agent_id,
                    operation = %operation,
                    resource = ctx.resource(),
                    error = %err,
                    "Pattern evaluation failed, falling back to capability check"
                );
                Some(
                    capability_decision(&agent, operation)
                        .with_metadata("fallback", true)
                        .with_metadata("fault", err.to_string()),
                )
            }
        };

        let rules = self
            .rules
            .query(agent_id, operation, ctx.resource(), &agent.tool_kinds());

        let decision = match (rules.first(), baseline) {
            (Some(rule), baseline) => {
                trace!(rule = %rule.id, priority = rule.priority, "Applying rule override");
                let mut decision = rule.decision();
                if let Some(baseline) = baseline {
                    decision = decision
                        .with_metadata("baseline_allowed", baseline.allowed)
                        .with_metadata("baseline_source", baseline.source);
                }
                decision
            }
            (None, Some(baseline)) => {
                trace!(source = %baseline.source, "Using pattern decision");
                baseline
            }
            (None, None) => {
                trace!("No pattern or rule applies, using default");
                default_decision()
            }
        };

        self.record(agent_id, operation, Some(ctx.resource()), &decision, rules);
        decision
    }

    /// Evaluate and turn a denial into an error
    pub async fn require(
        &self,
        agent_id: &str,
        operation: OperationKind,
        resource: Option<&str>,
    ) -> Result<AccessDecision, AccessDeniedError> {
        let decision = self.evaluate(agent_id, operation, resource).await;
        if decision.is_allowed() {
            Ok(decision)
        } else {
            Err(AccessDeniedError::new(
                agent_id,
                operation.as_str(),
                resource,
                decision.reason,
            ))
        }
    }

    /// Baseline from the agent's patterns, `None` when none applies
    ///
    /// The highest-priority applicable patterns decide. When several share
    /// that priority a denial among them wins.
    async fn pattern_decision(
        &self,
        agent: &Agent,
        ctx: &AccessContext,
    ) -> PredicateResult<Option<AccessDecision>> {
        let mut applicable: Vec<&AccessPattern> =
            agent.patterns().filter(|p| p.applies_to(ctx)).collect();
        let Some(top) = applicable.iter().map(|p| p.priority()).max() else {
            return Ok(None);
        };
        // Stable sort keeps attachment order among equal priorities
        applicable.sort_by_key(|p| Reverse(p.priority()));

        let mut allowed = None;
        for pattern in applicable.into_iter().take_while(|p| p.priority() == top) {
            let decision = self.validate_pattern(pattern, ctx).await?;
            trace!(
                pattern = pattern.id(),
                kind = pattern.kind(),
                allowed = decision.allowed,
                "Pattern decided"
            );
            if decision.is_denied() {
                return Ok(Some(decision));
            }
            allowed.get_or_insert(decision);
        }
        Ok(allowed)
    }

    async fn validate_pattern(
        &self,
        pattern: &AccessPattern,
        ctx: &AccessContext,
    ) -> PredicateResult<AccessDecision> {
        match self.predicate_timeout {
            Some(limit) => tokio::time::timeout(limit, pattern.validate(ctx))
                .await
                .map_err(|_| PredicateError::TimedOut {
                    pattern: pattern.id().to_string(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })?,
            None => pattern.validate(ctx).await,
        }
    }

    fn record(
        &self,
        agent_id: &str,
        operation: OperationKind,
        resource: Option<&str>,
        decision: &AccessDecision,
        applied_rules: Vec<PermissionRule>,
    ) {
        self.audit.record(AuditEntry {
            timestamp: Utc::now(),
            agent_id: agent_id.to_string(),
            operation,
            resource: resource.map(str::to_string),
            result: decision.clone(),
            applied_rules,
        });
    }
}

impl Default for PermissionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn capability_decision(agent: &Agent, operation: OperationKind) -> AccessDecision {
    if agent.can_handle(operation) {
        AccessDecision::allow(
            CAPABILITY_SOURCE,
            format!("Agent '{}' has a tool that handles {}", agent.id(), operation),
        )
    } else {
        AccessDecision::deny(
            CAPABILITY_SOURCE,
            format!(
                "Agent '{}' has no tool that handles {}",
                agent.id(),
                operation
            ),
        )
    }
}

fn agent_not_found() -> AccessDecision {
    AccessDecision::deny(AGENT_REGISTRY_SOURCE, AGENT_NOT_FOUND_REASON)
}

fn default_decision() -> AccessDecision {
    AccessDecision::new(
        DEFAULT_DECISION_ALLOWED,
        DEFAULT_SOURCE,
        "no applicable pattern or rule",
    )
}
