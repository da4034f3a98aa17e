//! Access control module
//!
//! Decides whether an agent may perform an operation on a resource.
//!
//! ## Decision Model
//!
//! Three layers feed every decision (highest authority first):
//!
//! 1. **Rules** - administrative overrides held by the [`RuleRegistry`]
//! 2. **Patterns** - access patterns attached to the agent's tools
//! 3. **Default** - deny when neither a rule nor a pattern applies
//!
//! Requests without a resource are capability checks: allowed when one of the
//! agent's tools handles the operation.
//!
//! Patterns are glob based ([`PathPattern`] for files, tables and endpoints),
//! combined ([`CompositePattern`]), restricted to an hour window
//! ([`TimeGatedPattern`]) or caller supplied ([`CustomPattern`]).
//!
//! ## Example Configuration
//!
//! ```toml
//! [[agents.react-agent.tools]]
//! name = "editor"
//! kind = "file_system"
//! operations = ["read", "edit"]
//!
//! [[agents.react-agent.tools.patterns]]
//! type = "file_system"
//! id = "react-components"
//! globs = ["**/*.tsx", "**/*.jsx"]
//! allow = true
//!
//! [[rules]]
//! id = "no-legacy"
//! agent = "*"
//! resource = "src/legacy/**"
//! operations = ["edit", "write", "delete"]
//! allow = false
//! priority = 100
//! ```

pub mod audit;
pub mod custom;
pub mod evaluator;
pub mod glob;
pub mod pattern;
pub mod rules;
pub mod types;

pub use audit::{AUDIT_LOG_CAPACITY, AuditEntry, AuditFilter, AuditLog};
pub use custom::CustomPattern;
pub use evaluator::{
    AGENT_NOT_FOUND_REASON, AGENT_REGISTRY_SOURCE, CAPABILITY_SOURCE, DEFAULT_DECISION_ALLOWED,
    DEFAULT_SOURCE, PermissionEvaluator,
};
pub use glob::{Glob, GlobMatcher};
pub use pattern::{
    AccessPattern, Combinator, CompositePattern, OUTSIDE_WINDOW_REASON, PathPattern,
    TimeGatedPattern,
};
pub use rules::{AGENT_WILDCARD, PermissionRule, RuleRegistry, rule_order};
pub use types::{AccessContext, AccessDecision, OperationKind, ToolKind};
