//! Audit trail of access decisions
//!
//! A bounded FIFO: once the log holds `capacity` entries, each append evicts
//! the oldest one. Append and eviction happen under one lock.

use crate::access_control::rules::PermissionRule;
use crate::access_control::types::{AccessDecision, OperationKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Default number of retained entries
pub const AUDIT_LOG_CAPACITY: usize = 1000;

/// One recorded decision
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub operation: OperationKind,
    /// `None` for capability-only requests
    pub resource: Option<String>,
    pub result: AccessDecision,
    /// Rules that matched, the applied one first
    pub applied_rules: Vec<PermissionRule>,
}

/// Filter criteria for audit queries
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub agent_id: Option<String>,
    pub operation: Option<OperationKind>,
    pub allowed: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_operation(mut self, operation: OperationKind) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_allowed(mut self, allowed: bool) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(agent) = &self.agent_id
            && entry.agent_id != *agent
        {
            return false;
        }
        if let Some(op) = self.operation
            && entry.operation != op
        {
            return false;
        }
        if let Some(allowed) = self.allowed
            && entry.result.allowed != allowed
        {
            return false;
        }
        if let Some(since) = self.since
            && entry.timestamp < since
        {
            return false;
        }
        true
    }
}

/// Bounded, queryable record of past decisions
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(AUDIT_LOG_CAPACITY)
    }

    /// A capacity of zero is raised to one
    ///
    /// Storage grows with use; the capacity is only the eviction bound.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("audit log lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Append an entry, evicting the oldest ones beyond capacity
    pub fn record(&self, entry: AuditEntry) {
        let mut entries = self.lock_entries();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Entries newest-first, optionally for one agent and capped at `limit`
    pub fn query(&self, agent_id: Option<&str>, limit: Option<usize>) -> Vec<AuditEntry> {
        let filter = AuditFilter {
            agent_id: agent_id.map(str::to_string),
            limit,
            ..AuditFilter::default()
        };
        self.filter(&filter)
    }

    /// Entries matching `filter`, newest-first
    pub fn filter(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let limit = filter.limit.unwrap_or(usize::MAX);
        self.lock_entries()
            .iter()
            .rev()
            .filter(|entry| filter.matches(entry))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lock_entries().clear();
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(agent: &str, n: usize, allowed: bool) -> AuditEntry {
        AuditEntry {
            timestamp: Utc::now(),
            agent_id: agent.to_string(),
            operation: OperationKind::Read,
            resource: Some(format!("file-{n}")),
            result: AccessDecision::new(allowed, "test", format!("entry {n}")),
            applied_rules: Vec::new(),
        }
    }

    #[test]
    fn test_bounded_fifo_keeps_most_recent() {
        let log = AuditLog::new();
        for n in 0..AUDIT_LOG_CAPACITY + 50 {
            log.record(entry("a", n, true));
        }

        let entries = log.query(None, None);
        assert_eq!(entries.len(), AUDIT_LOG_CAPACITY);
        assert_eq!(
            entries.first().and_then(|e| e.resource.clone()),
            Some(format!("file-{}", AUDIT_LOG_CAPACITY + 49))
        );
        assert_eq!(
            entries.last().and_then(|e| e.resource.clone()),
            Some("file-50".to_string())
        );
    }

    #[test]
    fn test_query_by_agent_and_limit() {
        let log = AuditLog::with_capacity(10);
        for n in 0..6 {
            log.record(entry(if n % 2 == 0 { "even" } else { "odd" }, n, true));
        }

        let odd = log.query(Some("odd"), None);
        assert_eq!(odd.len(), 3);
        assert_eq!(odd[0].resource.as_deref(), Some("file-5"));

        let latest = log.query(None, Some(2));
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[1].resource.as_deref(), Some("file-4"));
    }

    #[test]
    fn test_filter_by_outcome() {
        let log = AuditLog::new();
        log.record(entry("a", 0, true));
        log.record(entry("a", 1, false));
        log.record(entry("b", 2, false));

        let denied = log.filter(&AuditFilter::new().with_allowed(false));
        assert_eq!(denied.len(), 2);

        let denied_a = log.filter(&AuditFilter::new().with_agent("a").with_allowed(false));
        assert_eq!(denied_a.len(), 1);
        assert_eq!(denied_a[0].resource.as_deref(), Some("file-1"));
    }

    #[test]
    fn test_huge_capacity_does_not_preallocate() {
        let log = AuditLog::with_capacity(usize::MAX);
        log.record(entry("a", 0, true));
        assert_eq!(log.capacity(), usize::MAX);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let log = AuditLog::with_capacity(0);
        log.record(entry("a", 0, true));
        log.record(entry("a", 1, true));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());
    }
}
