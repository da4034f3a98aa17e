//! Access patterns
//!
//! An [`AccessPattern`] is a named, prioritized predicate with two operations:
//! - [`applies_to`](AccessPattern::applies_to): cheap, side-effect-free filter
//! - [`validate`](AccessPattern::validate): the authoritative check, only
//!   called when `applies_to` returned true for the same context
//!
//! Variants form a closed set. `Composite` and `TimeGated` own their inner
//! patterns by value.

use crate::access_control::custom::CustomPattern;
use crate::access_control::glob::GlobMatcher;
use crate::access_control::types::{AccessContext, AccessDecision, OperationKind};
use crate::config::{PathPatternConfig, PatternConfig};
use crate::error::{PatternError, PredicateResult};
use chrono::{Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};
use futures::future::{BoxFuture, FutureExt, ready};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use tracing::trace;

/// Reason attached to time-gate vetoes
pub const OUTSIDE_WINDOW_REASON: &str = "outside permitted window";

/// Any access pattern
#[derive(Debug, Clone)]
pub enum AccessPattern {
    FileSystem(PathPattern),
    Table(PathPattern),
    Endpoint(PathPattern),
    Composite(CompositePattern),
    TimeGated(TimeGatedPattern),
    Custom(CustomPattern),
}

impl AccessPattern {
    pub fn id(&self) -> &str {
        match self {
            AccessPattern::FileSystem(p) | AccessPattern::Table(p) | AccessPattern::Endpoint(p) => {
                &p.id
            }
            AccessPattern::Composite(p) => &p.id,
            AccessPattern::TimeGated(p) => &p.id,
            AccessPattern::Custom(p) => p.id(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            AccessPattern::FileSystem(p) | AccessPattern::Table(p) | AccessPattern::Endpoint(p) => {
                &p.description
            }
            AccessPattern::Composite(p) => &p.description,
            AccessPattern::TimeGated(p) => &p.description,
            AccessPattern::Custom(p) => p.description(),
        }
    }

    /// Higher is more authoritative when patterns conflict
    pub fn priority(&self) -> i32 {
        match self {
            AccessPattern::FileSystem(p) | AccessPattern::Table(p) | AccessPattern::Endpoint(p) => {
                p.priority
            }
            AccessPattern::Composite(p) => p.priority,
            AccessPattern::TimeGated(p) => p.priority,
            AccessPattern::Custom(p) => p.priority(),
        }
    }

    /// Short name of the variant, used in logs and reasons
    pub fn kind(&self) -> &'static str {
        match self {
            AccessPattern::FileSystem(_) => "file_system",
            AccessPattern::Table(_) => "table",
            AccessPattern::Endpoint(_) => "endpoint",
            AccessPattern::Composite(_) => "composite",
            AccessPattern::TimeGated(_) => "time_gated",
            AccessPattern::Custom(_) => "custom",
        }
    }

    pub fn applies_to(&self, ctx: &AccessContext) -> bool {
        match self {
            AccessPattern::FileSystem(p) | AccessPattern::Table(p) | AccessPattern::Endpoint(p) => {
                p.applies_to(ctx)
            }
            AccessPattern::Composite(p) => p.applies_to(ctx),
            AccessPattern::TimeGated(p) => p.base.applies_to(ctx),
            AccessPattern::Custom(p) => p.applies_to(ctx),
        }
    }

    /// Authoritative check. Callers must have seen `applies_to(ctx) == true`.
    pub fn validate<'a>(
        &'a self,
        ctx: &'a AccessContext,
    ) -> BoxFuture<'a, PredicateResult<AccessDecision>> {
        match self {
            AccessPattern::FileSystem(p) => ready(Ok(p.validate(ctx, "file"))).boxed(),
            AccessPattern::Table(p) => ready(Ok(p.validate(ctx, "table"))).boxed(),
            AccessPattern::Endpoint(p) => ready(Ok(p.validate(ctx, "endpoint"))).boxed(),
            AccessPattern::Composite(p) => p.validate(ctx).boxed(),
            AccessPattern::TimeGated(p) => p.validate(ctx).boxed(),
            AccessPattern::Custom(p) => p.validate(ctx),
        }
    }
}

impl AccessPattern {
    /// Compile a declarative pattern
    pub fn from_config(config: &PatternConfig) -> Result<Self, PatternError> {
        match config {
            PatternConfig::FileSystem(p) => {
                Ok(AccessPattern::FileSystem(PathPattern::from_config(p)?))
            }
            PatternConfig::Table(p) => Ok(AccessPattern::Table(PathPattern::from_config(p)?)),
            PatternConfig::Endpoint(p) => {
                Ok(AccessPattern::Endpoint(PathPattern::from_config(p)?))
            }
            PatternConfig::Composite(c) => {
                let children = c
                    .children
                    .iter()
                    .map(AccessPattern::from_config)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompositePattern::new(c.id.clone(), c.combinator, children)?
                    .with_description(c.description.clone())
                    .with_priority(c.priority)
                    .into())
            }
            PatternConfig::TimeGated(t) => {
                let base = AccessPattern::from_config(&t.base)?;
                let offset = FixedOffset::east_opt(t.utc_offset_minutes.saturating_mul(60))
                    .ok_or(PatternError::InvalidOffset {
                        minutes: t.utc_offset_minutes,
                    })?;

                let mut gate = TimeGatedPattern::new(t.id.clone(), base, t.start_hour, t.end_hour)?
                    .with_description(t.description.clone())
                    .with_offset(offset);
                if let Some(priority) = t.priority {
                    gate = gate.with_priority(priority);
                }
                if let Some(names) = &t.weekdays {
                    let days = names
                        .iter()
                        .map(|name| {
                            name.parse::<Weekday>()
                                .map_err(|_| PatternError::InvalidWeekday { value: name.clone() })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    gate = gate.with_weekdays(days);
                }
                Ok(gate.into())
            }
        }
    }
}

impl From<CustomPattern> for AccessPattern {
    fn from(pattern: CustomPattern) -> Self {
        AccessPattern::Custom(pattern)
    }
}

impl From<CompositePattern> for AccessPattern {
    fn from(pattern: CompositePattern) -> Self {
        AccessPattern::Composite(pattern)
    }
}

impl From<TimeGatedPattern> for AccessPattern {
    fn from(pattern: TimeGatedPattern) -> Self {
        AccessPattern::TimeGated(pattern)
    }
}

/// Glob-driven pattern shared by the file system, table and endpoint variants
#[derive(Debug, Clone)]
pub struct PathPattern {
    id: String,
    description: String,
    priority: i32,
    globs: GlobMatcher,
    allow: bool,
    operations: Option<HashSet<OperationKind>>,
}

impl PathPattern {
    pub fn new<S: AsRef<str>>(
        id: impl Into<String>,
        globs: &[S],
        allow: bool,
    ) -> Result<Self, PatternError> {
        let id = id.into();
        if id.is_empty() {
            return Err(PatternError::MissingId);
        }
        if globs.is_empty() {
            return Err(PatternError::NoGlobs { id });
        }

        Ok(Self {
            globs: GlobMatcher::new(globs)?,
            id,
            description: String::new(),
            priority: 0,
            allow,
            operations: None,
        })
    }

    fn from_config(config: &PathPatternConfig) -> Result<Self, PatternError> {
        let mut pattern = Self::new(config.id.clone(), config.globs.as_slice(), config.allow)?
            .with_description(config.description.clone())
            .with_priority(config.priority);
        if let Some(ops) = &config.operations {
            pattern = pattern.with_operations(ops.iter().copied());
        }
        Ok(pattern)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Restrict the pattern to these operations; others make it irrelevant
    pub fn with_operations(mut self, operations: impl IntoIterator<Item = OperationKind>) -> Self {
        self.operations = Some(operations.into_iter().collect());
        self
    }

    pub fn allow(&self) -> bool {
        self.allow
    }

    pub fn globs(&self) -> &GlobMatcher {
        &self.globs
    }

    pub fn operations(&self) -> Option<&HashSet<OperationKind>> {
        self.operations.as_ref()
    }

    fn covers(&self, operation: OperationKind) -> bool {
        self.operations
            .as_ref()
            .is_none_or(|ops| ops.contains(&operation))
    }

    fn applies_to(&self, ctx: &AccessContext) -> bool {
        self.covers(ctx.operation()) && self.globs.matches(ctx.resource())
    }

    fn validate(&self, ctx: &AccessContext, noun: &str) -> AccessDecision {
        let matched = self.globs.find_match(ctx.resource()).unwrap_or_default();
        let verdict = if self.allow { "allows" } else { "denies" };

        AccessDecision::new(
            self.allow,
            &self.id,
            format!(
                "Pattern '{}' {} {} on {} '{}' (matched '{}')",
                self.id,
                verdict,
                ctx.operation(),
                noun,
                ctx.resource(),
                matched
            ),
        )
        .with_metadata("matched_glob", matched)
    }
}

/// How a composite combines its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => write!(f, "AND"),
            Combinator::Or => write!(f, "OR"),
        }
    }
}

/// Boolean combination of child patterns, evaluated in order
#[derive(Debug, Clone)]
pub struct CompositePattern {
    id: String,
    description: String,
    priority: i32,
    combinator: Combinator,
    children: Vec<AccessPattern>,
}

impl CompositePattern {
    pub fn new(
        id: impl Into<String>,
        combinator: Combinator,
        children: Vec<AccessPattern>,
    ) -> Result<Self, PatternError> {
        let id = id.into();
        if id.is_empty() {
            return Err(PatternError::MissingId);
        }
        if children.is_empty() {
            return Err(PatternError::NoChildren { id });
        }

        Ok(Self {
            id,
            description: String::new(),
            priority: 0,
            combinator,
            children,
        })
    }

    pub fn and(id: impl Into<String>, children: Vec<AccessPattern>) -> Result<Self, PatternError> {
        Self::new(id, Combinator::And, children)
    }

    pub fn or(id: impl Into<String>, children: Vec<AccessPattern>) -> Result<Self, PatternError> {
        Self::new(id, Combinator::Or, children)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn children(&self) -> &[AccessPattern] {
        &self.children
    }

    fn applies_to(&self, ctx: &AccessContext) -> bool {
        self.children.iter().any(|child| child.applies_to(ctx))
    }

    async fn validate(&self, ctx: &AccessContext) -> PredicateResult<AccessDecision> {
        match self.combinator {
            Combinator::And => self.validate_all(ctx).await,
            Combinator::Or => self.validate_any(ctx).await,
        }
    }

    async fn validate_all(&self, ctx: &AccessContext) -> PredicateResult<AccessDecision> {
        let mut voters = 0usize;

        for child in &self.children {
            // Children that do not apply are non-voting
            if !child.applies_to(ctx) {
                continue;
            }
            voters += 1;

            let decision = child.validate(ctx).await?;
            if decision.is_denied() {
                trace!(composite = %self.id, child = child.id(), "AND short-circuited");
                return Ok(AccessDecision::deny(&self.id, decision.reason)
                    .with_metadata("child", decision.source));
            }
        }

        if voters == 0 {
            return Ok(AccessDecision::deny(
                &self.id,
                format!("No child of composite '{}' applies", self.id),
            ));
        }

        Ok(AccessDecision::allow(
            &self.id,
            format!(
                "All {} applicable children of composite '{}' allowed",
                voters, self.id
            ),
        )
        .with_metadata("voters", voters))
    }

    async fn validate_any(&self, ctx: &AccessContext) -> PredicateResult<AccessDecision> {
        let mut denials = Vec::new();

        for child in &self.children {
            if !child.applies_to(ctx) {
                continue;
            }

            let decision = child.validate(ctx).await?;
            if decision.is_allowed() {
                trace!(composite = %self.id, child = child.id(), "OR satisfied");
                return Ok(AccessDecision::allow(&self.id, decision.reason)
                    .with_metadata("child", decision.source));
            }
            denials.push(decision.reason);
        }

        let reason = if denials.is_empty() {
            format!("No child of composite '{}' applies", self.id)
        } else {
            format!(
                "No child of composite '{}' allowed: {}",
                self.id,
                denials.join("; ")
            )
        };

        Ok(AccessDecision::deny(&self.id, reason).with_metadata(
            "denials",
            Value::Array(denials.into_iter().map(Value::from).collect()),
        ))
    }
}

/// Wraps a base pattern with an hour-of-day window and optional weekdays
///
/// Outside the window the gate vetoes unconditionally without consulting the
/// base pattern.
#[derive(Debug, Clone)]
pub struct TimeGatedPattern {
    id: String,
    description: String,
    priority: i32,
    base: Box<AccessPattern>,
    start_hour: u32,
    end_hour: u32,
    weekdays: Option<HashSet<Weekday>>,
    offset: FixedOffset,
}

impl TimeGatedPattern {
    /// Gate `base` to hours `[start_hour, end_hour)` in UTC.
    ///
    /// `start_hour > end_hour` wraps past midnight; equal hours never open.
    pub fn new(
        id: impl Into<String>,
        base: AccessPattern,
        start_hour: u32,
        end_hour: u32,
    ) -> Result<Self, PatternError> {
        let id = id.into();
        if id.is_empty() {
            return Err(PatternError::MissingId);
        }
        if start_hour > 23 || end_hour > 24 {
            return Err(PatternError::InvalidWindow {
                start: start_hour,
                end: end_hour,
            });
        }

        Ok(Self {
            id,
            description: String::new(),
            priority: base.priority(),
            base: Box::new(base),
            start_hour,
            end_hour,
            weekdays: None,
            offset: Utc.fix(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_weekdays(mut self, weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        self.weekdays = Some(weekdays.into_iter().collect());
        self
    }

    /// Evaluate the window in a fixed offset from UTC instead of UTC itself
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn base(&self) -> &AccessPattern {
        &self.base
    }

    fn in_hours(&self, hour: u32) -> bool {
        use std::cmp::Ordering;
        match self.start_hour.cmp(&self.end_hour) {
            Ordering::Less => hour >= self.start_hour && hour < self.end_hour,
            Ordering::Greater => hour >= self.start_hour || hour < self.end_hour,
            Ordering::Equal => false,
        }
    }

    /// Whether the context's timestamp falls inside the window
    pub fn is_open(&self, ctx: &AccessContext) -> bool {
        let local = ctx.timestamp().with_timezone(&self.offset);
        let day_ok = self
            .weekdays
            .as_ref()
            .is_none_or(|days| days.contains(&local.weekday()));
        day_ok && self.in_hours(local.hour())
    }

    async fn validate(&self, ctx: &AccessContext) -> PredicateResult<AccessDecision> {
        if !self.is_open(ctx) {
            let local = ctx.timestamp().with_timezone(&self.offset);
            trace!(pattern = %self.id, hour = local.hour(), "time gate closed");
            return Ok(AccessDecision::deny(&self.id, OUTSIDE_WINDOW_REASON)
                .with_metadata("hour", local.hour())
                .with_metadata("weekday", local.weekday().to_string()));
        }

        self.base.validate(ctx).await
    }
}
