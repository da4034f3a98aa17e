//! Caller-supplied access patterns
//!
//! A [`CustomPattern`] wraps two functions: a cheap synchronous filter and an
//! asynchronous validator that may perform I/O. Their results are treated
//! exactly like those of the built-in patterns.

use crate::access_control::types::AccessContext;
use crate::access_control::AccessDecision;
use crate::error::{PredicateError, PredicateResult};
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

type AppliesFn = Arc<dyn Fn(&AccessContext) -> bool + Send + Sync>;
type ValidateFn =
    Arc<dyn Fn(AccessContext) -> BoxFuture<'static, PredicateResult<AccessDecision>> + Send + Sync>;

/// Access pattern backed by user code
#[derive(Clone)]
pub struct CustomPattern {
    id: String,
    description: String,
    priority: i32,
    applies: AppliesFn,
    validate: ValidateFn,
}

impl CustomPattern {
    /// Create a pattern from a filter and an async validator.
    ///
    /// The validator receives an owned copy of the context. Any error it
    /// returns, and any panic it raises, is reported as a
    /// [`PredicateError::Failed`] naming this pattern.
    pub fn new<A, V, Fut, E>(id: impl Into<String>, applies: A, validate: V) -> Self
    where
        A: Fn(&AccessContext) -> bool + Send + Sync + 'static,
        V: Fn(AccessContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AccessDecision, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let id = id.into();
        let pattern_id = id.clone();
        let user_validate = Arc::new(validate);
        let validate: ValidateFn = Arc::new(move |ctx| {
            let pattern_id = pattern_id.clone();
            let user_validate = Arc::clone(&user_validate);
            AssertUnwindSafe(async move { (*user_validate)(ctx).await })
                .catch_unwind()
                .map(move |outcome| match outcome {
                    Ok(result) => {
                        result.map_err(|e| PredicateError::failed(pattern_id, e.to_string()))
                    }
                    Err(payload) => Err(PredicateError::failed(
                        pattern_id,
                        format!("predicate panicked: {}", panic_message(&*payload)),
                    )),
                })
                .boxed()
        });

        Self {
            id,
            description: String::new(),
            priority: 0,
            applies: Arc::new(applies),
            validate,
        }
    }

    /// Create a pattern whose validator never suspends
    pub fn from_fn<A, V, E>(id: impl Into<String>, applies: A, validate: V) -> Self
    where
        A: Fn(&AccessContext) -> bool + Send + Sync + 'static,
        V: Fn(&AccessContext) -> Result<AccessDecision, E> + Send + Sync + 'static,
        E: fmt::Display + Send + 'static,
    {
        let validate = Arc::new(validate);
        Self::new(id, applies, move |ctx: AccessContext| {
            let validate = Arc::clone(&validate);
            async move { (*validate)(&ctx) }
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

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn applies_to(&self, ctx: &AccessContext) -> bool {
        (self.applies)(ctx)
    }

    pub fn validate(&self, ctx: &AccessContext) -> BoxFuture<'static, PredicateResult<AccessDecision>> {
        (self.validate)(ctx.clone())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl fmt::Debug for CustomPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPattern")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
