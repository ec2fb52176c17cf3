// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Composable decorators around a single spec's execution.
//!
//! A [`Pipeline`] is an ordered list of [`Middleware`]s, the first one being
//! the outermost. Each of them receives the [`Next`] part of the chain, which
//! ends at the core execution of a spec: its before-each hooks, its body and
//! its after-each hooks.
//!
//! The recommended order, used by [`Pipeline::standard()`], is
//! [`Filter`] → [`Retry`] → [`Timeout`]: filtered out specs cost nothing, and
//! every retry attempt gets its own full timeout budget.

mod filter;
mod retry;
mod timeout;

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    error::Failure,
    result::{ExecutionResult, SkipReason, Status},
    runner::executor,
    suite::{SpecId, SpecNode, Suite},
};

#[doc(inline)]
pub use self::{
    filter::Filter,
    retry::{Retries, Retry},
    timeout::Timeout,
};

/// Everything a [`Middleware`] may know about the spec being executed.
#[derive(Clone, Debug)]
pub struct SpecContext {
    /// Suite the spec belongs to.
    suite: Arc<Suite>,

    /// Spec being executed.
    spec: SpecId,

    /// Whether the run operates in focus mode.
    focus_mode: bool,
}

impl SpecContext {
    /// Creates a new [`SpecContext`].
    #[must_use]
    pub const fn new(suite: Arc<Suite>, spec: SpecId, focus_mode: bool) -> Self {
        Self { suite, spec, focus_mode }
    }

    /// Returns the [`Suite`] the spec belongs to.
    #[must_use]
    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    /// Returns the spec being executed.
    #[must_use]
    pub fn spec(&self) -> &SpecNode {
        self.suite.spec(self.spec)
    }

    /// Returns descriptions of the spec's ancestor contexts, root first.
    #[must_use]
    pub fn context_path(&self) -> &[String] {
        self.suite.context_path(self.spec().context())
    }

    /// Returns tags of the spec merged with the ones of its ancestors.
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        self.suite.effective_tags(self.spec)
    }

    /// Returns the full name of the spec.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.suite.full_name(self.spec)
    }

    /// Indicates whether the run operates in focus mode.
    #[must_use]
    pub const fn focus_mode(&self) -> bool {
        self.focus_mode
    }

    /// Returns the [`SkipReason`] the spec is skipped with regardless of any
    /// [`Filter`], if any.
    #[must_use]
    pub fn implicit_skip(&self) -> Option<SkipReason> {
        self.spec().implicit_skip(self.focus_mode)
    }

    /// Creates a [`Status::Passed`] result of a single attempt.
    #[must_use]
    pub fn passed(&self, duration: Duration) -> ExecutionResult {
        let mut result = ExecutionResult::new(&self.suite, self.spec, Status::Passed);
        result.duration = duration;
        result.attempts = 1;
        result
    }

    /// Creates a [`Status::Failed`] result of a single attempt.
    #[must_use]
    pub fn failed(&self, duration: Duration, failure: Failure) -> ExecutionResult {
        let mut result = ExecutionResult::new(&self.suite, self.spec, Status::Failed);
        result.duration = duration;
        result.error = Some(failure);
        result.attempts = 1;
        result
    }

    /// Creates a [`Status::Skipped`] result.
    #[must_use]
    pub fn skipped(&self, reason: SkipReason) -> ExecutionResult {
        let mut result = ExecutionResult::new(&self.suite, self.spec, Status::Skipped);
        result.skip_reason = Some(reason);
        result
    }

    /// Creates a [`Status::Pending`] result.
    #[must_use]
    pub fn pending(&self) -> ExecutionResult {
        ExecutionResult::new(&self.suite, self.spec, Status::Pending)
    }
}

/// Cross-cutting behavior wrapping a single spec's execution.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Executes the spec described by `ctx`, usually by calling
    /// [`Next::run()`] zero or more times.
    async fn wrap(&self, ctx: &SpecContext, next: Next<'_>) -> ExecutionResult;

    /// Returns a human-readable name of this [`Middleware`], used for logging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Remainder of a [`Pipeline`], ending at the core spec execution.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    /// Middlewares not invoked yet.
    rest: &'a [Arc<dyn Middleware>],
}

impl Next<'_> {
    /// Invokes the remainder of the chain.
    ///
    /// May be called multiple times, every call being a fresh invocation.
    pub async fn run(self, ctx: &SpecContext) -> ExecutionResult {
        match self.rest.split_first() {
            Some((head, rest)) => head.wrap(ctx, Next { rest }).await,
            None => executor::execute(ctx).await,
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rest.iter().map(|m| m.name())).finish()
    }
}

/// Ordered chain of [`Middleware`]s, the first one being the outermost.
#[derive(Clone, Default)]
pub struct Pipeline {
    /// [`Middleware`]s in order of wrapping.
    chain: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Creates a new empty [`Pipeline`], executing specs as is.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [`Pipeline`] of the built-in [`Middleware`]s in their
    /// recommended order: [`Filter`] → [`Retry`] → [`Timeout`].
    #[must_use]
    pub fn standard(
        filter: Filter,
        retry: Option<Retry>,
        timeout: Option<Timeout>,
    ) -> Self {
        let mut pipeline = Self::new().with(filter);
        if let Some(retry) = retry {
            pipeline = pipeline.with(retry);
        }
        if let Some(timeout) = timeout {
            pipeline = pipeline.with(timeout);
        }
        pipeline
    }

    /// Appends the given [`Middleware`] as the innermost one.
    #[must_use]
    pub fn with(self, middleware: impl Middleware + 'static) -> Self {
        self.with_arc(Arc::new(middleware))
    }

    /// Appends the given shared [`Middleware`] as the innermost one.
    #[must_use]
    pub fn with_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.chain.push(middleware);
        self
    }

    /// Returns number of [`Middleware`]s in this [`Pipeline`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Indicates whether this [`Pipeline`] has no [`Middleware`]s.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Executes the spec described by `ctx` through the whole chain.
    pub async fn execute(&self, ctx: &SpecContext) -> ExecutionResult {
        Next { rest: &self.chain }.run(ctx).await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pipeline")
            .field(&Next { rest: &self.chain })
            .finish()
    }
}
