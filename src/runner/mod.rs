// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tools for executing a [`Suite`].
//!
//! # Order guarantees
//!
//! Contexts are traversed depth-first in declaration order. Before-all hooks
//! of a context complete before any of its children begins, and its after-all
//! hooks begin only once all of its descendants have finished. With a maximum
//! concurrency of 1 everything runs strictly one-by-one, otherwise children
//! of a context run concurrently. Spec executions and context hook
//! invocations share the same number of execution slots, so at most that
//! many of them run at once.
//!
//! Whatever the concurrency, the returned results are in declaration order,
//! and statuses don't depend on it. Only durations and the order of
//! [`RunEvent::SpecFinished`] events do.
//!
//! [`RunEvent::SpecFinished`]: crate::RunEvent::SpecFinished

pub(crate) mod executor;
mod scheduler;
mod storage;

use std::{fmt, num::NonZeroUsize, sync::Arc, thread};

use crate::{
    config::{Cli, EngineBuilder},
    error::RunError,
    middleware::Pipeline,
    observer::Registry,
    result::ExecutionResult,
    suite::Suite,
};

use self::scheduler::Scheduler;

pub use self::scheduler::SERIAL_TAG;

/// Configured executor of [`Suite`]s.
///
/// Keeps no state between runs, so may be reused for any number of them.
pub struct Engine {
    /// [`Pipeline`] every spec is executed through.
    pipeline: Arc<Pipeline>,

    /// Maximum number of concurrently executing specs.
    max_concurrency: usize,

    /// Whether to stop starting new specs after the first failure.
    fail_fast: bool,

    /// Listeners of every run.
    observers: Registry,
}

impl Engine {
    /// Default maximum number of concurrently executing specs.
    pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

    /// Creates a new [`Engine`] out of its parts, validated by an
    /// [`EngineBuilder`].
    pub(crate) fn new(
        pipeline: Pipeline,
        max_concurrency: usize,
        fail_fast: bool,
        observers: Registry,
    ) -> Self {
        Self { pipeline: Arc::new(pipeline), max_concurrency, fail_fast, observers }
    }

    /// Starts configuring a new [`Engine`].
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Returns the [`Pipeline`] every spec is executed through.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the maximum number of concurrently executing specs.
    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Indicates whether new specs stop being started after the first
    /// failure.
    #[must_use]
    pub const fn is_fail_fast(&self) -> bool {
        self.fail_fast
    }

    /// Runs the given [`Suite`], returning results of all its specs in
    /// declaration order.
    ///
    /// Must be polled inside a [`tokio`] runtime with the time driver
    /// enabled, as every spec runs in its own spawned task.
    ///
    /// # Errors
    ///
    /// If a before-all or after-all hook fails, or an [`Observer`] fails.
    /// Specs still running at that moment are aborted.
    ///
    /// [`Observer`]: crate::Observer
    pub async fn run(
        &self,
        suite: impl Into<Arc<Suite>>,
    ) -> Result<Vec<ExecutionResult>, RunError> {
        Scheduler::new(
            suite.into(),
            Arc::clone(&self.pipeline),
            &self.observers,
            self.max_concurrency,
            self.fail_fast,
        )
        .run()
        .await
    }

    /// Runs the given [`Suite`] on a dedicated multi-threaded runtime,
    /// blocking the current thread until it finishes.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::run()`], or if the runtime cannot be started.
    ///
    /// # Panics
    ///
    /// If called from within an asynchronous execution context.
    pub fn run_blocking(
        &self,
        suite: impl Into<Arc<Suite>>,
    ) -> Result<Vec<ExecutionResult>, RunError> {
        let workers = thread::available_parallelism()
            .map_or(1, NonZeroUsize::get)
            .min(self.max_concurrency)
            .max(1);
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("specframe-worker")
            .enable_time()
            .build()
            .map_err(RunError::Runtime)?
            .block_on(self.run(suite))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(
            Cli::default().pipeline(),
            Self::DEFAULT_MAX_CONCURRENCY,
            false,
            Registry::default(),
        )
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("pipeline", &self.pipeline)
            .field("max_concurrency", &self.max_concurrency)
            .field("fail_fast", &self.fail_fast)
            .finish_non_exhaustive()
    }
}
