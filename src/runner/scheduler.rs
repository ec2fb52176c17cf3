// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Traversal of a [`Suite`] tree under a concurrency policy.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use futures::{
    future::BoxFuture,
    stream::FuturesUnordered,
    FutureExt as _, StreamExt as _,
};
use tokio::{sync::Semaphore, task::AbortHandle};

use super::{executor, storage::Collector};
use crate::{
    error::{Cause, Failure, RunError},
    event::RunEvent,
    middleware::{Pipeline, SpecContext},
    observer::Registry,
    result::{ExecutionResult, RunSummary, SkipReason},
    suite::{Child, ContextId, HookKind, SpecId, Suite},
};

/// Tag making a spec run exclusively, with no other spec running
/// concurrently.
pub const SERIAL_TAG: &str = "serial";

/// Aborts the spawned spec task once dropped.
///
/// Dropping a [`JoinHandle`] merely detaches the task, so without this a
/// fatal error would leave specs running behind an already returned run.
///
/// [`JoinHandle`]: tokio::task::JoinHandle
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// State of a single run.
pub(crate) struct Scheduler<'r> {
    /// Suite being run.
    suite: Arc<Suite>,

    /// Pipeline every spec is executed through.
    pipeline: Arc<Pipeline>,

    /// Listeners of the run.
    observers: &'r Registry,

    /// Execution slots, one per concurrently running spec or context hooks
    /// invocation.
    permits: Semaphore,

    /// Total number of execution slots.
    max_concurrency: u32,

    /// Whether a focused spec exists, computed once before scheduling.
    focus_mode: bool,

    /// Whether to stop starting new specs after the first failure.
    fail_fast: bool,

    /// Whether a failure was seen while [`Scheduler::fail_fast`] is enabled.
    halted: AtomicBool,

    /// Results of the finished specs.
    collector: Collector,

    /// Whether a context's subtree contains a spec which may execute, indexed
    /// by [`ContextId`].
    active: Vec<bool>,
}

impl<'r> Scheduler<'r> {
    /// Creates a new [`Scheduler`] for a single run of the given `suite`.
    pub(crate) fn new(
        suite: Arc<Suite>,
        pipeline: Arc<Pipeline>,
        observers: &'r Registry,
        max_concurrency: usize,
        fail_fast: bool,
    ) -> Self {
        let max_concurrency = u32::try_from(max_concurrency)
            .unwrap_or(u32::MAX)
            .min(u32::try_from(Semaphore::MAX_PERMITS).unwrap_or(u32::MAX))
            .max(1);
        let focus_mode = suite.has_focused();

        let mut active = vec![false; suite.contexts().count()];
        for spec in suite.specs() {
            if !spec.is_pending() && spec.implicit_skip(focus_mode).is_none() {
                for c in suite.lineage(spec.context()) {
                    active[c.0] = true;
                }
            }
        }

        Self {
            permits: Semaphore::new(max_concurrency as usize),
            max_concurrency,
            focus_mode,
            fail_fast,
            halted: AtomicBool::new(false),
            collector: Collector::new(suite.len()),
            active,
            suite,
            pipeline,
            observers,
        }
    }

    /// Runs the whole [`Suite`], returning results in declaration order.
    pub(crate) async fn run(self) -> Result<Vec<ExecutionResult>, RunError> {
        tracing::info!(
            specs = self.suite.len(),
            focus_mode = self.focus_mode,
            max_concurrency = self.max_concurrency,
            "starting run",
        );
        self.observers
            .notify(RunEvent::Started {
                specs: self.suite.len(),
                focus_mode: self.focus_mode,
                max_concurrency: self.max_concurrency as usize,
            })
            .await?;

        self.run_context(self.suite.root().id()).await?;

        let results = self.collector.take_ordered().await;
        tracing::info!(summary = %RunSummary::from_results(&results), "run finished");
        self.observers.notify(RunEvent::Finished(&results)).await?;
        Ok(results)
    }

    /// Runs the given context: its before-all hooks, then all its children,
    /// then its after-all hooks.
    fn run_context(&self, id: ContextId) -> BoxFuture<'_, Result<(), RunError>> {
        async move {
            let node = self.suite.context(id);
            let path = self.suite.context_path(id);
            let hooked = self.active[id.0] && !self.is_halted();
            tracing::debug!(context = %path.join(" "), hooked, "entering context");

            if hooked {
                self.run_hooks(id, HookKind::BeforeAll).await?;
            }

            if self.max_concurrency == 1 {
                for child in node.children() {
                    self.run_child(*child).await?;
                }
            } else {
                let mut children = node
                    .children()
                    .iter()
                    .map(|c| self.run_child(*c))
                    .collect::<FuturesUnordered<_>>();
                while let Some(res) = children.next().await {
                    res?;
                }
            }

            if hooked {
                self.run_hooks(id, HookKind::AfterAll).await?;
            }

            tracing::debug!(context = %path.join(" "), "context finished");
            self.observers
                .notify(RunEvent::ContextFinished { context: id, path })
                .await
        }
        .boxed()
    }

    /// Runs the given child of a context.
    fn run_child(&self, child: Child) -> BoxFuture<'_, Result<(), RunError>> {
        match child {
            Child::Context(id) => self.run_context(id),
            Child::Spec(id) => self.run_spec(id).boxed(),
        }
    }

    /// Runs the given spec through the [`Pipeline`] in its own task, once an
    /// execution slot is available.
    async fn run_spec(&self, id: SpecId) -> Result<(), RunError> {
        let spec = self.suite.spec(id);
        let ctx = SpecContext::new(Arc::clone(&self.suite), id, self.focus_mode);

        let serial = self.suite.effective_tags(id).contains(&SERIAL_TAG);
        let permits = if serial { self.max_concurrency } else { 1 };
        // The semaphore is never closed.
        let _permit = self.permits.acquire_many(permits).await.ok();

        let result = if self.is_halted() {
            ctx.skipped(SkipReason::FailFast)
        } else {
            let started = Instant::now();
            let pipeline = Arc::clone(&self.pipeline);
            let task_ctx = ctx.clone();
            let task =
                tokio::spawn(async move { pipeline.execute(&task_ctx).await });
            let _guard = AbortOnDrop(task.abort_handle());

            match task.await {
                Ok(result) => result,
                Err(e) => ctx.failed(started.elapsed(), Failure::Body(Cause::from(e))),
            }
        };

        if self.fail_fast && result.is_failed() {
            self.halted.store(true, Ordering::SeqCst);
        }
        tracing::debug!(
            spec = %result.full_name(),
            status = %result.status,
            attempts = result.attempts,
            duration = ?result.duration,
            "spec finished",
        );

        self.observers.notify(RunEvent::SpecFinished(&result)).await?;
        self.collector.insert(spec.ordinal(), result).await;
        Ok(())
    }

    /// Runs hooks of the given `kind` registered on the given context.
    ///
    /// Only meant for [`HookKind::BeforeAll`] and [`HookKind::AfterAll`], so
    /// any failure is fatal.
    ///
    /// Hooks occupy an execution slot while running, and release it before
    /// the context's children are started.
    async fn run_hooks(&self, id: ContextId, kind: HookKind) -> Result<(), RunError> {
        let hooks = self.suite.context(id).hooks(kind);
        if hooks.is_empty() {
            return Ok(());
        }
        // The semaphore is never closed.
        let _permit = self.permits.acquire().await.ok();

        executor::invoke_all(hooks).await.map_err(|source| {
            let path = self.suite.context_path(id).to_vec();
            tracing::error!(
                context = %path.join(" "),
                hook = %kind,
                error = %source,
                "hook failed, aborting the run",
            );
            RunError::Hook { kind, path, source }
        })
    }

    /// Indicates whether no new spec should be started.
    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}
