// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Outcomes of executed specs.

use std::{fmt, time::Duration};

use derive_more::with_trait::Display;
use itertools::Itertools as _;

use crate::{
    error::Failure,
    suite::{SpecId, Suite},
};

/// Final status of a spec.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Status {
    /// Body and all the hooks succeeded.
    #[display("passed")]
    Passed,

    /// Body or a per-spec hook failed, or the spec timed out.
    #[display("failed")]
    Failed,

    /// Spec has no body.
    #[display("pending")]
    Pending,

    /// Spec wasn't executed at all.
    #[display("skipped")]
    Skipped,
}

/// Reason of a spec being [`Status::Skipped`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum SkipReason {
    /// Spec is marked as skipped.
    #[display("marked as skipped")]
    Explicit,

    /// Another spec is focused.
    #[display("not focused")]
    Unfocused,

    /// Spec doesn't match the configured [`Filter`].
    ///
    /// [`Filter`]: crate::middleware::Filter
    #[display("filtered out")]
    Filtered,

    /// Run stopped starting new specs after a failure.
    #[display("run stopped on first failure")]
    FailFast,
}

/// Outcome of a single spec.
#[derive(Debug)]
#[non_exhaustive]
pub struct ExecutionResult {
    /// Originating spec.
    pub spec: SpecId,

    /// Description of the originating spec.
    pub description: String,

    /// Descriptions of the ancestor contexts, root first.
    pub context_path: Vec<String>,

    /// Effective tags of the originating spec, ancestors' ones first.
    pub tags: Vec<String>,

    /// Final status.
    pub status: Status,

    /// Wall-clock time spent, retries included.
    pub duration: Duration,

    /// Captured failure, if [`Status::Failed`].
    pub error: Option<Failure>,

    /// Reason of skipping, if [`Status::Skipped`].
    pub skip_reason: Option<SkipReason>,

    /// Number of times the spec was attempted. Zero if it wasn't executed.
    pub attempts: usize,
}

impl ExecutionResult {
    /// Creates a new [`ExecutionResult`] of the given spec with the provided
    /// `status` and no details.
    #[must_use]
    pub fn new(suite: &Suite, spec: SpecId, status: Status) -> Self {
        let node = suite.spec(spec);
        Self {
            spec,
            description: node.description().to_owned(),
            context_path: suite.context_path(node.context()).to_vec(),
            tags: suite
                .effective_tags(spec)
                .into_iter()
                .map(ToOwned::to_owned)
                .collect(),
            status,
            duration: Duration::ZERO,
            error: None,
            skip_reason: None,
            attempts: 0,
        }
    }

    /// Returns the full name of the originating spec: its context path followed
    /// by its own description, space-separated.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.context_path
            .iter()
            .map(String::as_str)
            .chain((!self.description.is_empty()).then_some(self.description.as_str()))
            .join(" ")
    }

    /// Indicates whether this [`ExecutionResult`] is [`Status::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }
}

/// Status breakdown of a run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// Number of [`Status::Passed`] specs.
    pub passed: usize,

    /// Number of [`Status::Failed`] specs.
    pub failed: usize,

    /// Number of [`Status::Pending`] specs.
    pub pending: usize,

    /// Number of [`Status::Skipped`] specs.
    pub skipped: usize,

    /// Number of specs which needed more than a single attempt.
    pub retried: usize,
}

impl RunSummary {
    /// Computes a [`RunSummary`] of the given `results`.
    #[must_use]
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        let counts = results.iter().counts_by(|r| r.status);
        let count = |s| counts.get(&s).copied().unwrap_or_default();
        Self {
            passed: count(Status::Passed),
            failed: count(Status::Failed),
            pending: count(Status::Pending),
            skipped: count(Status::Skipped),
            retried: results.iter().filter(|r| r.attempts > 1).count(),
        }
    }

    /// Returns total number of specs.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.pending + self.skipped
    }

    /// Indicates whether there were failures during execution.
    #[must_use]
    pub const fn execution_has_failed(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} specs: {} passed, {} failed, {} pending, {} skipped",
            self.total(),
            self.passed,
            self.failed,
            self.pending,
            self.skipped,
        )
    }
}
