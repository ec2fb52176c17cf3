// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Failure taxonomy of a run.
//!
//! Errors are split into two families:
//! - [`Failure`]s are local to a single spec and end up in its
//!   [`ExecutionResult`];
//! - [`RunError`]s abort the whole run and are returned to the caller instead
//!   of any results.
//!
//! [`ExecutionResult`]: crate::ExecutionResult

use std::{any::Any, io, time::Duration};

use derive_more::with_trait::{Display, Error};

use crate::suite::HookKind;

/// Alias for a [`catch_unwind()`] error.
///
/// [`catch_unwind()`]: futures::FutureExt::catch_unwind()
pub type Info = Box<dyn Any + Send + 'static>;

/// Reason of a user-provided callable (spec body or hook) failing.
#[derive(Debug, Display, Error)]
pub enum Cause {
    /// Callable returned an error.
    #[display("{_0:#}")]
    Error(#[error(not(source))] anyhow::Error),

    /// Callable panicked.
    #[display("panicked: {_0}")]
    Panic(#[error(not(source))] String),
}

impl Cause {
    /// Coerces the given [`catch_unwind()`] payload into a [`Cause::Panic`].
    ///
    /// [`catch_unwind()`]: futures::FutureExt::catch_unwind()
    #[must_use]
    pub fn from_panic(info: Info) -> Self {
        let message = info
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| info.downcast_ref::<&str>().map(|s| (*s).to_owned()))
            .unwrap_or_else(|| "(Could not resolve panic payload)".to_owned());
        Self::Panic(message)
    }

    /// Indicates whether this [`Cause`] is a captured panic.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }
}

impl From<tokio::task::JoinError> for Cause {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::from_panic(err.into_panic())
        } else {
            Self::Error(anyhow::anyhow!("spec task was cancelled"))
        }
    }
}

/// Failure of a single spec, recorded in its result.
#[derive(Debug, Display, Error)]
pub enum Failure {
    /// Spec body returned an error or panicked.
    #[display("{_0}")]
    Body(Cause),

    /// [`HookKind::BeforeEach`] or [`HookKind::AfterEach`] hook failed.
    #[display("`{kind}` hook failed: {source}")]
    Hook {
        /// Kind of the failed hook.
        kind: HookKind,

        /// Reason of the failure.
        source: Cause,
    },

    /// Attempt didn't finish in time.
    #[display("timed out after {}", humantime::format_duration(*limit))]
    Timeout {
        /// Deadline which was exceeded.
        limit: Duration,
    },
}

impl Failure {
    /// Returns the underlying [`Cause`], if any.
    #[must_use]
    pub const fn cause(&self) -> Option<&Cause> {
        match self {
            Self::Body(cause) | Self::Hook { source: cause, .. } => Some(cause),
            Self::Timeout { .. } => None,
        }
    }

    /// Indicates whether this [`Failure`] was produced by the
    /// [`Timeout`] middleware.
    ///
    /// [`Timeout`]: crate::middleware::Timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Fatal error aborting a whole run.
///
/// Never folded into the per-spec results: a failed setup/teardown of a
/// context or a broken observer is a systemic problem, not a failing spec.
#[derive(Debug, Display, Error)]
pub enum RunError {
    /// [`HookKind::BeforeAll`] or [`HookKind::AfterAll`] hook failed.
    #[display(
        "`{kind}` hook of `{}` failed, aborting the run: {source}",
        path.join(" ")
    )]
    Hook {
        /// Kind of the failed hook.
        kind: HookKind,

        /// Path of the context the hook is registered on, root first.
        path: Vec<String>,

        /// Reason of the failure.
        source: Cause,
    },

    /// [`Observer`] returned an error.
    ///
    /// [`Observer`]: crate::Observer
    #[display("observer failed, aborting the run: {_0:#}")]
    Observer(#[error(not(source))] anyhow::Error),

    /// Runtime of a blocking run couldn't be started.
    #[display("failed to start the runtime: {_0}")]
    Runtime(io::Error),
}

impl RunError {
    /// Indicates whether the suite couldn't be set up or torn down, as opposed
    /// to a reporting failure.
    #[must_use]
    pub const fn is_hook_failure(&self) -> bool {
        matches!(self, Self::Hook { .. })
    }
}

/// Error of building a [`Suite`].
///
/// [`Suite`]: crate::Suite
#[derive(Debug, Display, Error)]
pub enum BuildError {
    /// Context was declared with an empty description.
    #[display("context declared under `{}` has an empty description", parent.join(" "))]
    EmptyDescription {
        /// Path of the parent context, root first. Empty for the root.
        #[error(not(source))]
        parent: Vec<String>,
    },
}

/// Error of configuring an [`Engine`].
///
/// [`Engine`]: crate::Engine
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Maximum concurrency was set to zero.
    #[display("maximum concurrency must be at least 1")]
    ZeroConcurrency,
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn coerces_string_panics() {
        let info = panic::catch_unwind(|| panic!("boom {}", 42)).unwrap_err();
        let cause = Cause::from_panic(info);

        assert!(cause.is_panic(), "expected panic cause");
        assert_eq!(cause.to_string(), "panicked: boom 42");
    }

    #[test]
    fn coerces_str_panics() {
        let info = panic::catch_unwind(|| panic!("static boom")).unwrap_err();

        assert_eq!(Cause::from_panic(info).to_string(), "panicked: static boom");
    }

    #[test]
    fn coerces_opaque_panics() {
        let info = panic::catch_unwind(|| panic::panic_any(7_u8)).unwrap_err();

        assert_eq!(
            Cause::from_panic(info).to_string(),
            "panicked: (Could not resolve panic payload)",
        );
    }

    #[tokio::test]
    async fn cancelled_tasks_are_not_panics() {
        let task = tokio::spawn(futures::future::pending::<()>());
        task.abort();
        let cause = Cause::from(task.await.unwrap_err());

        assert!(!cause.is_panic(), "cancellation isn't a panic");
        assert_eq!(cause.to_string(), "spec task was cancelled");
    }

    #[tokio::test]
    async fn panicked_tasks_are_panics() {
        let task = tokio::spawn(async {
            if true {
                panic!("task exploded");
            }
        });
        let cause = Cause::from(task.await.unwrap_err());

        assert!(cause.is_panic(), "expected panic cause");
        assert_eq!(cause.to_string(), "panicked: task exploded");
    }

    #[test]
    fn displays_failures() {
        let hook = Failure::Hook {
            kind: HookKind::BeforeEach,
            source: Cause::Error(anyhow::anyhow!("no db")),
        };
        assert_eq!(hook.to_string(), "`before-each` hook failed: no db");
        assert!(hook.cause().is_some(), "hook failure has a cause");

        let timeout = Failure::Timeout { limit: Duration::from_millis(250) };
        assert_eq!(timeout.to_string(), "timed out after 250ms");
        assert!(timeout.is_timeout(), "expected timeout");
        assert!(timeout.cause().is_none(), "timeout has no cause");
    }

    #[test]
    fn displays_run_errors() {
        let err = RunError::Hook {
            kind: HookKind::BeforeAll,
            path: vec!["Database".into(), "migrations".into()],
            source: Cause::Panic("refused".into()),
        };

        assert!(err.is_hook_failure(), "expected hook failure");
        assert_eq!(
            err.to_string(),
            "`before-all` hook of `Database migrations` failed, aborting the \
             run: panicked: refused",
        );
    }
}
