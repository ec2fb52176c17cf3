// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Key occurrences in the lifecycle of a run.
//!
//! The top-level enum here is [`RunEvent`], always delivered to
//! [`Observer`]s wrapped into an [`Event`].
//!
//! [`Observer`]: crate::Observer

#[cfg(feature = "timestamps")]
use std::time::SystemTime;

use derive_more::with_trait::{AsRef, Deref, DerefMut};

use crate::{result::ExecutionResult, suite::ContextId};

/// Arbitrary event, optionally paired with additional metadata.
///
/// Any metadata is added by enabling the correspondent library feature:
/// - `timestamps`: adds time of when this [`Event`] has happened.
#[derive(AsRef, Clone, Copy, Debug, Deref, DerefMut)]
#[non_exhaustive]
pub struct Event<T> {
    /// [`SystemTime`] when this [`Event`] has happened.
    #[cfg(feature = "timestamps")]
    pub at: SystemTime,

    /// Actual value of this [`Event`].
    #[as_ref]
    #[deref]
    #[deref_mut]
    pub value: T,
}

impl<T> Event<T> {
    /// Creates a new [`Event`] out of the given `value`.
    #[cfg_attr(
        not(feature = "timestamps"),
        allow(clippy::missing_const_for_fn) // API compliance
    )]
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            #[cfg(feature = "timestamps")]
            at: SystemTime::now(),
            value,
        }
    }

    /// Unwraps the inner [`Event::value`] loosing all the attached metadata.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Maps the inner [`Event::value`] with the given function, keeping the
    /// attached metadata.
    #[must_use]
    pub fn map<V>(self, f: impl FnOnce(T) -> V) -> Event<V> {
        Event {
            #[cfg(feature = "timestamps")]
            at: self.at,
            value: f(self.value),
        }
    }
}

/// Top-level run event.
#[derive(Clone, Copy, Debug)]
pub enum RunEvent<'a> {
    /// Run is starting, no spec was executed yet.
    Started {
        /// Total number of specs in the suite.
        specs: usize,

        /// Whether the run operates in focus mode.
        focus_mode: bool,

        /// Maximum number of concurrently executing specs.
        max_concurrency: usize,
    },

    /// Spec has finished. Delivered in completion order, not declaration
    /// order.
    SpecFinished(&'a ExecutionResult),

    /// Context has finished: all its children completed and its after-all
    /// hooks ran.
    ContextFinished {
        /// Finished context.
        context: ContextId,

        /// Descriptions of the finished context and its ancestors, root first.
        path: &'a [String],
    },

    /// Run has finished.
    Finished(&'a [ExecutionResult]),
}

impl RunEvent<'_> {
    /// Indicates whether this is the terminal [`RunEvent::Finished`].
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}
