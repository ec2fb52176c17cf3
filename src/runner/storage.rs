// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Storage of finished specs' results.

use futures::lock::Mutex;

use crate::result::ExecutionResult;

/// Collector of [`ExecutionResult`]s arriving in completion order, handing
/// them out in declaration order.
#[derive(Debug)]
pub(crate) struct Collector {
    /// Results indexed by the pre-order ordinal of their spec.
    slots: Mutex<Vec<Option<ExecutionResult>>>,
}

impl Collector {
    /// Creates a new [`Collector`] for `len` specs.
    pub(crate) fn new(len: usize) -> Self {
        Self { slots: Mutex::new(std::iter::repeat_with(|| None).take(len).collect()) }
    }

    /// Stores the `result` of the spec with the given pre-order `ordinal`.
    pub(crate) async fn insert(&self, ordinal: usize, result: ExecutionResult) {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(ordinal) {
            *slot = Some(result);
        } else {
            tracing::error!(ordinal, "result of an unknown spec, ignoring");
        }
    }

    /// Takes all the stored results in declaration order.
    pub(crate) async fn take_ordered(&self) -> Vec<ExecutionResult> {
        std::mem::take(&mut *self.slots.lock().await)
            .into_iter()
            .flatten()
            .collect()
    }
}
