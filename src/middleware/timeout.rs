// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Timeout`] middleware.

use std::time::Duration;

use async_trait::async_trait;

use super::{Middleware, Next, SpecContext};
use crate::{error::Failure, result::ExecutionResult};

/// [`Middleware`] failing an attempt which doesn't finish in time.
///
/// Cancellation is cooperative: on expiry the attempt's future is dropped at
/// its current suspension point, so its after-each hooks don't run. A body
/// blocking its thread without yielding can't be interrupted at all.
///
/// Requires a [`tokio`] runtime with the time driver enabled.
#[derive(Clone, Copy, Debug)]
pub struct Timeout {
    /// Deadline of a single attempt.
    limit: Duration,
}

impl Timeout {
    /// Creates a new [`Timeout`] with the given deadline per attempt.
    #[must_use]
    pub const fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// Returns the deadline of a single attempt.
    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl Middleware for Timeout {
    async fn wrap(&self, ctx: &SpecContext, next: Next<'_>) -> ExecutionResult {
        match tokio::time::timeout(self.limit, next.run(ctx)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    spec = %ctx.full_name(),
                    limit = %humantime::format_duration(self.limit),
                    "spec timed out",
                );
                ctx.failed(self.limit, Failure::Timeout { limit: self.limit })
            }
        }
    }

    fn name(&self) -> &str {
        "Timeout"
    }
}
