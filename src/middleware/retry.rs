// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Retry`] middleware.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{Middleware, Next, SpecContext};
use crate::result::{ExecutionResult, Status};

/// Number of retry attempts for a spec.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Retries {
    /// Current retry attempt.
    pub current: usize,

    /// Available retries left.
    pub left: usize,
}

impl Retries {
    /// Creates initial [`Retries`].
    #[must_use]
    pub const fn initial(left: usize) -> Self {
        Self { left, current: 0 }
    }

    /// Returns [`Some`], in case next retry attempt is available, or [`None`]
    /// otherwise.
    #[must_use]
    pub fn next_try(self) -> Option<Self> {
        self.left
            .checked_sub(1)
            .map(|left| Self { left, current: self.current + 1 })
    }
}

/// [`Middleware`] re-invoking the rest of the chain while the spec fails.
///
/// Every attempt is a fresh invocation of the inner chain, so before-each and
/// after-each hooks run on each of them. The result of the first
/// [`Status::Passed`] attempt, or of the last failed one, is returned.
///
/// A spec may override the configured options with a tag:
/// - `retry` retries it with the configured number of retries (at least 1);
/// - `retry(3)` retries it 3 times;
/// - `retry(3).after(10ms)` also waits 10ms before every retry.
#[derive(Clone, Debug, Default)]
pub struct Retry {
    /// Number of extra attempts after the first one.
    retries: usize,

    /// Delay before every extra attempt.
    after: Option<Duration>,

    /// Tag restricting the configured options to the specs having it.
    only_tagged: Option<String>,
}

impl Retry {
    /// Creates a new [`Retry`] making up to `retries` extra attempts.
    #[must_use]
    pub const fn new(retries: usize) -> Self {
        Self { retries, after: None, only_tagged: None }
    }

    /// Waits the given `delay` before every extra attempt.
    #[must_use]
    pub const fn after(mut self, delay: Duration) -> Self {
        self.after = Some(delay);
        self
    }

    /// Retries only specs having the given tag, or a `retry` tag.
    #[must_use]
    pub fn only_tagged(mut self, tag: impl Into<String>) -> Self {
        self.only_tagged = Some(tag.into());
        self
    }

    /// Resolves the initial [`Retries`] and delay for the spec described by
    /// `ctx`.
    ///
    /// The innermost `retry` tag wins, falling back to the configured options
    /// for anything it doesn't specify.
    #[must_use]
    pub fn options_for(&self, ctx: &SpecContext) -> (Retries, Option<Duration>) {
        let tags = ctx.tags();
        if let Some((retries, after)) = tags.iter().rev().find_map(|t| parse_tag(t)) {
            let retries = retries.unwrap_or(self.retries.max(1));
            return (Retries::initial(retries), after.or(self.after));
        }

        let wanted = self
            .only_tagged
            .as_deref()
            .map_or(true, |tag| tags.contains(&tag));
        if wanted {
            (Retries::initial(self.retries), self.after)
        } else {
            (Retries::initial(0), None)
        }
    }
}

#[async_trait]
impl Middleware for Retry {
    async fn wrap(&self, ctx: &SpecContext, next: Next<'_>) -> ExecutionResult {
        let (mut retries, after) = self.options_for(ctx);
        let started = Instant::now();

        loop {
            let mut result = next.run(ctx).await;
            let next_try = (result.status == Status::Failed)
                .then(|| retries.next_try())
                .flatten();

            let Some(next_try) = next_try else {
                if result.attempts > 0 {
                    result.attempts = retries.current + 1;
                    result.duration = started.elapsed();
                }
                return result;
            };

            tracing::info!(
                spec = %ctx.full_name(),
                attempt = next_try.current + 1,
                left = next_try.left,
                error = %result.error.as_ref().map(ToString::to_string).unwrap_or_default(),
                "retrying failed spec",
            );
            if let Some(delay) = after {
                tokio::time::sleep(delay).await;
            }
            retries = next_try;
        }
    }

    fn name(&self) -> &str {
        "Retry"
    }
}

/// Parses a `retry`, `retry(N)` or `retry(N).after(duration)` tag into its
/// number of retries and delay.
///
/// Returns [`None`] if the `tag` isn't a retry tag at all.
fn parse_tag(tag: &str) -> Option<(Option<usize>, Option<Duration>)> {
    let rest = tag.strip_prefix('@').unwrap_or(tag).strip_prefix("retry")?;

    let (num, rest) = rest
        .strip_prefix('(')
        .and_then(|s| {
            let (num, rest) = s.split_once(')')?;
            num.trim().parse::<usize>().ok().map(|num| (Some(num), rest))
        })
        .unwrap_or((None, rest));

    if rest.is_empty() {
        return Some((num, None));
    }
    let after = rest
        .strip_prefix(".after(")
        .and_then(|s| s.strip_suffix(')'))
        .and_then(|dur| humantime::parse_duration(dur.trim()).ok())?;
    Some((num, Some(after)))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::{middleware::Pipeline, suite::Suite};

    #[test]
    fn retries_countdown() {
        let retries = Retries::initial(2);

        let first = retries.next_try().unwrap();
        assert_eq!(first, Retries { current: 1, left: 1 });
        let second = first.next_try().unwrap();
        assert_eq!(second, Retries { current: 2, left: 0 });
        assert_eq!(second.next_try(), None);
    }

    #[test]
    fn parses_tags() {
        assert_eq!(parse_tag("retry"), Some((None, None)));
        assert_eq!(parse_tag("@retry(3)"), Some((Some(3), None)));
        assert_eq!(
            parse_tag("retry(2).after(10ms)"),
            Some((Some(2), Some(Duration::from_millis(10)))),
        );
        assert_eq!(
            parse_tag("retry.after(1s)"),
            Some((None, Some(Duration::from_secs(1)))),
        );
        assert_eq!(parse_tag("retrying"), None);
        assert_eq!(parse_tag("retry(2).after(soon)"), None);
        assert_eq!(parse_tag("slow"), None);
    }

    fn flaky_suite(fails: usize, calls: &Arc<AtomicUsize>, tag: Option<&str>) -> Arc<Suite> {
        let calls = Arc::clone(calls);
        Arc::new(
            Suite::describe("root", move |ctx| {
                let spec = ctx.it("flaky", move || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        anyhow::ensure!(n >= fails, "attempt {n} failed");
                        Ok(())
                    }
                });
                if let Some(tag) = tag {
                    _ = spec.tag(tag);
                }
            })
            .unwrap(),
        )
    }

    fn run(retry: Retry, suite: Arc<Suite>) -> ExecutionResult {
        let spec = suite.specs().next().unwrap().id();
        let ctx = SpecContext::new(suite, spec, false);
        futures::executor::block_on(Pipeline::new().with(retry).execute(&ctx))
    }

    #[test]
    fn passes_after_single_failure() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result = run(Retry::new(3), flaky_suite(1, &calls, None));

        assert_eq!(result.status, Status::Passed);
        assert_eq!(result.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn keeps_last_failure() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result = run(Retry::new(2), flaky_suite(usize::MAX, &calls, None));

        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.error.unwrap().to_string(), "attempt 2 failed");
    }

    #[test]
    fn tag_overrides_options() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result = run(Retry::new(0), flaky_suite(2, &calls, Some("retry(2)")));

        assert_eq!(result.status, Status::Passed);
        assert_eq!(result.attempts, 3);
    }

    #[test]
    fn retries_only_tagged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let retry = Retry::new(5).only_tagged("flaky");

        let untagged = run(retry.clone(), flaky_suite(1, &calls, None));
        assert_eq!(untagged.status, Status::Failed);
        assert_eq!(untagged.attempts, 1);

        calls.store(0, Ordering::SeqCst);
        let tagged = run(retry, flaky_suite(1, &calls, Some("flaky")));
        assert_eq!(tagged.status, Status::Passed);
        assert_eq!(tagged.attempts, 2);
    }
}
