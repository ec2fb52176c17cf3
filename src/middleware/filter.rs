// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Filter`] middleware.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use regex::Regex;

use super::{Middleware, Next, SpecContext};
use crate::result::{ExecutionResult, SkipReason};

/// Predicate over a spec's context path.
type PathPredicate = Arc<dyn Fn(&[String]) -> bool + Send + Sync>;

/// Arbitrary predicate over a spec.
type SpecPredicate = Arc<dyn Fn(&SpecContext) -> bool + Send + Sync>;

/// [`Middleware`] deciding whether a spec runs at all.
///
/// Specs marked as skipped, and non-focused ones in focus mode, are always
/// skipped. The rest must satisfy every configured criterion, otherwise they
/// are reported as [`SkipReason::Filtered`]. Neither hooks nor the body of a
/// skipped spec are invoked.
///
/// # Context hooks
///
/// Filtering happens per spec, while it executes, so it doesn't affect
/// context-level hooks. Unlike contexts under
/// [`xdescribe()`][crate::ContextBuilder::xdescribe] or having only pending
/// specs, a context whose specs are all filtered out still runs its
/// [`before_all()`][crate::ContextBuilder::before_all] and
/// [`after_all()`][crate::ContextBuilder::after_all] hooks. Mark such
/// subtrees as skipped instead when their setup is costly.
#[derive(Clone, Default)]
pub struct Filter {
    /// Tags a spec must have at least one of. Empty means any.
    tags: Vec<String>,

    /// Tags a spec must have none of.
    skip_tags: Vec<String>,

    /// [`Regex`] a spec's full name must match.
    name: Option<Regex>,

    /// Predicate a spec's context path must satisfy.
    context_path: Option<PathPredicate>,

    /// Custom predicate a spec must satisfy.
    predicate: Option<SpecPredicate>,
}

impl Filter {
    /// Creates a new [`Filter`] passing through everything but skipped and
    /// unfocused specs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires specs to have the given tag, or any other tag required this
    /// way.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Excludes specs having the given tag.
    #[must_use]
    pub fn skip_tag(mut self, tag: impl Into<String>) -> Self {
        self.skip_tags.push(tag.into());
        self
    }

    /// Requires the full name of specs to match the given [`Regex`].
    #[must_use]
    pub fn name(mut self, re: Regex) -> Self {
        self.name = Some(re);
        self
    }

    /// Requires the context path of specs (root first) to satisfy the given
    /// predicate.
    #[must_use]
    pub fn context_path<F>(mut self, f: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.context_path = Some(Arc::new(f));
        self
    }

    /// Requires specs to satisfy the given custom predicate.
    #[must_use]
    pub fn predicate<F>(mut self, f: F) -> Self
    where
        F: Fn(&SpecContext) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(f));
        self
    }

    /// Indicates whether the spec described by `ctx` satisfies every
    /// configured criterion.
    #[must_use]
    pub fn matches(&self, ctx: &SpecContext) -> bool {
        let tags = ctx.tags();
        let has = |wanted: &String| tags.contains(&wanted.as_str());

        (self.tags.is_empty() || self.tags.iter().any(has))
            && !self.skip_tags.iter().any(has)
            && self.name.as_ref().map_or(true, |re| re.is_match(&ctx.full_name()))
            && self.context_path.as_ref().map_or(true, |f| f(ctx.context_path()))
            && self.predicate.as_ref().map_or(true, |f| f(ctx))
    }
}

#[async_trait]
impl Middleware for Filter {
    async fn wrap(&self, ctx: &SpecContext, next: Next<'_>) -> ExecutionResult {
        if let Some(reason) = ctx.implicit_skip() {
            return ctx.skipped(reason);
        }
        if !self.matches(ctx) {
            tracing::trace!(spec = %ctx.full_name(), "filtered out");
            return ctx.skipped(SkipReason::Filtered);
        }
        next.run(ctx).await
    }

    fn name(&self) -> &str {
        "Filter"
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("tags", &self.tags)
            .field("skip_tags", &self.skip_tags)
            .field("name", &self.name)
            .field("context_path", &self.context_path.is_some())
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::executor::block_on;

    use super::*;
    use crate::{
        middleware::Pipeline,
        result::Status,
        suite::Suite,
    };

    fn suite() -> Arc<Suite> {
        Arc::new(
            Suite::describe("api", |ctx| {
                ctx.describe("users", |ctx| {
                    ctx.tag("db");
                    ctx.it("creates", || async {}).tag("smoke");
                    ctx.it("deletes", || async {});
                });
                ctx.describe("health", |ctx| {
                    ctx.it("responds", || async {}).tag("smoke");
                    ctx.xit("is skipped", || async {});
                });
            })
            .unwrap(),
        )
    }

    fn statuses(filter: Filter) -> Vec<(String, Status)> {
        let suite = suite();
        let pipeline = Pipeline::new().with(filter);
        suite
            .specs()
            .map(|s| {
                let ctx = SpecContext::new(Arc::clone(&suite), s.id(), false);
                let result = block_on(pipeline.execute(&ctx));
                (result.description, result.status)
            })
            .collect()
    }

    fn passed(statuses: &[(String, Status)]) -> Vec<&str> {
        statuses
            .iter()
            .filter(|(_, s)| *s == Status::Passed)
            .map(|(d, _)| d.as_str())
            .collect()
    }

    #[test]
    fn skips_explicitly_skipped() {
        let statuses = statuses(Filter::new());

        assert_eq!(passed(&statuses), ["creates", "deletes", "responds"]);
        assert_eq!(statuses[3].1, Status::Skipped);
    }

    #[test]
    fn filters_by_tags() {
        assert_eq!(passed(&statuses(Filter::new().tag("smoke"))), ["creates", "responds"]);
        assert_eq!(passed(&statuses(Filter::new().tag("db"))), ["creates", "deletes"]);
        assert_eq!(passed(&statuses(Filter::new().skip_tag("db"))), ["responds"]);
        assert_eq!(
            passed(&statuses(Filter::new().tag("smoke").skip_tag("db"))),
            ["responds"],
        );
    }

    #[test]
    fn filters_by_name() {
        let filter = Filter::new().name(Regex::new("^api users").unwrap());

        assert_eq!(passed(&statuses(filter)), ["creates", "deletes"]);
    }

    #[test]
    fn filters_by_predicates() {
        let by_path = Filter::new().context_path(|p| p.last().is_some_and(|c| c == "health"));
        let by_spec = Filter::new().predicate(|ctx| ctx.spec().description().ends_with('s'));

        assert_eq!(passed(&statuses(by_path)), ["responds"]);
        assert_eq!(passed(&statuses(by_spec)), ["creates", "deletes", "responds"]);
    }

    #[test]
    fn reports_filtered_reason() {
        let suite = suite();
        let spec = suite.specs().next().unwrap().id();
        let ctx = SpecContext::new(suite, spec, false);

        let result = block_on(Filter::new().tag("nope").wrap(&ctx, Next { rest: &[] }));

        assert_eq!(result.status, Status::Skipped);
        assert_eq!(result.skip_reason, Some(SkipReason::Filtered));
        assert_eq!(result.attempts, 0);
    }
}
