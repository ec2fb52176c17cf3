// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Engine`] configuration.
//!
//! # CLI options
//!
//! The crate doesn't parse command-line arguments itself, but [`Cli`] may be
//! flattened into the [`clap::Parser`] of a host binary and handed over to
//! [`EngineBuilder::with_cli()`]:
//! ```rust
//! # use clap::Parser;
//! # use specframe::{config::Cli, Engine};
//! #
//! #[derive(Parser)]
//! struct Args {
//!     #[command(flatten)]
//!     specs: Cli,
//! }
//!
//! let args = Args::parse_from(["runner", "--concurrency", "4", "--retry", "2"]);
//! let engine = Engine::builder().with_cli(args.specs).build().unwrap();
//!
//! assert_eq!(engine.max_concurrency(), 4);
//! ```

use std::{fmt, sync::Arc, time::Duration};

use regex::Regex;
use smart_default::SmartDefault;

use crate::{
    error::ConfigError,
    middleware::{Filter, Middleware, Pipeline, Retry, Timeout},
    observer::{Observer, Registry},
    runner::Engine,
};

/// CLI options of an [`Engine`].
#[derive(Clone, Debug, Default, clap::Args)]
#[group(skip)]
pub struct Cli {
    /// Number of specs to run concurrently. If not specified, uses the value
    /// configured in the engine builder, or 64 by default.
    #[arg(long, short, value_name = "int", global = true)]
    pub concurrency: Option<usize>,

    /// Stop starting new specs after the first failure.
    #[arg(long, global = true, visible_alias = "ff")]
    pub fail_fast: bool,

    /// Number of times a spec will be retried in case of a failure.
    #[arg(long, value_name = "int", global = true)]
    pub retry: Option<usize>,

    /// Delay between each spec retry attempt.
    ///
    /// Duration is represented in a human-readable format like `12min5s`.
    /// Supported suffixes:
    /// - `nsec`, `ns` - nanoseconds.
    /// - `usec`, `us` - microseconds.
    /// - `msec`, `ms` - milliseconds.
    /// - `seconds`, `second`, `sec`, `s` - seconds.
    /// - `minutes`, `minute`, `min`, `m` - minutes.
    #[arg(
        long,
        value_name = "duration",
        value_parser = humantime::parse_duration,
        verbatim_doc_comment,
        global = true,
    )]
    pub retry_after: Option<Duration>,

    /// Retry only specs having this tag (or an explicit `retry` tag).
    #[arg(long, value_name = "tag", global = true)]
    pub retry_tag: Option<String>,

    /// Time limit of a single spec attempt, like `500ms` or `2s`.
    #[arg(
        long,
        value_name = "duration",
        value_parser = humantime::parse_duration,
        global = true,
    )]
    pub timeout: Option<Duration>,

    /// Run only specs having any of these tags.
    #[arg(
        long = "tag",
        visible_alias = "tags",
        value_name = "tag",
        global = true
    )]
    pub tags: Vec<String>,

    /// Skip specs having any of these tags.
    #[arg(
        long = "skip-tag",
        visible_alias = "skip-tags",
        value_name = "tag",
        global = true
    )]
    pub skip_tags: Vec<String>,

    /// Regex to filter specs by their full name.
    #[arg(
        id = "name",
        long = "name",
        short = 'n',
        value_name = "regex",
        global = true
    )]
    pub name: Option<Regex>,
}

impl Cli {
    /// Indicates whether any of these options affects the [`Pipeline`].
    #[must_use]
    pub fn shapes_pipeline(&self) -> bool {
        self.retry.is_some()
            || self.retry_after.is_some()
            || self.retry_tag.is_some()
            || self.timeout.is_some()
            || !self.tags.is_empty()
            || !self.skip_tags.is_empty()
            || self.name.is_some()
    }

    /// Builds the standard [`Pipeline`] described by these options.
    ///
    /// [`Retry`] is always present, so `retry(N)` tags work even without the
    /// `--retry` option.
    #[must_use]
    pub fn pipeline(&self) -> Pipeline {
        let mut filter = Filter::new();
        for tag in &self.tags {
            filter = filter.tag(tag.clone());
        }
        for tag in &self.skip_tags {
            filter = filter.skip_tag(tag.clone());
        }
        if let Some(re) = &self.name {
            filter = filter.name(re.clone());
        }

        let wants_retry = self.retry.is_some() || self.retry_after.is_some();
        let mut retry = Retry::new(if wants_retry { self.retry.unwrap_or(1) } else { 0 });
        if let Some(after) = self.retry_after {
            retry = retry.after(after);
        }
        if let Some(tag) = &self.retry_tag {
            retry = retry.only_tagged(tag.clone());
        }

        Pipeline::standard(filter, Some(retry), self.timeout.map(Timeout::new))
    }
}

/// Builder of an [`Engine`].
#[derive(SmartDefault)]
pub struct EngineBuilder {
    /// Explicitly configured [`Pipeline`], if any.
    pipeline: Option<Pipeline>,

    /// Maximum number of concurrently executing specs.
    #[default(Engine::DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// Registered [`Observer`]s.
    observers: Vec<Box<dyn Observer>>,

    /// Whether to stop starting new specs after the first failure.
    fail_fast: bool,

    /// [`Cli`] options, overriding the programmatic ones.
    cli: Option<Cli>,
}

impl EngineBuilder {
    /// Appends the given [`Middleware`] as the innermost one of the
    /// [`Pipeline`].
    ///
    /// Once any [`Middleware`] is set explicitly, the standard [`Pipeline`]
    /// isn't used, so the built-in ones should be added as needed.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.pipeline = Some(self.pipeline.take().unwrap_or_default().with(middleware));
        self
    }

    /// Appends the given shared [`Middleware`] as the innermost one of the
    /// [`Pipeline`].
    #[must_use]
    pub fn middleware_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.pipeline =
            Some(self.pipeline.take().unwrap_or_default().with_arc(middleware));
        self
    }

    /// Replaces the whole [`Pipeline`].
    #[must_use]
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Sets the maximum number of concurrently executing specs.
    ///
    /// `1` makes the run strictly sequential. `0` is rejected by
    /// [`EngineBuilder::build()`].
    #[must_use]
    pub const fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Registers the given [`Observer`] of every run.
    #[must_use]
    pub fn observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Makes the [`Engine`] stop starting new specs after the first failure.
    #[must_use]
    pub const fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Applies the given [`Cli`] options on top of the programmatic
    /// configuration.
    #[must_use]
    pub fn with_cli(mut self, cli: Cli) -> Self {
        self.cli = Some(cli);
        self
    }

    /// Builds the configured [`Engine`].
    ///
    /// # Errors
    ///
    /// If the maximum concurrency is zero.
    pub fn build(self) -> Result<Engine, ConfigError> {
        let cli = self.cli.unwrap_or_default();

        let max_concurrency = cli.concurrency.unwrap_or(self.max_concurrency);
        if max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        let pipeline = match self.pipeline {
            Some(pipeline) => {
                if cli.shapes_pipeline() {
                    tracing::warn!(
                        "pipeline is configured explicitly, ignoring CLI \
                         filtering, retry and timeout options",
                    );
                }
                pipeline
            }
            None => cli.pipeline(),
        };

        Ok(Engine::new(
            pipeline,
            max_concurrency,
            self.fail_fast || cli.fail_fast,
            Registry::new(self.observers),
        ))
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("pipeline", &self.pipeline)
            .field("max_concurrency", &self.max_concurrency)
            .field("observers", &self.observers.len())
            .field("fail_fast", &self.fail_fast)
            .field("cli", &self.cli)
            .finish()
    }
}
