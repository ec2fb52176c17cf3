// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Behavior-driven `describe`/`it` test execution engine.
//!
//! Specs are declared in nested contexts with setup/teardown hooks, frozen
//! into a [`Suite`] and executed by an [`Engine`] through a [`Pipeline`] of
//! [`Middleware`]s, with bounded parallelism.
//!
//! ```rust
//! use std::sync::{
//!     atomic::{AtomicUsize, Ordering},
//!     Arc,
//! };
//!
//! use specframe::{Engine, RunSummary, Status, Suite};
//!
//! let connections = Arc::new(AtomicUsize::new(0));
//! let suite = Suite::describe("Database", |ctx| {
//!     let conns = Arc::clone(&connections);
//!     ctx.before_all(move || {
//!         conns.fetch_add(1, Ordering::SeqCst);
//!         async {}
//!     });
//!
//!     ctx.describe("queries", |ctx| {
//!         let conns = Arc::clone(&connections);
//!         ctx.it("see an open connection", move || {
//!             let open = conns.load(Ordering::SeqCst);
//!             async move {
//!                 anyhow::ensure!(open == 1, "expected 1 connection, got {open}");
//!                 Ok(())
//!             }
//!         });
//!         ctx.pending("support transactions");
//!     });
//! })
//! .unwrap();
//!
//! let engine = Engine::builder().max_concurrency(4).build().unwrap();
//! let results = engine.run_blocking(suite).unwrap();
//!
//! assert_eq!(results[0].status, Status::Passed);
//! assert_eq!(results[1].status, Status::Pending);
//! assert_eq!(
//!     RunSummary::from_results(&results).to_string(),
//!     "2 specs: 1 passed, 0 failed, 1 pending, 0 skipped",
//! );
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(nonstandard_style, rustdoc::all, trivial_casts, trivial_numeric_casts)]
#![forbid(non_ascii_idents, unsafe_code)]
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::empty_drop,
    clippy::exit,
    clippy::expect_used,
    clippy::fallible_impl_from,
    clippy::get_unwrap,
    clippy::map_err_ignore,
    clippy::mem_forget,
    clippy::missing_const_for_fn,
    clippy::missing_docs_in_private_items,
    clippy::mutex_atomic,
    clippy::option_if_let_else,
    clippy::pedantic,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::redundant_clone,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    future_incompatible,
    let_underscore_drop,
    meta_variable_misuse,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_crate_dependencies,
    unused_extern_crates,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod config;
pub mod error;
pub mod event;
pub mod middleware;
pub mod observer;
pub mod result;
pub mod runner;
pub mod suite;

#[cfg(test)]
use tracing_subscriber as _;

#[doc(inline)]
pub use self::{
    config::{Cli, EngineBuilder},
    error::{BuildError, Cause, ConfigError, Failure, RunError},
    event::{Event, RunEvent},
    middleware::{Filter, Middleware, Next, Pipeline, Retry, SpecContext, Timeout},
    observer::Observer,
    result::{ExecutionResult, RunSummary, SkipReason, Status},
    runner::Engine,
    suite::{ContextBuilder, ContextId, HookKind, SpecHandle, SpecId, Suite},
};
