// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Core execution of a single spec, innermost in every [`Pipeline`].
//!
//! [`Pipeline`]: crate::middleware::Pipeline

use std::{panic::AssertUnwindSafe, time::Instant};

use futures::FutureExt as _;

use crate::{
    error::{Cause, Failure},
    middleware::SpecContext,
    result::ExecutionResult,
    suite::{Callable, Hook, HookKind},
};

/// Executes the spec described by `ctx` once: its before-each chain, its body
/// and its after-each chain.
///
/// After-each hooks run whenever the body was entered, even if it failed,
/// and never if a before-each hook failed.
pub(crate) async fn execute(ctx: &SpecContext) -> ExecutionResult {
    if let Some(reason) = ctx.implicit_skip() {
        return ctx.skipped(reason);
    }
    let spec = ctx.spec();
    let Some(body) = spec.body() else {
        return ctx.pending();
    };
    let chain = ctx.suite().each_chain(spec.context());
    let started = Instant::now();

    if let Err(source) = invoke_all(chain.before()).await {
        tracing::debug!(spec = %ctx.full_name(), error = %source, "before-each hook failed");
        return ctx.failed(
            started.elapsed(),
            Failure::Hook { kind: HookKind::BeforeEach, source },
        );
    }

    let body = invoke(body).await;
    let after = invoke_all(chain.after()).await;

    let failure = match (body, after) {
        (Ok(()), Ok(())) => None,
        (Ok(()), Err(source)) => {
            Some(Failure::Hook { kind: HookKind::AfterEach, source })
        }
        (Err(cause), after) => {
            if let Err(e) = after {
                tracing::warn!(
                    spec = %ctx.full_name(),
                    error = %e,
                    "after-each hook failed, reporting the body failure instead",
                );
            }
            Some(Failure::Body(cause))
        }
    };

    match failure {
        None => ctx.passed(started.elapsed()),
        Some(f) => ctx.failed(started.elapsed(), f),
    }
}

/// Invokes the given [`Callable`], capturing both its error and its panic.
pub(crate) async fn invoke(callable: &Callable) -> Result<(), Cause> {
    match AssertUnwindSafe(callable.call()).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Cause::Error(e)),
        Err(info) => Err(Cause::from_panic(info)),
    }
}

/// Invokes the given `hooks` one by one, stopping at the first failure.
pub(crate) async fn invoke_all(hooks: &[Hook]) -> Result<(), Cause> {
    for hook in hooks {
        invoke(hook).await?;
    }
    Ok(())
}
