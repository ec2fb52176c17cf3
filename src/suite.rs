// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! In-memory suite tree.
//!
//! A [`Suite`] is an arena of [`ContextNode`]s and [`SpecNode`]s, built once
//! by a [`ContextBuilder`] and never mutated afterwards. Nodes refer to each
//! other by [`ContextId`]/[`SpecId`] indices, so a parent link never owns
//! anything.

mod builder;
mod hooks;

use std::{fmt, future::Future, sync::Arc};

use derive_more::with_trait::{Display, From};
use futures::{future::BoxFuture, FutureExt as _};
use once_cell::sync::OnceCell;

use crate::{error::BuildError, result::SkipReason};

#[doc(inline)]
pub use self::{
    builder::{ContextBuilder, SpecHandle},
    hooks::EachChain,
};

/// Index of a [`ContextNode`] inside its [`Suite`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("context#{_0}")]
pub struct ContextId(pub(crate) usize);

/// Index of a [`SpecNode`] inside its [`Suite`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("spec#{_0}")]
pub struct SpecId(pub(crate) usize);

/// Child of a [`ContextNode`], in declaration order.
#[derive(Clone, Copy, Debug, Eq, From, Hash, PartialEq)]
pub enum Child {
    /// Nested context.
    Context(ContextId),

    /// Spec declared directly in the context.
    Spec(SpecId),
}

/// Kind of a hook registered on a [`ContextNode`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum HookKind {
    /// Runs once, before any child of the context.
    #[display("before-all")]
    BeforeAll,

    /// Runs once, after every child of the context has finished.
    #[display("after-all")]
    AfterAll,

    /// Runs before each spec beneath the context.
    #[display("before-each")]
    BeforeEach,

    /// Runs after each spec beneath the context.
    #[display("after-each")]
    AfterEach,
}

impl HookKind {
    /// Indicates whether a failure of this hook aborts the whole run.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::BeforeAll | Self::AfterAll)
    }
}

/// Conversion of a value returned by a spec body or hook into its outcome.
pub trait IntoOutcome {
    /// Converts this value into an outcome.
    ///
    /// # Errors
    ///
    /// If the value represents a failure.
    fn into_outcome(self) -> anyhow::Result<()>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E: Into<anyhow::Error>> IntoOutcome for Result<(), E> {
    fn into_outcome(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

/// Type-erased async callable: either a spec body or a hook.
///
/// Cheap to clone, as it's reference-counted.
#[derive(Clone)]
pub struct Callable(
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>,
);

impl Callable {
    /// Wraps the given function into a [`Callable`].
    #[must_use]
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        Self(Arc::new(move || f().map(IntoOutcome::into_outcome).boxed()))
    }

    /// Invokes this [`Callable`].
    ///
    /// The function itself is called lazily on the first poll, so panics of
    /// its synchronous part are observed by whoever polls the returned
    /// [`Future`].
    #[must_use]
    pub fn call(&self) -> BoxFuture<'static, anyhow::Result<()>> {
        let f = Arc::clone(&self.0);
        async move { f().await }.boxed()
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

/// Setup/teardown [`Callable`].
pub type Hook = Callable;

/// Spec body [`Callable`].
pub type Body = Callable;

/// Hooks registered on a single [`ContextNode`], in registration order.
#[derive(Clone, Debug, Default)]
pub(crate) struct Hooks {
    /// [`HookKind::BeforeAll`] hooks.
    before_all: Vec<Hook>,

    /// [`HookKind::AfterAll`] hooks.
    after_all: Vec<Hook>,

    /// [`HookKind::BeforeEach`] hooks.
    before_each: Vec<Hook>,

    /// [`HookKind::AfterEach`] hooks.
    after_each: Vec<Hook>,
}

impl Hooks {
    /// Returns the hooks of the given `kind`.
    pub(crate) fn of(&self, kind: HookKind) -> &[Hook] {
        match kind {
            HookKind::BeforeAll => &self.before_all,
            HookKind::AfterAll => &self.after_all,
            HookKind::BeforeEach => &self.before_each,
            HookKind::AfterEach => &self.after_each,
        }
    }

    /// Registers a new `hook` of the given `kind`.
    pub(crate) fn push(&mut self, kind: HookKind, hook: Hook) {
        match kind {
            HookKind::BeforeAll => self.before_all.push(hook),
            HookKind::AfterAll => self.after_all.push(hook),
            HookKind::BeforeEach => self.before_each.push(hook),
            HookKind::AfterEach => self.after_each.push(hook),
        }
    }
}

/// Named grouping of nested contexts and specs.
#[derive(Debug)]
pub struct ContextNode {
    /// ID of this node.
    id: ContextId,

    /// Non-empty description.
    description: String,

    /// Non-owning link to the parent, [`None`] for the root.
    parent: Option<ContextId>,

    /// Nested contexts and specs, in declaration order.
    children: Vec<Child>,

    /// Registered hooks.
    hooks: Hooks,

    /// Tags inherited by every spec beneath.
    tags: Vec<String>,

    /// Memoized [`EachChain`].
    chain: OnceCell<EachChain>,

    /// Memoized path of descriptions, root first.
    path: OnceCell<Vec<String>>,
}

impl ContextNode {
    /// Creates a new childless [`ContextNode`].
    fn new(id: ContextId, parent: Option<ContextId>, description: String) -> Self {
        Self {
            id,
            description,
            parent,
            children: Vec::new(),
            hooks: Hooks::default(),
            tags: Vec::new(),
            chain: OnceCell::new(),
            path: OnceCell::new(),
        }
    }

    /// Returns ID of this [`ContextNode`].
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    /// Returns description of this [`ContextNode`].
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the parent of this [`ContextNode`], if any.
    #[must_use]
    pub const fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    /// Returns all the children in declaration order.
    #[must_use]
    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Iterates over nested contexts in declaration order.
    pub fn contexts(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.children.iter().filter_map(|c| match c {
            Child::Context(id) => Some(*id),
            Child::Spec(_) => None,
        })
    }

    /// Iterates over the specs declared directly in this [`ContextNode`].
    pub fn specs(&self) -> impl Iterator<Item = SpecId> + '_ {
        self.children.iter().filter_map(|c| match c {
            Child::Spec(id) => Some(*id),
            Child::Context(_) => None,
        })
    }

    /// Returns the hooks of the given `kind`, in registration order.
    #[must_use]
    pub fn hooks(&self, kind: HookKind) -> &[Hook] {
        self.hooks.of(kind)
    }

    /// Returns own tags of this [`ContextNode`].
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Leaf test case.
#[derive(Debug)]
pub struct SpecNode {
    /// ID of this node.
    id: SpecId,

    /// Context this spec is declared in.
    context: ContextId,

    /// Description, possibly empty.
    description: String,

    /// Body, [`None`] for a pending spec.
    body: Option<Body>,

    /// Whether this spec is marked as skipped.
    skipped: bool,

    /// Whether this spec is marked as focused.
    focused: bool,

    /// Own tags.
    tags: Vec<String>,

    /// Position in the pre-order declaration sequence of the [`Suite`].
    ordinal: usize,
}

impl SpecNode {
    /// Returns ID of this [`SpecNode`].
    #[must_use]
    pub const fn id(&self) -> SpecId {
        self.id
    }

    /// Returns the context this [`SpecNode`] is declared in.
    #[must_use]
    pub const fn context(&self) -> ContextId {
        self.context
    }

    /// Returns description of this [`SpecNode`].
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns body of this [`SpecNode`], if any.
    #[must_use]
    pub const fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Indicates whether this [`SpecNode`] has no body.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.body.is_none()
    }

    /// Indicates whether this [`SpecNode`] is marked as skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Indicates whether this [`SpecNode`] is marked as focused.
    #[must_use]
    pub const fn is_focused(&self) -> bool {
        self.focused
    }

    /// Returns own tags of this [`SpecNode`].
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns position of this [`SpecNode`] in the pre-order declaration
    /// sequence.
    #[must_use]
    pub const fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Returns the [`SkipReason`] this [`SpecNode`] is skipped with
    /// regardless of any filtering, if any.
    ///
    /// Skipping takes precedence over focusing, and pending specs are never
    /// skipped by `focus_mode`.
    #[must_use]
    pub const fn implicit_skip(&self, focus_mode: bool) -> Option<SkipReason> {
        if self.skipped {
            Some(SkipReason::Explicit)
        } else if focus_mode && !self.focused && !self.is_pending() {
            Some(SkipReason::Unfocused)
        } else {
            None
        }
    }
}

/// Frozen tree of contexts and specs.
///
/// Built once via [`Suite::describe()`] and read-only afterwards, so it may be
/// shared between concurrently running specs.
#[derive(Debug)]
pub struct Suite {
    /// All the contexts, the root being the first one.
    contexts: Vec<ContextNode>,

    /// All the specs.
    specs: Vec<SpecNode>,

    /// Specs in pre-order declaration sequence.
    order: Vec<SpecId>,
}

impl Suite {
    /// Builds a new [`Suite`] with a root context of the given `description`,
    /// populated by the provided function.
    ///
    /// # Errors
    ///
    /// If any context is declared with an empty description.
    pub fn describe<F>(
        description: impl Into<String>,
        f: F,
    ) -> Result<Self, BuildError>
    where
        F: FnOnce(&mut ContextBuilder<'_>),
    {
        builder::build(description.into(), f)
    }

    /// Returns the root [`ContextNode`].
    #[must_use]
    pub fn root(&self) -> &ContextNode {
        &self.contexts[0]
    }

    /// Returns the [`ContextNode`] with the given `id`.
    ///
    /// # Panics
    ///
    /// If the `id` belongs to another [`Suite`].
    #[must_use]
    pub fn context(&self, id: ContextId) -> &ContextNode {
        &self.contexts[id.0]
    }

    /// Returns the [`SpecNode`] with the given `id`.
    ///
    /// # Panics
    ///
    /// If the `id` belongs to another [`Suite`].
    #[must_use]
    pub fn spec(&self, id: SpecId) -> &SpecNode {
        &self.specs[id.0]
    }

    /// Iterates over all the specs in pre-order declaration sequence.
    pub fn specs(&self) -> impl Iterator<Item = &SpecNode> + '_ {
        self.order.iter().map(|id| self.spec(*id))
    }

    /// Iterates over all the contexts, parents always preceding children.
    pub fn contexts(&self) -> impl Iterator<Item = &ContextNode> + '_ {
        self.contexts.iter()
    }

    /// Returns the number of specs in this [`Suite`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Indicates whether this [`Suite`] contains no specs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Indicates whether any spec is focused (and not skipped), which makes a
    /// run over this [`Suite`] operate in focus mode.
    #[must_use]
    pub fn has_focused(&self) -> bool {
        self.specs.iter().any(|s| s.focused && !s.skipped)
    }

    /// Returns ancestors of the given context, the context itself included,
    /// root first.
    #[must_use]
    pub fn lineage(&self, id: ContextId) -> Vec<ContextId> {
        let mut lineage = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            lineage.push(id);
            current = self.context(id).parent;
        }
        lineage.reverse();
        lineage
    }

    /// Returns the tags of the given spec merged with the tags of all its
    /// ancestor contexts, root first.
    #[must_use]
    pub fn effective_tags(&self, id: SpecId) -> Vec<&str> {
        let spec = self.spec(id);
        self.lineage(spec.context)
            .into_iter()
            .flat_map(|c| self.context(c).tags.iter())
            .chain(&spec.tags)
            .map(String::as_str)
            .collect()
    }

    /// Returns the full name of the given spec: its context path followed by
    /// its own description, space-separated.
    #[must_use]
    pub fn full_name(&self, id: SpecId) -> String {
        let spec = self.spec(id);
        let mut parts = self.context_path(spec.context).to_vec();
        if !spec.description.is_empty() {
            parts.push(spec.description.clone());
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite() -> Suite {
        Suite::describe("Calculator", |ctx| {
            ctx.tag("math");
            ctx.it("adds", || async {});
            ctx.describe("division", |ctx| {
                ctx.tag("slow");
                ctx.it("divides", || async {}).tag("core");
                ctx.pending("by zero");
            });
            ctx.it("multiplies", || async {});
        })
        .unwrap()
    }

    #[test]
    fn keeps_interleaved_declaration_order() {
        let suite = suite();
        let names = suite.specs().map(SpecNode::description).collect::<Vec<_>>();

        assert_eq!(names, ["adds", "divides", "by zero", "multiplies"]);
        for (i, spec) in suite.specs().enumerate() {
            assert_eq!(spec.ordinal(), i, "ordinal of `{}`", spec.description());
        }
    }

    #[test]
    fn splits_children_by_kind() {
        let suite = suite();
        let root = suite.root();

        assert_eq!(root.specs().count(), 2);
        assert_eq!(root.contexts().count(), 1);
        assert_eq!(root.children().len(), 3);
    }

    #[test]
    fn merges_tags_root_first() {
        let suite = suite();
        let divides = suite.specs().nth(1).unwrap().id();

        assert_eq!(suite.effective_tags(divides), ["math", "slow", "core"]);
        assert_eq!(suite.full_name(divides), "Calculator division divides");
    }

    #[test]
    fn skipping_wins_over_focusing() {
        let suite = Suite::describe("root", |ctx| {
            ctx.it("both", || async {}).focus().skip();
            ctx.pending("pending");
            ctx.it("plain", || async {});
        })
        .unwrap();
        let specs = suite.specs().collect::<Vec<_>>();

        assert!(!suite.has_focused(), "skipped spec doesn't enable focus mode");
        assert_eq!(specs[0].implicit_skip(true), Some(SkipReason::Explicit));
        assert_eq!(specs[1].implicit_skip(true), None);
        assert_eq!(specs[2].implicit_skip(true), Some(SkipReason::Unfocused));
        assert_eq!(specs[2].implicit_skip(false), None);
    }

    #[test]
    fn outcome_conversion() {
        assert!(().into_outcome().is_ok(), "unit is a success");
        assert!(Ok::<(), std::io::Error>(()).into_outcome().is_ok(), "ok");
        assert!(
            Err::<(), _>(anyhow::anyhow!("nope")).into_outcome().is_err(),
            "error is a failure",
        );
    }
}
