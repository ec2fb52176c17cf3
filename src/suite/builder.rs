// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Declarative construction of a [`Suite`].

use std::future::Future;

use super::{
    Body, Callable, Child, ContextId, ContextNode, Hook, HookKind, IntoOutcome,
    SpecId, SpecNode, Suite,
};
use crate::error::BuildError;

/// Flags a context propagates to every spec declared beneath it.
#[derive(Clone, Copy, Debug, Default)]
struct Inherited {
    /// Declared via [`ContextBuilder::xdescribe()`].
    skipped: bool,

    /// Declared via [`ContextBuilder::fdescribe()`].
    focused: bool,
}

/// Nodes collected so far.
#[derive(Debug, Default)]
pub(super) struct Arena {
    /// Collected contexts.
    contexts: Vec<ContextNode>,

    /// Collected specs.
    specs: Vec<SpecNode>,

    /// Errors found while collecting.
    errors: Vec<BuildError>,
}

impl Arena {
    /// Adds a new context, recording an error if its `description` is empty.
    fn push_context(
        &mut self,
        parent: Option<ContextId>,
        description: String,
    ) -> ContextId {
        if description.trim().is_empty() {
            let parent = parent.map(|p| self.path(p)).unwrap_or_default();
            self.errors.push(BuildError::EmptyDescription { parent });
        }

        let id = ContextId(self.contexts.len());
        self.contexts.push(ContextNode::new(id, parent, description));
        if let Some(p) = parent {
            self.contexts[p.0].children.push(id.into());
        }
        id
    }

    /// Returns descriptions from the root down to the given context.
    fn path(&self, id: ContextId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current.map(|c| &self.contexts[c.0]) {
            path.push(c.description.clone());
            current = c.parent;
        }
        path.reverse();
        path
    }

    /// Assigns pre-order ordinals and freezes the collected nodes.
    fn finish(mut self) -> Result<Suite, BuildError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        let mut order = Vec::with_capacity(self.specs.len());
        let mut stack = vec![Child::Context(ContextId(0))];
        while let Some(child) = stack.pop() {
            match child {
                Child::Spec(id) => {
                    self.specs[id.0].ordinal = order.len();
                    order.push(id);
                }
                Child::Context(id) => {
                    stack.extend(self.contexts[id.0].children.iter().rev());
                }
            }
        }

        Ok(Suite { contexts: self.contexts, specs: self.specs, order })
    }
}

/// Builds a [`Suite`] out of the root `description` and function declaring
/// its content.
pub(super) fn build<F>(description: String, f: F) -> Result<Suite, BuildError>
where
    F: FnOnce(&mut ContextBuilder<'_>),
{
    let mut arena = Arena::default();
    let root = arena.push_context(None, description);
    f(&mut ContextBuilder {
        arena: &mut arena,
        id: root,
        inherited: Inherited::default(),
    });
    arena.finish()
}

/// Builder of a single context, passed explicitly into each declaring
/// function.
#[derive(Debug)]
pub struct ContextBuilder<'a> {
    /// Nodes collected so far.
    arena: &'a mut Arena,

    /// Context being declared.
    id: ContextId,

    /// Flags propagated to specs declared in this context.
    inherited: Inherited,
}

impl ContextBuilder<'_> {
    /// Returns ID of the context being declared.
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    /// Declares a nested context.
    pub fn describe<F>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: FnOnce(&mut ContextBuilder<'_>),
    {
        self.nest(description.into(), self.inherited, f)
    }

    /// Alias for [`ContextBuilder::describe()`].
    pub fn context<F>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: FnOnce(&mut ContextBuilder<'_>),
    {
        self.describe(description, f)
    }

    /// Declares a nested context, all specs of which are focused.
    pub fn fdescribe<F>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: FnOnce(&mut ContextBuilder<'_>),
    {
        let inherited = Inherited { focused: true, ..self.inherited };
        self.nest(description.into(), inherited, f)
    }

    /// Declares a nested context, all specs of which are skipped.
    pub fn xdescribe<F>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: FnOnce(&mut ContextBuilder<'_>),
    {
        let inherited = Inherited { skipped: true, ..self.inherited };
        self.nest(description.into(), inherited, f)
    }

    /// Declares a nested context with the given `inherited` flags.
    fn nest<F>(&mut self, description: String, inherited: Inherited, f: F) -> &mut Self
    where
        F: FnOnce(&mut ContextBuilder<'_>),
    {
        let id = self.arena.push_context(Some(self.id), description);
        f(&mut ContextBuilder { arena: &mut *self.arena, id, inherited });
        self
    }

    /// Declares a spec with the given `body`.
    pub fn it<F, Fut>(&mut self, description: impl Into<String>, body: F) -> SpecHandle<'_>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.push_spec(description.into(), Some(Callable::new(body)))
    }

    /// Declares a focused spec with the given `body`.
    pub fn fit<F, Fut>(&mut self, description: impl Into<String>, body: F) -> SpecHandle<'_>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.it(description, body).focus()
    }

    /// Declares a skipped spec with the given `body`.
    pub fn xit<F, Fut>(&mut self, description: impl Into<String>, body: F) -> SpecHandle<'_>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.it(description, body).skip()
    }

    /// Declares a pending spec having no body.
    pub fn pending(&mut self, description: impl Into<String>) -> SpecHandle<'_> {
        self.push_spec(description.into(), None)
    }

    /// Declares a spec with an already erased `body`.
    pub fn spec(&mut self, description: impl Into<String>, body: Option<Body>) -> SpecHandle<'_> {
        self.push_spec(description.into(), body)
    }

    /// Adds a new spec to the context being declared.
    fn push_spec(&mut self, description: String, body: Option<Body>) -> SpecHandle<'_> {
        let id = SpecId(self.arena.specs.len());
        self.arena.specs.push(SpecNode {
            id,
            context: self.id,
            description,
            body,
            skipped: self.inherited.skipped,
            focused: self.inherited.focused,
            tags: Vec::new(),
            ordinal: 0,
        });
        self.arena.contexts[self.id.0].children.push(id.into());

        SpecHandle { spec: &mut self.arena.specs[id.0] }
    }

    /// Registers a [`HookKind::BeforeAll`] hook.
    pub fn before_all<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.hook(HookKind::BeforeAll, Callable::new(f))
    }

    /// Registers a [`HookKind::AfterAll`] hook.
    pub fn after_all<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.hook(HookKind::AfterAll, Callable::new(f))
    }

    /// Registers a [`HookKind::BeforeEach`] hook.
    pub fn before_each<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.hook(HookKind::BeforeEach, Callable::new(f))
    }

    /// Registers a [`HookKind::AfterEach`] hook.
    pub fn after_each<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.hook(HookKind::AfterEach, Callable::new(f))
    }

    /// Registers an already erased `hook` of the given `kind`.
    pub fn hook(&mut self, kind: HookKind, hook: Hook) -> &mut Self {
        self.arena.contexts[self.id.0].hooks.push(kind, hook);
        self
    }

    /// Tags the context being declared. Tags are inherited by every spec
    /// beneath it.
    pub fn tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.arena.contexts[self.id.0].tags.push(tag.into());
        self
    }
}

/// Handle to a just declared spec, allowing to adjust it.
#[derive(Debug)]
pub struct SpecHandle<'a> {
    /// Declared spec.
    spec: &'a mut SpecNode,
}

impl SpecHandle<'_> {
    /// Returns ID of the declared spec.
    #[must_use]
    pub const fn id(&self) -> SpecId {
        self.spec.id
    }

    /// Adds a tag to the declared spec.
    #[allow(clippy::return_self_not_must_use)] // declaring is a side effect
    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.spec.tags.push(tag.into());
        self
    }

    /// Marks the declared spec as focused.
    #[allow(clippy::return_self_not_must_use)] // declaring is a side effect
    pub fn focus(self) -> Self {
        self.spec.focused = true;
        self
    }

    /// Marks the declared spec as skipped.
    #[allow(clippy::return_self_not_must_use)] // declaring is a side effect
    pub fn skip(self) -> Self {
        self.spec.skipped = true;
        self
    }
}
