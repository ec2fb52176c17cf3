// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Resolution of effective hook chains.
//!
//! Everything here is computed once per context on first access and memoized
//! inside the frozen [`Suite`], so no invalidation is ever needed.

use super::{ContextId, Hook, HookKind, Suite};

/// Effective [`HookKind::BeforeEach`] and [`HookKind::AfterEach`] hooks of
/// every spec declared directly in a context.
#[derive(Clone, Debug, Default)]
pub struct EachChain {
    /// Ancestors' before-each hooks root to leaf, the context's own last.
    before: Vec<Hook>,

    /// The context's own after-each hooks first, then ancestors' ones leaf to
    /// root.
    after: Vec<Hook>,
}

impl EachChain {
    /// Returns hooks to run before a spec body.
    #[must_use]
    pub fn before(&self) -> &[Hook] {
        &self.before
    }

    /// Returns hooks to run after a spec body.
    #[must_use]
    pub fn after(&self) -> &[Hook] {
        &self.after
    }
}

impl Suite {
    /// Returns the memoized [`EachChain`] for specs of the given context.
    #[must_use]
    pub fn each_chain(&self, id: ContextId) -> &EachChain {
        let node = self.context(id);
        node.chain.get_or_init(|| {
            let parent = node.parent.map(|p| self.each_chain(p));

            let mut before = parent.map(|c| c.before.clone()).unwrap_or_default();
            before.extend_from_slice(node.hooks(HookKind::BeforeEach));

            let mut after = node.hooks(HookKind::AfterEach).to_vec();
            if let Some(p) = parent {
                after.extend_from_slice(&p.after);
            }

            EachChain { before, after }
        })
    }

    /// Returns the memoized descriptions of the given context and all its
    /// ancestors, root first.
    #[must_use]
    pub fn context_path(&self, id: ContextId) -> &[String] {
        let node = self.context(id);
        node.path.get_or_init(|| {
            let mut path = node
                .parent
                .map(|p| self.context_path(p).to_vec())
                .unwrap_or_default();
            path.push(node.description.clone());
            path
        })
    }

    /// Resolves hook chains and paths of every context eagerly.
    ///
    /// Optional, as everything is resolved lazily anyway.
    pub fn finalize(&self) {
        for node in &self.contexts {
            _ = self.each_chain(node.id);
            _ = self.context_path(node.id);
        }
    }
}
