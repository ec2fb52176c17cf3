// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Run-event listeners.

use futures::lock::Mutex;

use crate::{
    error::RunError,
    event::{Event, RunEvent},
};

/// Listener of [`RunEvent`]s.
///
/// Receives [`RunEvent::Started`] first, then [`RunEvent::SpecFinished`] and
/// [`RunEvent::ContextFinished`] in completion order, and
/// [`RunEvent::Finished`] last, carrying all the results in declaration order.
///
/// Returning an error aborts the whole run with a [`RunError::Observer`], so
/// reporting bugs are never silently swallowed.
pub trait Observer: Send {
    /// Handles the given [`RunEvent`].
    ///
    /// # Errors
    ///
    /// If the event cannot be handled, which aborts the run.
    fn handle_event(&mut self, event: &Event<RunEvent<'_>>) -> anyhow::Result<()>;
}

impl<O: Observer + ?Sized> Observer for Box<O> {
    fn handle_event(&mut self, event: &Event<RunEvent<'_>>) -> anyhow::Result<()> {
        (**self).handle_event(event)
    }
}

/// Registry notifying all the registered [`Observer`]s in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    /// Registered [`Observer`]s.
    observers: Mutex<Vec<Box<dyn Observer>>>,
}

impl Registry {
    /// Creates a new [`Registry`] of the given `observers`.
    pub(crate) fn new(observers: Vec<Box<dyn Observer>>) -> Self {
        Self { observers: Mutex::new(observers) }
    }

    /// Notifies every [`Observer`] about the given `event`, stopping on the
    /// first failure.
    pub(crate) async fn notify(&self, event: RunEvent<'_>) -> Result<(), RunError> {
        let event = Event::new(event);
        let mut observers = self.observers.lock().await;
        for observer in observers.iter_mut() {
            observer.handle_event(&event).map_err(|e| {
                tracing::error!(error = %format!("{e:#}"), "observer failed");
                RunError::Observer(e)
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use futures::executor::block_on;

    use super::*;

    struct Counter(Arc<AtomicUsize>);

    impl Observer for Counter {
        fn handle_event(&mut self, _: &Event<RunEvent<'_>>) -> anyhow::Result<()> {
            _ = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl Observer for Failing {
        fn handle_event(&mut self, event: &Event<RunEvent<'_>>) -> anyhow::Result<()> {
            anyhow::ensure!(!event.is_finished(), "cannot write report");
            Ok(())
        }
    }

    #[test]
    fn notifies_all_observers() {
        let count = Arc::new(AtomicUsize::new(0));
        let observers: Vec<Box<dyn Observer>> = vec![
            Box::new(Counter(Arc::clone(&count))),
            Box::new(Counter(Arc::clone(&count))),
        ];
        let registry = Registry::new(observers);

        block_on(registry.notify(RunEvent::Finished(&[]))).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fails_on_observer_error() {
        let observers: Vec<Box<dyn Observer>> = vec![Box::new(Failing)];
        let registry = Registry::new(observers);

        block_on(registry.notify(RunEvent::Started {
            specs: 0,
            focus_mode: false,
            max_concurrency: 1,
        }))
        .unwrap();
        let err = block_on(registry.notify(RunEvent::Finished(&[]))).unwrap_err();

        assert_eq!(
            err.to_string(),
            "observer failed, aborting the run: cannot write report",
        );
    }
}
