// Copyright 2026 The Juicy Authors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For capping how many asynchronous operations run at once
//!
//! A [`Limiter`] admits up to a fixed number of operations
//! and queues the rest, starting them in submission order
//! as running ones finish.
//! Each limiter owns its own queue, so independent subsystems
//! (downloads and tag parsing, say) never hold up one another.

use crate::Error;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::num::NonZero;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::debug;

/// A bounded-concurrency task scheduler
///
/// Cloning a limiter yields another handle to the same queue.
///
/// # Example
/// ```
/// use juicy::limit::Limiter;
/// use std::num::NonZero;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let limiter = Limiter::new(NonZero::new(2).unwrap());
///
/// let tasks = (0..5)
///     .map(|i| limiter.run(move || async move { i * 2 }))
///     .collect::<Vec<_>>();
///
/// let mut results = vec![];
/// for task in tasks {
///     results.push(task.await.unwrap());
/// }
///
/// assert_eq!(results, [0, 2, 4, 6, 8]);
/// assert_eq!(limiter.active(), 0);
/// # });
/// ```
#[derive(Clone)]
pub struct Limiter {
    inner: Arc<Inner>,
}

struct Inner {
    max_concurrent: NonZero<usize>,
    state: Mutex<State>,
}

/// Invariant: the queue is only non-empty while
/// `active` equals the limiter's capacity
#[derive(Default)]
struct State {
    active: usize,
    queue: VecDeque<Pending>,
}

/// A submitted task that has not yet been spawned
struct Pending {
    job: Box<dyn FnOnce(Slot) -> BoxFuture<'static, ()> + Send>,
    runtime: Handle,
}

impl Limiter {
    /// Builds a limiter allowing at most `max_concurrent`
    /// operations in flight
    pub fn new(max_concurrent: NonZero<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_concurrent,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Maximum number of operations in flight
    pub fn max_concurrent(&self) -> NonZero<usize> {
        self.inner.max_concurrent
    }

    /// Number of operations currently running
    pub fn active(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Number of operations waiting for capacity
    pub fn queued(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Schedules an operation and returns a handle to its result
    ///
    /// The operation is started immediately if the limiter
    /// has capacity and queued otherwise.
    /// Either way it is submitted before this method returns,
    /// and runs to completion whether or not the returned
    /// [`Completion`] is ever awaited.
    ///
    /// The operation's output is passed through untouched,
    /// so a fallible operation yields `Ok(Err(..))` when it fails.
    /// Its failure has no effect on any other operation.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a Tokio runtime;
    /// see [`Limiter::try_run`] for a non-panicking version.
    pub fn run<F, Fut, T>(&self, operation: F) -> Completion<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.schedule(Handle::current(), operation)
    }

    /// Schedules an operation as [`Limiter::run`] does
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] if called from outside
    /// a Tokio runtime, in which case nothing is scheduled.
    pub fn try_run<F, Fut, T>(&self, operation: F) -> Result<Completion<T>, Error>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(self.schedule(runtime, operation))
    }

    fn schedule<F, Fut, T>(&self, runtime: Handle, operation: F) -> Completion<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();

        let pending = Pending {
            job: Box::new(move |slot: Slot| {
                async move {
                    let value = operation().await;
                    // free capacity before anyone sees the result
                    drop(slot);
                    let _ = sender.send(value);
                }
                .boxed()
            }),
            runtime,
        };

        if let Some(ready) = self.inner.submit(pending) {
            Inner::dispatch(&self.inner, ready);
        }

        Completion { receiver }
    }
}

impl std::fmt::Debug for Limiter {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Limiter")
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("active", &state.active)
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl Inner {
    /// Claims a slot for the task if one is free,
    /// otherwise queues it
    fn submit(&self, pending: Pending) -> Option<Pending> {
        let mut state = self.state.lock();
        if state.active < self.max_concurrent.get() {
            state.active += 1;
            Some(pending)
        } else {
            state.queue.push_back(pending);
            debug!(queued = state.queue.len(), "limiter full, task queued");
            None
        }
    }

    /// Gives up a slot, handing it directly
    /// to the oldest queued task, if any
    fn release(&self) -> Option<Pending> {
        let mut state = self.state.lock();
        let next = state.queue.pop_front();
        if next.is_none() {
            state.active -= 1;
        }
        next
    }

    /// Must be called without the state lock held
    fn dispatch(inner: &Arc<Self>, Pending { job, runtime }: Pending) {
        runtime.spawn(job(Slot(Arc::clone(inner))));
    }
}

/// One claimed unit of a limiter's capacity
///
/// Dropping it, whether the operation finished, panicked,
/// or was never polled, frees the slot for the next task.
struct Slot(Arc<Inner>);

thread_local! {
    /// Slots released while this thread is already handing off capacity
    ///
    /// A runtime that is shutting down drops a spawned task
    /// on the spot, which releases that task's slot from within
    /// the hand-off that spawned it.
    /// Such releases are queued here and drained by the outermost
    /// hand-off, so a long queue never grows the stack.
    static HANDOFF: RefCell<Option<Vec<Arc<Inner>>>> = const { RefCell::new(None) };
}

/// Marks this thread as handing off capacity until dropped
struct Handoff;

impl Handoff {
    /// Returns `None` if a hand-off is already under way on this thread
    fn begin() -> Option<Self> {
        HANDOFF.with_borrow_mut(|handoff| match handoff {
            Some(_) => None,
            None => {
                *handoff = Some(Vec::new());
                Some(Self)
            }
        })
    }

    fn defer(inner: Arc<Inner>) {
        HANDOFF.with_borrow_mut(|handoff| {
            if let Some(deferred) = handoff {
                deferred.push(inner);
            }
        })
    }

    fn next(&self) -> Option<Arc<Inner>> {
        HANDOFF.with_borrow_mut(|handoff| handoff.as_mut().and_then(Vec::pop))
    }
}

impl Drop for Handoff {
    fn drop(&mut self) {
        let deferred = HANDOFF.with_borrow_mut(Option::take);
        // anything left behind by a panicking dispatch is released normally
        for inner in deferred.into_iter().flatten() {
            drop(Slot(inner));
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let Some(handoff) = Handoff::begin() else {
            Handoff::defer(Arc::clone(&self.0));
            return;
        };

        let mut next = Some(Arc::clone(&self.0));
        while let Some(inner) = next {
            if let Some(pending) = inner.release() {
                Inner::dispatch(&inner, pending);
            }
            next = handoff.next();
        }
    }
}

/// The eventual result of an operation passed to [`Limiter::run`]
///
/// Dropping this does not cancel the operation.
pub struct Completion<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T, Error>;

    /// Yields [`Error::TaskAborted`] if the operation
    /// panicked or its runtime shut down before it finished
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map_err(|_| Error::TaskAborted)
    }
}

#[test]
fn test_release_hands_over_slot() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let _guard = runtime.enter();

    let limiter = Limiter::new(NonZero::new(1).unwrap());
    let pending = || Pending {
        job: Box::new(|slot: Slot| async move { drop(slot) }.boxed()),
        runtime: Handle::current(),
    };

    assert!(limiter.inner.submit(pending()).is_some());
    assert!(limiter.inner.submit(pending()).is_none());
    assert_eq!(limiter.active(), 1);
    assert_eq!(limiter.queued(), 1);

    // the queued task inherits the slot
    assert!(limiter.inner.release().is_some());
    assert_eq!(limiter.active(), 1);
    assert_eq!(limiter.queued(), 0);

    assert!(limiter.inner.release().is_none());
    assert_eq!(limiter.active(), 0);
}
